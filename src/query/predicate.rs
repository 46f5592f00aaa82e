use crate::dialect::StatementBuilder;
use crate::types::Value;

use super::Render;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A single predicate. Several passed to one operation are combined with `and`.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
}

impl Render for WhereClause {
    fn render(&self, b: &mut StatementBuilder<'_>) {
        match self {
            WhereClause::Compare { column, op, value } => {
                b.append_text(column);
                b.append_literal(' ');
                b.append_text(op.as_sql());
                b.append_literal(' ');
                b.bind_parameter(value.clone());
            }
            WhereClause::Null { column, negated } => {
                b.append_text(column);
                b.append_text(if *negated { " is not null" } else { " is null" });
            }
            // `col in ()` is not valid SQL; an empty list matches nothing.
            WhereClause::In { values, .. } if values.is_empty() => b.append_text("1 = 0"),
            WhereClause::In { column, values } => {
                b.append_text(column);
                b.append_text(" in (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        b.append_text(", ");
                    }
                    b.bind_parameter(value.clone());
                }
                b.append_literal(')');
            }
        }
    }
}

fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> WhereClause {
    WhereClause::Compare {
        column: column.into(),
        op,
        value: value.into(),
    }
}

pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Eq, value)
}

pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Ne, value)
}

pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Lt, value)
}

pub fn le(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Le, value)
}

pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Gt, value)
}

pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> WhereClause {
    compare(column, CompareOp::Ge, value)
}

pub fn is_null(column: impl Into<String>) -> WhereClause {
    WhereClause::Null {
        column: column.into(),
        negated: false,
    }
}

pub fn is_not_null(column: impl Into<String>) -> WhereClause {
    WhereClause::Null {
        column: column.into(),
        negated: true,
    }
}

/// `column in (v1, v2, ...)`, one bound argument per value.
pub fn in_list<I, V>(column: impl Into<String>, values: I) -> WhereClause
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    WhereClause::In {
        column: column.into(),
        values: values.into_iter().map(Into::into).collect(),
    }
}
