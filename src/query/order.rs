use crate::dialect::StatementBuilder;

use super::Render;

/// One or more sort keys, rendered as `col asc, col desc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByClause {
    keys: Vec<(String, bool)>,
}

impl OrderByClause {
    /// Add another sort key after the existing ones.
    #[must_use]
    pub fn then(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.keys.push((column.into(), ascending));
        self
    }

    #[must_use]
    pub fn keys(&self) -> &[(String, bool)] {
        &self.keys
    }
}

impl Render for OrderByClause {
    fn render(&self, b: &mut StatementBuilder<'_>) {
        for (i, (column, ascending)) in self.keys.iter().enumerate() {
            if i > 0 {
                b.append_text(", ");
            }
            b.append_text(column);
            b.append_text(if *ascending { " asc" } else { " desc" });
        }
    }
}

pub fn order_by(column: impl Into<String>, ascending: bool) -> OrderByClause {
    OrderByClause {
        keys: vec![(column.into(), ascending)],
    }
}

pub fn asc(column: impl Into<String>) -> OrderByClause {
    order_by(column, true)
}

pub fn desc(column: impl Into<String>) -> OrderByClause {
    order_by(column, false)
}
