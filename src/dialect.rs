//! Placeholder dialects and the statement accumulator.
//!
//! Every rendered statement goes through a [`StatementBuilder`] borrowed from a [`Dialect`].
//! The builder keeps the SQL text and the positional argument list in lockstep: each call to
//! [`StatementBuilder::bind_parameter`] pushes exactly one argument and writes exactly one
//! placeholder for it.
//! ```rust
//! use sql_depot::prelude::*;
//!
//! let mut b = PostgresDialect.new_builder();
//! b.append_text("select id from t where a = ");
//! b.bind_parameter(Value::Int(1));
//! b.append_text(" and b = ");
//! b.bind_parameter(Value::from("x"));
//! let stmt = b.finish();
//! assert_eq!(stmt.sql, "select id from t where a = $1 and b = $2");
//! assert_eq!(stmt.args.len(), 2);
//! ```

use std::fmt::{self, Debug};

use crate::types::Value;

/// Upcast to `&dyn Dialect`; implemented for every sized [`Dialect`].
pub trait AsDialect {
    fn as_dialect(&self) -> &dyn Dialect;
}

impl<T: Dialect> AsDialect for T {
    fn as_dialect(&self) -> &dyn Dialect {
        self
    }
}

/// Placeholder strategy for one family of drivers.
pub trait Dialect: AsDialect + Send + Sync + Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Write the placeholder for the argument at 1-based `ordinal`.
    fn write_placeholder(&self, sql: &mut String, ordinal: usize);

    /// Fresh accumulator for one statement.
    fn new_builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(self.as_dialect())
    }
}

/// `?` for every parameter (`SQLite` and other non-positional drivers).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDialect;

impl Dialect for DefaultDialect {
    fn name(&self) -> &'static str {
        "default"
    }

    fn write_placeholder(&self, sql: &mut String, _ordinal: usize) {
        sql.push('?');
    }
}

/// Numbered placeholders: `$1, $2, ...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn write_placeholder(&self, sql: &mut String, ordinal: usize) {
        sql.push('$');
        sql.push_str(&ordinal.to_string());
    }
}

/// A rendered statement ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Mutable accumulator for exactly one statement.
pub struct StatementBuilder<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    args: Vec<Value>,
}

impl<'d> StatementBuilder<'d> {
    #[must_use]
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::with_capacity(64),
            args: Vec::new(),
        }
    }

    pub fn append_text(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub fn append_literal(&mut self, literal: char) {
        self.sql.push(literal);
    }

    /// Append `value` to the argument list and its placeholder to the text.
    pub fn bind_parameter(&mut self, value: Value) {
        self.args.push(value);
        self.dialect.write_placeholder(&mut self.sql, self.args.len());
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    #[must_use]
    pub fn dialect(&self) -> &'d dyn Dialect {
        self.dialect
    }

    #[must_use]
    pub fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            args: self.args,
        }
    }
}

impl Debug for StatementBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementBuilder")
            .field("dialect", &self.dialect.name())
            .field("sql", &self.sql)
            .field("args", &self.args)
            .finish()
    }
}
