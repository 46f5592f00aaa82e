//! Composable clause descriptors.
//!
//! Columns and table are passed positionally to every session operation; predicates and sort
//! keys travel in one `&[Clause]` list that is partitioned by kind when the statement is
//! rendered, so the caller's ordering of that list never affects the SQL:
//! ```rust
//! use sql_depot::prelude::*;
//! use sql_depot::query::{desc, eq, in_list};
//!
//! let clauses = [
//!     desc("id").into(),
//!     eq("owner", "alice").into(),
//!     in_list("state", ["open", "held"]).into(),
//! ];
//! # let _: &[Clause] = &clauses;
//! ```

mod order;
mod predicate;

pub use order::{OrderByClause, asc, desc, order_by};
pub use predicate::{
    CompareOp, WhereClause, eq, ge, gt, in_list, is_not_null, is_null, le, lt, ne,
};

use crate::dialect::StatementBuilder;

/// A fragment that writes itself, and its bound arguments, into a statement.
pub trait Render {
    fn render(&self, b: &mut StatementBuilder<'_>);
}

/// Ordered list of selected column names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColsClause {
    names: Vec<String>,
}

impl ColsClause {
    /// Names in selection order; rows are materialized against this sequence.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Render for ColsClause {
    fn render(&self, b: &mut StatementBuilder<'_>) {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                b.append_text(", ");
            }
            b.append_text(name);
        }
    }
}

/// Select columns `names` in the given order.
pub fn cols<I, S>(names: I) -> ColsClause
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ColsClause {
        names: names.into_iter().map(Into::into).collect(),
    }
}

/// Target table. The name is written verbatim; no quoting or escaping is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableClause {
    name: String,
}

impl TableClause {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Render for TableClause {
    fn render(&self, b: &mut StatementBuilder<'_>) {
        b.append_text(&self.name);
    }
}

pub fn table(name: impl Into<String>) -> TableClause {
    TableClause { name: name.into() }
}

/// Alias of [`table`] that reads naturally in queries.
pub fn from(name: impl Into<String>) -> TableClause {
    table(name)
}

/// Alias of [`table`] that reads naturally in inserts.
pub fn into(name: impl Into<String>) -> TableClause {
    table(name)
}

/// Optional clause accepted by the session operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Where(WhereClause),
    OrderBy(OrderByClause),
}

impl From<WhereClause> for Clause {
    fn from(w: WhereClause) -> Self {
        Clause::Where(w)
    }
}

impl From<OrderByClause> for Clause {
    fn from(o: OrderByClause) -> Self {
        Clause::OrderBy(o)
    }
}

/// Write ` where (w1) and (w2) ...` for every where clause in `clauses`.
pub(crate) fn render_where(b: &mut StatementBuilder<'_>, clauses: &[Clause]) {
    let mut first = true;
    for clause in clauses {
        let Clause::Where(w) = clause else { continue };
        b.append_text(if first { " where (" } else { " and (" });
        w.render(b);
        b.append_literal(')');
        first = false;
    }
}

/// Write ` order by k1 asc, k2 desc ...` for every order-by clause in `clauses`.
pub(crate) fn render_order_by(b: &mut StatementBuilder<'_>, clauses: &[Clause]) {
    let mut first = true;
    for clause in clauses {
        let Clause::OrderBy(o) = clause else { continue };
        b.append_text(if first { " order by " } else { ", " });
        o.render(b);
        first = false;
    }
}
