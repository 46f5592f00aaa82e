use crate::dialect::{Dialect, Statement};
use crate::error::SqlDepotError;
use crate::query::{Clause, ColsClause, Render, TableClause, render_order_by, render_where};
use crate::values::Values;

/// `select <cols> from <table> [where ...] [order by ...]`
#[must_use]
pub fn select(
    dialect: &dyn Dialect,
    cols: &ColsClause,
    table: &TableClause,
    clauses: &[Clause],
) -> Statement {
    let mut b = dialect.new_builder();
    b.append_text("select ");
    cols.render(&mut b);
    b.append_text(" from ");
    table.render(&mut b);
    render_where(&mut b, clauses);
    render_order_by(&mut b, clauses);
    b.finish()
}

/// `select count(*) from <table> [where ...]`; order-by clauses are ignored.
#[must_use]
pub fn count(dialect: &dyn Dialect, table: &TableClause, clauses: &[Clause]) -> Statement {
    let mut b = dialect.new_builder();
    b.append_text("select count(*) from ");
    table.render(&mut b);
    render_where(&mut b, clauses);
    b.finish()
}

/// `insert into <table> (c1, c2) values (p1, p2)` in the container's entry order.
///
/// # Errors
/// Returns `SqlDepotError::ParameterError` when `values` is empty.
pub fn insert(
    dialect: &dyn Dialect,
    table: &TableClause,
    values: &Values,
) -> Result<Statement, SqlDepotError> {
    if values.is_empty() {
        return Err(SqlDepotError::ParameterError(format!(
            "insert into {} without values",
            table.name()
        )));
    }
    let mut b = dialect.new_builder();
    b.append_text("insert into ");
    table.render(&mut b);
    b.append_text(" (");
    let mut first = true;
    for column in values.keys() {
        if !first {
            b.append_text(", ");
        }
        b.append_text(column);
        first = false;
    }
    b.append_text(") values (");
    let mut first = true;
    for (_, value) in values.iter() {
        if !first {
            b.append_text(", ");
        }
        b.bind_parameter(value.clone());
        first = false;
    }
    b.append_literal(')');
    Ok(b.finish())
}

/// `update <table> set c1 = p1, c2 = p2 [where ...]`
///
/// # Errors
/// Returns `SqlDepotError::ParameterError` when `values` is empty.
pub fn update(
    dialect: &dyn Dialect,
    table: &TableClause,
    values: &Values,
    clauses: &[Clause],
) -> Result<Statement, SqlDepotError> {
    if values.is_empty() {
        return Err(SqlDepotError::ParameterError(format!(
            "update {} without values",
            table.name()
        )));
    }
    let mut b = dialect.new_builder();
    b.append_text("update ");
    table.render(&mut b);
    b.append_text(" set ");
    let mut first = true;
    for (column, value) in values.iter() {
        if !first {
            b.append_text(", ");
        }
        b.append_text(column);
        b.append_text(" = ");
        b.bind_parameter(value.clone());
        first = false;
    }
    render_where(&mut b, clauses);
    Ok(b.finish())
}

/// `delete from <table> [where ...]`. Without where clauses every row is deleted.
#[must_use]
pub fn delete(dialect: &dyn Dialect, table: &TableClause, clauses: &[Clause]) -> Statement {
    let mut b = dialect.new_builder();
    b.append_text("delete from ");
    table.render(&mut b);
    render_where(&mut b, clauses);
    b.finish()
}
