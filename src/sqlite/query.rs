use rusqlite::types::ValueRef;

use crate::error::SqlDepotError;
use crate::row::{RowSource, materialize};
use crate::types::Value;
use crate::values::Values;

use super::params::Params;

/// A rusqlite row under the cursor, with the statement's column count.
pub struct SqliteRow<'a, 'stmt> {
    row: &'a rusqlite::Row<'stmt>,
    width: usize,
}

impl RowSource for SqliteRow<'_, '_> {
    fn column_count(&self) -> usize {
        self.width
    }

    fn capture(&self, idx: usize) -> Result<Value, SqlDepotError> {
        let value = self.row.get_ref(idx)?;
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8(t.to_vec()).map_err(|e| {
                SqlDepotError::ExecutionError(format!("column {idx} is not valid UTF-8: {e}"))
            })?),
            // The slice points into SQLite's row buffer and is invalidated by the next step.
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        })
    }
}

/// Run a query and materialize up to `limit` rows (all rows when `None`).
///
/// # Errors
/// Returns `SqlDepotError::SqliteError` for prepare or step failures.
pub fn collect_rows(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
    names: &[String],
    limit: Option<usize>,
) -> Result<Vec<Values>, SqlDepotError> {
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.as_values()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(materialize(names, &SqliteRow { row, width })?);
        if limit.is_some_and(|limit| out.len() >= limit) {
            break;
        }
    }
    Ok(out)
}

/// Run a statement and return the number of changed rows.
///
/// # Errors
/// Returns `SqlDepotError::SqliteError` for prepare or execution failures.
pub fn execute_statement(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &Params,
) -> Result<u64, SqlDepotError> {
    let mut stmt = conn.prepare(sql)?;
    let changed = stmt.execute(rusqlite::params_from_iter(params.as_values()))?;
    u64::try_from(changed).map_err(|e| {
        SqlDepotError::ExecutionError(format!("Invalid rows affected count: {e}"))
    })
}
