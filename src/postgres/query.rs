use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::SqlDepotError;
use crate::row::RowSource;
use crate::types::Value;

/// A fetched `tokio_postgres` row.
pub struct PgRow<'a>(pub &'a tokio_postgres::Row);

impl RowSource for PgRow<'_> {
    fn column_count(&self) -> usize {
        self.0.len()
    }

    fn capture(&self, idx: usize) -> Result<Value, SqlDepotError> {
        extract_value(self.0, idx)
    }
}

/// Extract a `Value` from a row at the given index, picking the Rust type by column type name.
///
/// # Errors
/// Returns `SqlDepotError::PostgresError` if the column cannot be decoded.
pub fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, SqlDepotError> {
    let type_info = row.columns()[idx].type_();

    match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Int(i64::from(v))))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Int))
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Float(f64::from(v))))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Bool))
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Timestamp))
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, |v| Value::Timestamp(v.naive_utc())))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Blob))
        }
        // text, varchar, bpchar, name and anything else that decodes as a string
        _ => {
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(Value::Null, Value::Text))
        }
    }
}
