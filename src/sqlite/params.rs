use crate::types::Value;

/// Convert a single `Value` to a rusqlite value.
///
/// `SQLite` has no boolean or timestamp storage class: booleans are stored as 0/1 and
/// timestamps as `YYYY-MM-DD HH:MM:SS[.fff]` text.
#[must_use]
pub fn value_to_sqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Int(i) => rusqlite::types::Value::Integer(*i),
        Value::Float(f) => rusqlite::types::Value::Real(*f),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Timestamp(dt) => rusqlite::types::Value::Text(dt.format("%F %T%.f").to_string()),
        Value::Blob(bytes) => rusqlite::types::Value::Blob(bytes.clone()),
    }
}

/// Owned `SQLite` parameters, movable into a blocking task.
pub struct Params(pub Vec<rusqlite::types::Value>);

impl Params {
    #[must_use]
    pub fn convert(params: &[Value]) -> Self {
        Params(params.iter().map(value_to_sqlite).collect())
    }

    #[must_use]
    pub fn as_values(&self) -> &[rusqlite::types::Value] {
        &self.0
    }
}
