use crate::error::SqlDepotError;
use crate::types::Value;
use crate::values::Values;

/// One driver row positioned under a cursor.
///
/// Implementations must return owned values; binary payloads are copied out of the driver's
/// buffer because it may be reused once the cursor advances.
pub trait RowSource {
    fn column_count(&self) -> usize;

    /// Capture the value at `idx`.
    ///
    /// # Errors
    /// Returns an error if the driver cannot decode the column.
    fn capture(&self, idx: usize) -> Result<Value, SqlDepotError>;
}

/// Build a [`Values`] keyed by `names` from one row.
///
/// # Errors
/// Returns `SqlDepotError::ExecutionError` when the row width differs from `names.len()`,
/// or any capture error.
pub fn materialize<R: RowSource + ?Sized>(
    names: &[String],
    row: &R,
) -> Result<Values, SqlDepotError> {
    if row.column_count() != names.len() {
        return Err(SqlDepotError::ExecutionError(format!(
            "row has {} columns, expected {}",
            row.column_count(),
            names.len()
        )));
    }
    let mut values = Values::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        values.insert(name.as_str(), row.capture(idx)?);
    }
    Ok(values)
}

impl RowSource for [Value] {
    fn column_count(&self) -> usize {
        self.len()
    }

    fn capture(&self, idx: usize) -> Result<Value, SqlDepotError> {
        self.get(idx)
            .cloned()
            .ok_or_else(|| SqlDepotError::ExecutionError(format!("column {idx} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn keys_follow_requested_order() {
        let row = vec![Value::from("1"), Value::Int(4), Value::Blob(vec![9])];
        let values = materialize(&names(&["id", "len", "attachment"]), row.as_slice()).unwrap();
        let keys: Vec<&str> = values.keys().collect();
        assert_eq!(keys, ["id", "len", "attachment"]);
        assert_eq!(values.get_bytes("attachment"), Some(&[9_u8][..]));
    }

    #[test]
    fn width_mismatch_is_an_error() {
        let row = vec![Value::Int(1)];
        let err = materialize(&names(&["a", "b"]), row.as_slice()).unwrap_err();
        assert!(matches!(err, SqlDepotError::ExecutionError(_)));
    }
}
