//! Mapping seam for repositories that convert typed structs to and from [`Values`].
//!
//! Implementations are written field by field (by hand or by a code generator), which keeps
//! row mapping free of runtime reflection:
//! ```rust
//! use sql_depot::prelude::*;
//!
//! struct Message {
//!     id: String,
//!     text: String,
//! }
//!
//! impl FromValues for Message {
//!     fn from_values(values: &Values) -> Result<Self, SqlDepotError> {
//!         Ok(Message {
//!             id: values.get_string("id").ok_or_else(|| missing_field::<Self>(values, "id"))?,
//!             text: values
//!                 .get_string("text")
//!                 .ok_or_else(|| missing_field::<Self>(values, "text"))?,
//!         })
//!     }
//! }
//!
//! impl ToValues for Message {
//!     fn to_values(&self) -> Values {
//!         Values::new().with("id", self.id.as_str()).with("text", self.text.as_str())
//!     }
//! }
//!
//! let row = Values::new().with("id", "1").with("text", "hello, world");
//! let msg = Message::from_values(&row).unwrap();
//! assert_eq!(msg.to_values(), row);
//! ```

use crate::error::SqlDepotError;
use crate::values::Values;

pub trait FromValues: Sized {
    /// Build an entity from one materialized row.
    ///
    /// # Errors
    /// Returns `SqlDepotError::Mapping` when a column is absent or holds an unexpected kind.
    fn from_values(values: &Values) -> Result<Self, SqlDepotError>;
}

pub trait ToValues {
    fn to_values(&self) -> Values;
}

/// Mapping error for `column` of entity `T`, naming the value that was found.
#[must_use]
pub fn missing_field<T>(values: &Values, column: &str) -> SqlDepotError {
    let entity = std::any::type_name::<T>();
    match values.get(column) {
        Some(found) => SqlDepotError::Mapping(format!(
            "failed to get {column} for {entity}: invalid {} value: {found:?}",
            found.kind()
        )),
        None => SqlDepotError::Mapping(format!("failed to get {column} for {entity}: missing")),
    }
}
