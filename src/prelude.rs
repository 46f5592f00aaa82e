//! Convenient imports for common functionality.
//!
//! Clause constructors stay in [`crate::query`]; `from` and `into` would shadow the
//! conversion traits' method names in a glob import.

pub use crate::config::Options;
pub use crate::context::Context;
pub use crate::depot::Depot;
pub use crate::dialect::{DefaultDialect, Dialect, PostgresDialect, Statement, StatementBuilder};
pub use crate::entity::{FromValues, ToValues, missing_field};
pub use crate::error::SqlDepotError;
pub use crate::query::{Clause, ColsClause, OrderByClause, TableClause, WhereClause};
pub use crate::session::{Session, SessionStatus};
pub use crate::types::{DatabaseType, Value};
pub use crate::values::Values;

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresOptions, PostgresOptionsBuilder};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
