//! Transaction-scoped data access over pooled `SQLite` and `PostgreSQL` connections.
//!
//! A [`Depot`] hands out [`Session`]s bound to one physical transaction. Sessions are carried
//! through a [`Context`], so nested units of work join the outer transaction instead of
//! opening their own. Statements are described with the clause DSL in [`query`], rendered
//! against a [`Dialect`], and rows come back as ordered [`Values`] containers.

pub mod config;
pub mod context;
pub mod depot;
pub mod dialect;
pub mod driver;
pub mod entity;
pub mod error;
pub mod prelude;
pub mod query;
pub mod render;
pub mod row;
pub mod session;
pub mod types;
pub mod values;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Options;
pub use context::Context;
pub use depot::Depot;
pub use dialect::{AsDialect, DefaultDialect, Dialect, PostgresDialect, Statement, StatementBuilder};
pub use entity::{FromValues, ToValues, missing_field};
pub use error::SqlDepotError;
pub use query::Clause;
pub use session::{Session, SessionStatus};
pub use types::{DatabaseType, Value};
pub use values::Values;
