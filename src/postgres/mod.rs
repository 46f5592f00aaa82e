// PostgreSQL backend
//
// - config: options, builder and the bb8 connection manager
// - params: `ToSql` for `Value`
// - query: column decoding into `Value`
// - backend: the `Backend` / `DriverTransaction` implementations

mod backend;
pub mod config;
pub mod params;
pub mod query;

pub use backend::PostgresBackend;
pub use config::{PgManager, PostgresOptions, PostgresOptionsBuilder};
