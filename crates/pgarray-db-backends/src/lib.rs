//! Database backends for pgarray.
//!
//! - [`memory`] - an in-process store that evaluates statements directly
//! - [`postgresql`] - PostgreSQL via `tokio-postgres` with `deadpool-postgres`
//!   pooling (requires the `postgres` feature)
//!
//! Both implement [`DbExecutor`](pgarray_db::DbExecutor). Use
//! [`connect`](base::connect) to pick one from a [`DatabaseConfig`].

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::significant_drop_tightening)]

pub mod base;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgresql;

pub use base::{connect, create_table_sql, DatabaseConfig};
pub use memory::MemoryBackend;
#[cfg(feature = "postgres")]
pub use postgresql::PostgresBackend;
