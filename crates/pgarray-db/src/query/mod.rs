//! Query building, compilation, and execution.
//!
//! - [`lookups`] - Q objects and lookup types, including the array operators
//! - [`compiler`] - Statement ASTs, rows and PostgreSQL compilation
//! - [`queryset`] - QuerySet and Manager for lazy query building

pub mod compiler;
pub mod lookups;
pub mod queryset;

pub use compiler::{
    ArrayColumn, Column, DatabaseBackendType, DeleteQuery, FromValue, InsertQuery, OrderBy, Query,
    Row, SqlCompiler, UpdateQuery, WhereNode,
};
pub use lookups::{compare_values, Lookup, Q};
pub use queryset::{Manager, QuerySet};
