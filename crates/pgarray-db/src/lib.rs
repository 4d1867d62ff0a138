//! # pgarray-db
//!
//! PostgreSQL array columns for the pgarray ORM. The crate is built around the
//! array literal codec in [`literal`]: values travel to and from the database
//! as text such as `{1,2,3}` or `{{"a b",NULL},{c,d}}`, and every other layer
//! (element types, [`ArrayField`](fields::ArrayField), lookups, the SQL
//! compiler) converts through it.
//!
//! ## Module Overview
//!
//! - [`value`] - The backend-agnostic [`Value`](value::Value) enum
//! - [`literal`] - Parsing and formatting of array literals
//! - [`types`] - Element types resolved from SQL type names
//! - [`adapters`] - Custom element type adapters and their registry
//! - [`fields`] - [`ArrayField`](fields::ArrayField) and scalar field definitions
//! - [`validators`] - Array validators
//! - [`model`] - The [`Model`](model::Model) trait and [`ModelMeta`](model::ModelMeta)
//! - [`query`] - Lookups, statement compilation, QuerySet and Manager
//! - [`executor`] - The backend interface and model CRUD helpers

// These clippy lints are intentionally allowed for the ORM crate:
// - struct_excessive_bools: field definitions mirror Django's boolean options
// - too_many_lines: the compiler and codec match over many cases
// - cast_precision_loss: i64-to-f64 casts when comparing numeric elements
// - result_large_err: PgArrayError is used consistently across the crate
// - format_push_string: format! with push_str is clearer for SQL generation
// - doc_markdown: backtick requirements for documentation items are too strict
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::result_large_err)]
#![allow(clippy::format_push_string)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::use_self)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::unused_self)]
#![allow(clippy::cast_possible_truncation)]

pub mod adapters;
pub mod executor;
pub mod fields;
pub mod literal;
pub mod model;
pub mod query;
pub mod types;
pub mod validators;
pub mod value;

// Re-export the most commonly used types at the crate root.
pub use adapters::{lookup_type, register_type, MacAddrAdapter, TypeAdapter, TypeRegistry};
pub use executor::{create_model, delete_model, refresh_model, save_model, DbExecutor};
pub use fields::{ArrayField, FieldDef, FieldType};
pub use literal::{format_array_literal, parse_array_literal};
pub use model::{Model, ModelField, ModelMeta};
pub use pgarray_core::{PgArrayError, PgArrayResult, ValidationError};
pub use query::{
    ArrayColumn, Column, DatabaseBackendType, Lookup, Manager, OrderBy, Query, QuerySet, Row,
    SqlCompiler, WhereNode, Q,
};
pub use types::{ElementKind, ElementType};
pub use value::Value;
