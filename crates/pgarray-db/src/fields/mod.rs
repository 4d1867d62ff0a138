//! Field definitions and types for the ORM.
//!
//! [`ArrayField`] maps a PostgreSQL array column onto a model attribute.
//! [`FieldDef`] and [`FieldType`] describe ordinary scalar columns and give
//! array columns a generic description.

pub mod array;
pub mod types;

pub use array::{ArrayField, DefaultFactory, FieldDefault, TypeCast};
pub use types::{FieldDef, FieldType};
