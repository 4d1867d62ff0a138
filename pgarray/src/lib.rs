//! # pgarray
//!
//! PostgreSQL array columns for a Django-style Rust ORM.
//!
//! This is the meta-crate that re-exports the sub-crates. Depend on `pgarray`
//! for everything, or on the individual crates for finer-grained control.
//!
//! ```
//! use pgarray::prelude::*;
//!
//! let text = ElementType::from_dbtype("text");
//! let grid = text.parse_literal(r#"{{"a b",NULL},{c,d}}"#, Some(2)).unwrap();
//! assert_eq!(text.format_literal(&grid).unwrap(), r#"{{"a b",NULL},{c,d}}"#);
//! ```
//!
//! Enable the `postgres` feature for the tokio-postgres backend.

/// Error types, settings and logging setup.
pub use pgarray_core as core;

/// Array literal codec, element types, `ArrayField`, lookups and `QuerySet`.
pub use pgarray_db as db;

/// Database backends: in-memory and `PostgreSQL`.
pub use pgarray_db_backends as db_backends;

/// Array form fields, widgets and model forms.
#[cfg(feature = "forms")]
pub use pgarray_forms as forms;

// Third-party re-exports
pub use async_trait;
pub use chrono;
pub use serde_json;
pub use tokio;
pub use tracing;
pub use tracing_subscriber;

/// The most commonly used types, for glob import.
pub mod prelude {
    pub use pgarray_core::{PgArrayError, PgArrayResult, Settings, ValidationError, SETTINGS};
    pub use pgarray_db::{
        format_array_literal, parse_array_literal, register_type, ArrayField, DbExecutor,
        ElementType, FieldDef, FieldType, Lookup, Manager, Model, ModelMeta, QuerySet, Row,
        TypeAdapter, Value, Q,
    };
    pub use pgarray_db_backends::{connect, DatabaseConfig, MemoryBackend};

    #[cfg(feature = "postgres")]
    pub use pgarray_db_backends::PostgresBackend;

    #[cfg(feature = "forms")]
    pub use pgarray_forms::{
        model_form, model_form_for_instance, ArrayFormField, BaseForm, Form, FormValue,
        TypedMultipleChoiceField,
    };
}
