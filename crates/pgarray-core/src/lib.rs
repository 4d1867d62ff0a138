//! # pgarray-core
//!
//! Core types shared by every pgarray crate: the error enum, settings, the
//! settings loader and tracing setup. This crate has no pgarray dependencies.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Settings and global configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{PgArrayError, PgArrayResult, ValidationError};
pub use settings::{Settings, SETTINGS};
