//! Core error types for pgarray.
//!
//! [`PgArrayError`] covers the failures of the array codec, the ORM layer,
//! form and model validation, configuration and database access.
//! [`ValidationError`] carries the message and code reported to forms.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Represents a validation error with optional field-level errors.
///
/// # Examples
///
/// ```
/// use pgarray_core::error::ValidationError;
///
/// let err = ValidationError::new("This field cannot be blank.", "blank");
/// assert_eq!(err.code, "blank");
///
/// let mut field_errors = std::collections::HashMap::new();
/// field_errors.insert(
///     "tags".to_string(),
///     vec![ValidationError::new("This field cannot be null.", "null")],
/// );
/// let err = ValidationError::with_field_errors(field_errors);
/// assert!(err.to_string().contains("tags"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The primary error message.
    pub message: String,
    /// A short code identifying the failure (e.g. "blank", "invalid_choice").
    pub code: String,
    /// Additional parameters providing context for the error message.
    pub params: HashMap<String, String>,
    /// Per-field validation errors, keyed by field name.
    pub field_errors: HashMap<String, Vec<Self>>,
}

impl ValidationError {
    /// Creates a new `ValidationError` with a message and code.
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            params: HashMap::new(),
            field_errors: HashMap::new(),
        }
    }

    /// Creates a `ValidationError` containing per-field errors.
    pub fn with_field_errors(field_errors: HashMap<String, Vec<Self>>) -> Self {
        Self {
            message: String::new(),
            code: String::new(),
            params: HashMap::new(),
            field_errors,
        }
    }

    /// Adds a parameter to this validation error.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.message.is_empty() {
            write!(f, "{}", self.message)?;
        } else if !self.field_errors.is_empty() {
            let mut names: Vec<&String> = self.field_errors.keys().collect();
            names.sort();
            let mut first = true;
            for field in names {
                for error in &self.field_errors[field] {
                    if !first {
                        write!(f, "; ")?;
                    }
                    write!(f, "{field}: {error}")?;
                    first = false;
                }
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for pgarray.
#[derive(Error, Debug)]
pub enum PgArrayError {
    // ── Array codec ──────────────────────────────────────────────────

    /// An array literal could not be parsed or formatted.
    #[error("Malformed array literal {input:?}: {message}")]
    ArrayLiteral {
        /// The offending input (literal text, or a debug rendering of the value).
        input: String,
        /// What went wrong.
        message: String,
    },

    /// A single element could not be converted to or from its SQL type.
    #[error("Invalid {type_name} element {input:?}: {message}")]
    InvalidElement {
        /// The SQL element type name (e.g. "int", "macaddr").
        type_name: String,
        /// The element text or value.
        input: String,
        /// What went wrong.
        message: String,
    },

    // ── ORM errors ───────────────────────────────────────────────────

    /// Raised when a query expected exactly one result but found none.
    #[error("Object does not exist: {0}")]
    DoesNotExist(String),

    /// Raised when a query expected exactly one result but found multiple.
    #[error("Multiple objects returned when one expected: {0}")]
    MultipleObjectsReturned(String),

    /// A field name that the model does not define.
    #[error("Unknown field: {0}")]
    FieldError(String),

    /// A lookup applied to a column type it is not defined for.
    #[error("Invalid lookup: {0}")]
    InvalidLookup(String),

    /// A generic database error.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// An operational database error (connection failure, etc.).
    #[error("Operational error: {0}")]
    OperationalError(String),

    // ── Validation ───────────────────────────────────────────────────

    /// One or more fields failed validation.
    #[error("Validation error: {0}")]
    ValidationError(ValidationError),

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// An error occurred converting a value to or from its string form.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PgArrayError {
    /// Shorthand for an [`PgArrayError::ArrayLiteral`] error.
    pub fn literal(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArrayLiteral {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`PgArrayError::InvalidElement`] error.
    pub fn element(
        type_name: impl Into<String>,
        input: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::InvalidElement {
            type_name: type_name.into(),
            input: input.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for errors caused by bad input data rather than by the
    /// database or configuration.
    pub const fn is_data_error(&self) -> bool {
        matches!(
            self,
            Self::ArrayLiteral { .. }
                | Self::InvalidElement { .. }
                | Self::ValidationError(_)
                | Self::SerializationError(_)
        )
    }
}

impl From<ValidationError> for PgArrayError {
    fn from(err: ValidationError) -> Self {
        Self::ValidationError(err)
    }
}

/// A convenience type alias for `Result<T, PgArrayError>`.
pub type PgArrayResult<T> = Result<T, PgArrayError>;
