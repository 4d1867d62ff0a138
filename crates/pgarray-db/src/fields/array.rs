//! The PostgreSQL array field.
//!
//! An [`ArrayField`] stores a homogeneous, optionally multi-dimensional list
//! in a single `<dbtype>[]` column. Values travel to and from the database as
//! array literals (see [`crate::literal`]); element conversion is driven by
//! the field's [`ElementType`] or by an explicit type cast.
//!
//! # Examples
//!
//! ```
//! use pgarray_db::fields::ArrayField;
//! use pgarray_db::value::Value;
//!
//! let field = ArrayField::new("lista").dbtype("text").dimension(2);
//! assert_eq!(field.db_type(), "text[][]");
//!
//! let literal = field.to_db_literal(&Value::from(vec![vec![1, 2], vec![3, 4]])).unwrap();
//! assert_eq!(literal.as_deref(), Some("{{1,2},{3,4}}"));
//! assert_eq!(
//!     field.from_db_value(literal.as_deref()).unwrap(),
//!     Value::from(vec![vec!["1", "2"], vec!["3", "4"]])
//! );
//! ```

use std::fmt;
use std::sync::Arc;

use pgarray_core::{PgArrayError, PgArrayResult, ValidationError, SETTINGS};

use crate::fields::types::{FieldDef, FieldType};
use crate::types::ElementType;
use crate::validators::{ArrayMaxLengthValidator, ChoicesValidator, DimensionValidator, Validator};
use crate::value::Value;

/// Converts one element to its in-process value, overriding the element
/// type's default cast.
pub type TypeCast = Arc<dyn Fn(&Value) -> PgArrayResult<Value> + Send + Sync>;

/// Produces a fresh default value.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// The default of an array field.
#[derive(Clone)]
pub enum FieldDefault {
    /// A fixed value.
    Value(Value),
    /// A value computed on each call.
    Factory(DefaultFactory),
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A PostgreSQL array column.
///
/// Defaults: `dbtype` from settings (`int` unless configured), one
/// dimension, `null` and `blank` allowed, no default, no choices.
#[derive(Clone)]
pub struct ArrayField {
    /// The Rust attribute name of this field.
    pub name: &'static str,
    /// The database column name.
    pub column: String,
    /// Number of array dimensions.
    pub dimension: usize,
    /// Whether NULL is allowed.
    pub null: bool,
    /// Whether an empty list is allowed.
    pub blank: bool,
    /// Allowed element values as (value, label) pairs.
    pub choices: Option<Vec<(Value, String)>>,
    /// Human-readable name for the field.
    pub verbose_name: String,
    /// Human-readable help text.
    pub help_text: String,
    /// Maximum number of items in the outermost list.
    pub size: Option<usize>,
    element: ElementType,
    type_cast: Option<TypeCast>,
    default: Option<FieldDefault>,
    validators: Vec<Arc<dyn Validator>>,
}

impl fmt::Debug for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayField")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("dbtype", &self.element.dbtype())
            .field("dimension", &self.dimension)
            .field("null", &self.null)
            .field("blank", &self.blank)
            .field("choices", &self.choices)
            .field("size", &self.size)
            .field("type_cast", &self.type_cast.is_some())
            .field("default", &self.default)
            .field("validators", &self.validators)
            .finish_non_exhaustive()
    }
}

fn default_dbtype() -> String {
    if SETTINGS.is_configured() {
        SETTINGS.get().array.default_dbtype.clone()
    } else {
        "int".to_string()
    }
}

impl ArrayField {
    /// Creates an array field with the default options.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            column: name.to_string(),
            dimension: 1,
            null: true,
            blank: true,
            choices: None,
            verbose_name: name.replace('_', " "),
            help_text: String::new(),
            size: None,
            element: ElementType::from_dbtype(&default_dbtype()),
            type_cast: None,
            default: None,
            validators: Vec::new(),
        }
    }

    /// Sets the element SQL type (e.g. "text", "varchar(10)", "macaddr").
    #[must_use]
    pub fn dbtype(mut self, dbtype: &str) -> Self {
        self.element = ElementType::from_dbtype(dbtype);
        self
    }

    /// Sets the element type directly.
    #[must_use]
    pub fn element(mut self, element: ElementType) -> Self {
        self.element = element;
        self
    }

    /// Sets the number of dimensions.
    #[must_use]
    pub const fn dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Overrides the per-element cast.
    #[must_use]
    pub fn type_cast(mut self, cast: impl Fn(&Value) -> PgArrayResult<Value> + Send + Sync + 'static) -> Self {
        self.type_cast = Some(Arc::new(cast));
        self
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Sets whether NULL is allowed.
    #[must_use]
    pub const fn null(mut self, null: bool) -> Self {
        self.null = null;
        self
    }

    /// Sets whether an empty list is allowed.
    #[must_use]
    pub const fn blank(mut self, blank: bool) -> Self {
        self.blank = blank;
        self
    }

    /// Sets a fixed default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Sets a default computed on each call (e.g. `Vec::new`).
    #[must_use]
    pub fn default_factory(mut self, factory: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Factory(Arc::new(factory)));
        self
    }

    /// Restricts elements to the given (value, label) pairs.
    #[must_use]
    pub fn choices<V: Into<Value>>(mut self, choices: Vec<(V, &str)>) -> Self {
        self.choices = Some(
            choices
                .into_iter()
                .map(|(value, label)| (value.into(), label.to_string()))
                .collect(),
        );
        self
    }

    /// Limits the number of items in the outermost list.
    #[must_use]
    pub const fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the verbose (human-readable) name.
    #[must_use]
    pub fn verbose_name(mut self, name: impl Into<String>) -> Self {
        self.verbose_name = name.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Adds a validator run by [`validate`](Self::validate).
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// The element type.
    pub const fn element_type(&self) -> &ElementType {
        &self.element
    }

    /// Returns `true` when a custom per-element cast is configured.
    pub const fn has_type_cast(&self) -> bool {
        self.type_cast.is_some()
    }

    /// The column type, e.g. `int[]` or `text[][]`.
    pub fn db_type(&self) -> String {
        format!("{}{}", self.element.dbtype(), "[]".repeat(self.dimension))
    }

    /// Casts every leaf of `value` through the type cast or element type.
    ///
    /// # Errors
    ///
    /// Returns the cast's error for a leaf that cannot be converted.
    pub fn cast_elements(&self, value: &Value) -> PgArrayResult<Value> {
        match (&self.type_cast, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Some(_), Value::List(items)) => items
                .iter()
                .map(|item| self.cast_elements(item))
                .collect::<PgArrayResult<Vec<_>>>()
                .map(Value::List),
            (Some(cast), leaf) => cast(leaf),
            (None, other) => self.element.cast(other),
        }
    }

    /// Converts `value` to the form sent to the database.
    ///
    /// `Null` stays `Null`, lists are cast element-wise and a scalar is
    /// wrapped into a one-element list.
    ///
    /// # Errors
    ///
    /// Returns an element error if a leaf cannot be cast.
    pub fn get_prep_value(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::List(_) => self.cast_elements(value),
            scalar => Ok(Value::List(vec![self.cast_elements(scalar)?])),
        }
    }

    /// Formats `value` as an array literal, or `None` for NULL.
    ///
    /// # Errors
    ///
    /// Returns an error if a leaf cannot be cast or the list is ragged.
    pub fn to_db_literal(&self, value: &Value) -> PgArrayResult<Option<String>> {
        let prepared = self.get_prep_value(value)?;
        if prepared.is_null() {
            return Ok(None);
        }
        self.element.format_literal(&prepared).map(Some)
    }

    /// Converts a column value read from the database.
    ///
    /// The declared dimension is not enforced here: PostgreSQL does not
    /// enforce it either, so whatever the column holds is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid array literal of the
    /// element type.
    pub fn from_db_value(&self, raw: Option<&str>) -> PgArrayResult<Value> {
        let Some(text) = raw else {
            return Ok(Value::Null);
        };
        let parsed = self.element.parse_literal(text, None)?;
        match &self.type_cast {
            Some(_) => self.cast_elements(&parsed),
            None => Ok(parsed),
        }
    }

    /// Converts loosely-typed input (lists, array literals, JSON arrays) to
    /// the field's value.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::SerializationError`] for a string that is
    /// neither an array literal nor a JSON array, or an element error.
    pub fn to_python(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.starts_with('{') || trimmed.contains("]={") {
                    let parsed = self.element.parse_literal(trimmed, None)?;
                    self.cast_elements(&parsed)
                } else if trimmed.starts_with('[') {
                    let json: serde_json::Value = serde_json::from_str(trimmed)
                        .map_err(|e| PgArrayError::SerializationError(e.to_string()))?;
                    let untyped = Value::from_json(&json).ok_or_else(|| {
                        PgArrayError::SerializationError(format!(
                            "{trimmed:?} cannot be represented as an array"
                        ))
                    })?;
                    self.cast_elements(&untyped)
                } else {
                    Err(PgArrayError::SerializationError(format!(
                        "{trimmed:?} is neither an array literal nor a JSON array"
                    )))
                }
            }
            other => self.get_prep_value(other),
        }
    }

    /// Returns the field's string form: JSON text of the prepared value.
    ///
    /// # Errors
    ///
    /// Returns an element error if a leaf cannot be cast.
    pub fn value_to_string(&self, value: &Value) -> PgArrayResult<String> {
        let prepared = self.get_prep_value(value)?;
        serde_json::to_string(&prepared.to_json())
            .map_err(|e| PgArrayError::SerializationError(e.to_string()))
    }

    /// Returns `true` when a default is configured.
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Returns the default value (`Null` when none is configured).
    pub fn get_default(&self) -> Value {
        match &self.default {
            Some(FieldDefault::Value(v)) => v.clone(),
            Some(FieldDefault::Factory(factory)) => factory(),
            None => Value::Null,
        }
    }

    /// Checks `value` against the field's options and validators.
    ///
    /// # Errors
    ///
    /// Returns the first failing check: `null`, `blank`, `invalid_choice`,
    /// `max_length`, `invalid_dimension`, then custom validators.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if value.is_null() {
            if self.null {
                return Ok(());
            }
            return Err(ValidationError::new("This field cannot be null.", "null"));
        }
        if value.is_empty_list() && !self.blank {
            return Err(ValidationError::new("This field cannot be blank.", "blank"));
        }

        if let Some(choices) = &self.choices {
            let allowed = choices.iter().map(|(v, _)| v.clone()).collect();
            ChoicesValidator::new(allowed).validate(value)?;
        }
        if let Some(size) = self.size {
            ArrayMaxLengthValidator::new(size).validate(value)?;
        }
        DimensionValidator::new(self.dimension).validate(value)?;

        for validator in &self.validators {
            validator.validate(value)?;
        }
        Ok(())
    }

    /// Runs [`to_python`](Self::to_python) and then [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Conversion failures are reported as code `invalid`.
    pub fn clean(&self, value: &Value) -> Result<Value, ValidationError> {
        let converted = self
            .to_python(value)
            .map_err(|e| ValidationError::new(e.to_string(), "invalid"))?;
        self.validate(&converted)?;
        Ok(converted)
    }

    /// Describes this column as a generic [`FieldDef`].
    pub fn field_def(&self) -> FieldDef {
        let mut field_type = FieldType::from(&self.element);
        for level in 0..self.dimension {
            field_type = FieldType::ArrayField {
                base_field: Box::new(field_type),
                size: if level + 1 == self.dimension { self.size } else { None },
            };
        }

        let mut def = FieldDef::new(self.name, field_type)
            .column(self.column.clone())
            .verbose_name(self.verbose_name.clone())
            .help_text(self.help_text.clone());
        def.null = self.null;
        def.blank = self.blank;
        if let Some(FieldDefault::Value(v)) = &self.default {
            def.default = Some(v.clone());
        }
        def
    }
}
