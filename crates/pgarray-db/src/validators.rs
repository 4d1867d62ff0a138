//! Validators for array values.
//!
//! Validators are attached to an [`ArrayField`](crate::fields::ArrayField)
//! and run by its `validate` after the null and blank checks. Each checks a
//! single constraint on the whole array value.

use std::fmt;

use pgarray_core::ValidationError;

use crate::literal::array_shape;
use crate::value::Value;

/// A trait for validating array values.
///
/// # Examples
///
/// ```
/// use pgarray_db::validators::{ArrayMaxLengthValidator, Validator};
/// use pgarray_db::value::Value;
///
/// let v = ArrayMaxLengthValidator::new(2);
/// assert!(v.validate(&Value::from(vec![1, 2])).is_ok());
/// assert!(v.validate(&Value::from(vec![1, 2, 3])).is_err());
/// ```
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validates the given value, returning an error if invalid.
    fn validate(&self, value: &Value) -> Result<(), ValidationError>;

    /// Returns a human-readable name for this validator.
    fn name(&self) -> &str;
}

/// Validates that a list has at most `max_length` items.
#[derive(Debug, Clone)]
pub struct ArrayMaxLengthValidator {
    /// The maximum number of items.
    pub max_length: usize,
}

impl ArrayMaxLengthValidator {
    /// Creates a new `ArrayMaxLengthValidator`.
    pub const fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Validator for ArrayMaxLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if let Value::List(items) = value {
            if items.len() > self.max_length {
                return Err(ValidationError::new(
                    format!(
                        "List contains {} items, it should contain no more than {}.",
                        items.len(),
                        self.max_length
                    ),
                    "max_length",
                )
                .with_param("limit_value", self.max_length.to_string())
                .with_param("show_value", items.len().to_string()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ArrayMaxLengthValidator"
    }
}

/// Validates that a list has at least `min_length` items.
#[derive(Debug, Clone)]
pub struct ArrayMinLengthValidator {
    /// The minimum number of items.
    pub min_length: usize,
}

impl ArrayMinLengthValidator {
    /// Creates a new `ArrayMinLengthValidator`.
    pub const fn new(min_length: usize) -> Self {
        Self { min_length }
    }
}

impl Validator for ArrayMinLengthValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if let Value::List(items) = value {
            if items.len() < self.min_length {
                return Err(ValidationError::new(
                    format!(
                        "List contains {} items, it should contain no fewer than {}.",
                        items.len(),
                        self.min_length
                    ),
                    "min_length",
                )
                .with_param("limit_value", self.min_length.to_string())
                .with_param("show_value", items.len().to_string()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ArrayMinLengthValidator"
    }
}

/// Validates that a non-empty list is rectangular and nested exactly
/// `dimension` deep.
#[derive(Debug, Clone)]
pub struct DimensionValidator {
    /// The required nesting depth.
    pub dimension: usize,
}

impl DimensionValidator {
    /// Creates a new `DimensionValidator`.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Validator for DimensionValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        if !matches!(value, Value::List(_)) {
            return Ok(());
        }
        let shape = array_shape(value).map_err(|_| {
            ValidationError::new(
                "Nested lists must all have the same length.",
                "ragged_array",
            )
        })?;
        if !shape.contains(&0) && shape.len() != self.dimension {
            return Err(ValidationError::new(
                format!(
                    "Expected an array of dimension {}, got {}.",
                    self.dimension,
                    shape.len()
                ),
                "invalid_dimension",
            )
            .with_param("dimension", self.dimension.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "DimensionValidator"
    }
}

/// Validates that every leaf of a list is one of the allowed values.
///
/// `Null` leaves are not checked.
#[derive(Debug, Clone)]
pub struct ChoicesValidator {
    /// The allowed values.
    pub allowed: Vec<Value>,
}

impl ChoicesValidator {
    /// Creates a new `ChoicesValidator`.
    pub fn new(allowed: Vec<Value>) -> Self {
        Self { allowed }
    }
}

impl Validator for ChoicesValidator {
    fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        for leaf in value.flatten() {
            if leaf.is_null() || self.allowed.contains(leaf) {
                continue;
            }
            return Err(ValidationError::new(
                format!("Value '{leaf}' is not a valid choice."),
                "invalid_choice",
            )
            .with_param("value", leaf.to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ChoicesValidator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_length() {
        let v = ArrayMaxLengthValidator::new(2);
        assert!(v.validate(&Value::from(vec![1, 2])).is_ok());
        let err = v.validate(&Value::from(vec![1, 2, 3])).unwrap_err();
        assert_eq!(err.code, "max_length");
        assert_eq!(
            err.message,
            "List contains 3 items, it should contain no more than 2."
        );
    }

    #[test]
    fn test_min_length() {
        let v = ArrayMinLengthValidator::new(1);
        assert!(v.validate(&Value::from(vec![1])).is_ok());
        let err = v.validate(&Value::List(vec![])).unwrap_err();
        assert_eq!(err.code, "min_length");
    }

    #[test]
    fn test_length_validators_ignore_non_lists() {
        assert!(ArrayMaxLengthValidator::new(0).validate(&Value::Null).is_ok());
        assert!(ArrayMinLengthValidator::new(3).validate(&Value::Int(1)).is_ok());
    }

    #[test]
    fn test_dimension() {
        let v = DimensionValidator::new(2);
        assert!(v.validate(&Value::from(vec![vec![1], vec![2]])).is_ok());
        assert!(v.validate(&Value::List(vec![])).is_ok());
        let err = v.validate(&Value::from(vec![1, 2])).unwrap_err();
        assert_eq!(err.code, "invalid_dimension");
        assert_eq!(err.message, "Expected an array of dimension 2, got 1.");
    }

    #[test]
    fn test_dimension_ragged() {
        let ragged = Value::List(vec![Value::from(vec![1, 2]), Value::from(vec![3])]);
        let err = DimensionValidator::new(2).validate(&ragged).unwrap_err();
        assert_eq!(err.code, "ragged_array");
    }

    #[test]
    fn test_choices() {
        let v = ChoicesValidator::new(vec![Value::from("A"), Value::from("B")]);
        assert!(v.validate(&Value::from(vec!["A", "B", "A"])).is_ok());
        assert!(v.validate(&Value::List(vec![Value::Null])).is_ok());
        let err = v.validate(&Value::from(vec!["A", "C"])).unwrap_err();
        assert_eq!(err.message, "Value 'C' is not a valid choice.");
        assert_eq!(err.code, "invalid_choice");
        assert_eq!(err.params.get("value").map(String::as_str), Some("C"));
    }

    #[test]
    fn test_choices_nested() {
        let v = ChoicesValidator::new(vec![Value::Int(1), Value::Int(2)]);
        assert!(v.validate(&Value::from(vec![vec![1, 2], vec![2, 1]])).is_ok());
        assert!(v.validate(&Value::from(vec![vec![1, 3]])).is_err());
    }

    #[test]
    fn test_validator_names() {
        assert_eq!(ArrayMaxLengthValidator::new(1).name(), "ArrayMaxLengthValidator");
        assert_eq!(ArrayMinLengthValidator::new(1).name(), "ArrayMinLengthValidator");
        assert_eq!(DimensionValidator::new(1).name(), "DimensionValidator");
        assert_eq!(ChoicesValidator::new(vec![]).name(), "ChoicesValidator");
    }
}
