//! Query lookups and Q objects for building complex filters.
//!
//! This module provides the [`Lookup`] enum for field-level comparisons,
//! including the PostgreSQL array operators, and the [`Q`] enum for combining
//! filters with AND, OR, and NOT operators.
//!
//! # Examples
//!
//! ```
//! use pgarray_db::query::lookups::{Lookup, Q};
//! use pgarray_db::value::Value;
//!
//! // lista @> '{1,3}'
//! let q = Q::filter("lista", Lookup::Contains(Value::from(vec![1, 3])));
//!
//! // Combining with OR: lista && '{2}' OR lista IS NULL
//! let either = q | Q::filter("lista", Lookup::IsNull(true));
//!
//! // NOT: NOT(array_length(lista, 1) = 0)
//! let negated = !Q::filter("lista", Lookup::Len(0));
//! # let _ = (either, negated);
//! ```

use std::cmp::Ordering;
use std::ops;

use crate::value::Value;

/// A field-level lookup operation.
///
/// Operands of array lookups are lists; on an array column every other
/// operand is prepared through the field before compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Exact match (`field = value`, or `IS NULL` for `Null`).
    Exact(Value),
    /// NULL test (`field IS NULL` or `field IS NOT NULL`).
    IsNull(bool),
    /// Membership test (`field IN (values...)`).
    In(Vec<Value>),
    /// Greater than (`field > value`).
    Gt(Value),
    /// Greater than or equal (`field >= value`).
    Gte(Value),
    /// Less than (`field < value`).
    Lt(Value),
    /// Less than or equal (`field <= value`).
    Lte(Value),
    /// The array holds every element of the operand (`field @> value`).
    Contains(Value),
    /// Every element of the array is in the operand (`field <@ value`).
    ContainedBy(Value),
    /// The array and the operand share an element (`field && value`).
    Overlap(Value),
    /// The length of the first dimension equals `n` (0 for `{}`).
    Len(usize),
    /// Applies a lookup to the element at a 1-based position
    /// (`field[i]`); a missing element is NULL.
    Index(usize, Box<Lookup>),
}

impl Lookup {
    /// Returns the lookup name as used in `field__lookup` notation.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Exact(_) => "exact",
            Self::IsNull(_) => "isnull",
            Self::In(_) => "in",
            Self::Gt(_) => "gt",
            Self::Gte(_) => "gte",
            Self::Lt(_) => "lt",
            Self::Lte(_) => "lte",
            Self::Contains(_) => "contains",
            Self::ContainedBy(_) => "contained_by",
            Self::Overlap(_) => "overlap",
            Self::Len(_) => "len",
            Self::Index(..) => "index",
        }
    }

    /// Returns `true` for lookups only defined on array columns.
    pub const fn requires_array(&self) -> bool {
        matches!(
            self,
            Self::Contains(_) | Self::ContainedBy(_) | Self::Overlap(_) | Self::Len(_) | Self::Index(..)
        )
    }

    /// Evaluates the lookup against a column value in process, with the
    /// semantics PostgreSQL gives the compiled SQL.
    ///
    /// A NULL column matches only `IsNull(true)` and `Exact(Null)`.
    /// Containment compares the flattened elements; NULL elements never
    /// compare equal.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Exact(Value::Null) | Self::IsNull(true) => value.is_null(),
            Self::IsNull(false) => !value.is_null(),
            _ if value.is_null() => false,
            Self::Exact(expected) => sql_eq(value, expected),
            Self::In(candidates) => candidates.iter().any(|c| sql_eq(value, c)),
            Self::Gt(other) => compare_values(value, other) == Some(Ordering::Greater),
            Self::Gte(other) => matches!(
                compare_values(value, other),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(other) => compare_values(value, other) == Some(Ordering::Less),
            Self::Lte(other) => matches!(
                compare_values(value, other),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Contains(needle) => contains_all(value, needle),
            Self::ContainedBy(haystack) => contains_all(haystack, value),
            Self::Overlap(other) => {
                let theirs = other.flatten();
                value
                    .flatten()
                    .iter()
                    .any(|mine| !mine.is_null() && theirs.contains(mine))
            }
            Self::Len(n) => value.as_list().is_some_and(|items| items.len() == *n),
            Self::Index(position, inner) => {
                let element = value
                    .as_list()
                    .and_then(|items| position.checked_sub(1).and_then(|i| items.get(i)))
                    .unwrap_or(&Value::Null);
                inner.matches(element)
            }
        }
    }
}

/// `=` with NULL never equal to anything.
fn sql_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
            (*a as f64) == *b
        }
        (a, b) => a == b,
    }
}

/// Every non-NULL leaf of `needle` occurs in `haystack`; a NULL leaf in
/// `needle` makes the result false.
fn contains_all(haystack: &Value, needle: &Value) -> bool {
    if haystack.is_null() || needle.is_null() {
        return false;
    }
    let available = haystack.flatten();
    needle
        .flatten()
        .iter()
        .all(|wanted| !wanted.is_null() && available.iter().any(|have| sql_eq(have, wanted)))
}

/// Orders two values of compatible types; lists compare element-wise.
///
/// Returns `None` for NULL or mismatched types.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::DateTimeTz(a), Value::DateTimeTz(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare_values(x, y)? {
                    Ordering::Equal => {}
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

/// A composable query filter, equivalent to Django's `Q` object.
///
/// `Q` objects can be combined using `&` (AND), `|` (OR), and `!` (NOT)
/// operators to build arbitrarily complex WHERE clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Q {
    /// A single field lookup.
    Filter {
        /// The field name.
        field: String,
        /// The lookup operation.
        lookup: Lookup,
    },
    /// Logical AND of multiple conditions.
    And(Vec<Q>),
    /// Logical OR of multiple conditions.
    Or(Vec<Q>),
    /// Logical negation of a condition.
    Not(Box<Q>),
}

impl Q {
    /// Creates a new filter Q object.
    pub fn filter(field: impl Into<String>, lookup: Lookup) -> Self {
        Self::Filter {
            field: field.into(),
            lookup,
        }
    }

    /// Returns `true` if this is an empty AND or OR.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => children.is_empty(),
            _ => false,
        }
    }
}

impl ops::BitAnd for Q {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            }
            (Self::And(mut left), other) => {
                left.push(other);
                Self::And(left)
            }
            (other, Self::And(mut right)) => {
                right.insert(0, other);
                Self::And(right)
            }
            (left, right) => Self::And(vec![left, right]),
        }
    }
}

impl ops::BitOr for Q {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            }
            (Self::Or(mut left), other) => {
                left.push(other);
                Self::Or(left)
            }
            (other, Self::Or(mut right)) => {
                right.insert(0, other);
                Self::Or(right)
            }
            (left, right) => Self::Or(vec![left, right]),
        }
    }
}

impl ops::Not for Q {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}
