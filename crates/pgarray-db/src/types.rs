//! Array element types.
//!
//! [`ElementType`] resolves the SQL type name of an array's elements (its
//! `dbtype`, e.g. `int`, `varchar(10)`, `timestamp with time zone`) to the
//! conversions used by the literal codec and by field preparation.
//!
//! ```
//! use pgarray_db::types::ElementType;
//! use pgarray_db::value::Value;
//!
//! let text = ElementType::from_dbtype("text");
//! assert_eq!(text.cast(&Value::from(vec![1, 2])).unwrap(), Value::from(vec!["1", "2"]));
//!
//! let float = ElementType::from_dbtype("double precision");
//! assert_eq!(float.parse("Infinity").unwrap(), Value::Float(f64::INFINITY));
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pgarray_core::{PgArrayError, PgArrayResult};

use crate::adapters::{lookup_type, TypeAdapter};
use crate::literal::{format_array_literal, parse_array_literal};
use crate::value::Value;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S%.f";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATETIME_TZ_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Storage width of an integer element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    /// `smallint` / `int2`.
    Small,
    /// `integer` / `int4` / `serial`.
    Regular,
    /// `bigint` / `int8` / `bigserial`.
    Big,
}

impl IntWidth {
    /// Returns the inclusive range of values the width can hold.
    pub const fn bounds(self) -> (i64, i64) {
        match self {
            Self::Small => (i16::MIN as i64, i16::MAX as i64),
            Self::Regular => (i32::MIN as i64, i32::MAX as i64),
            Self::Big => (i64::MIN, i64::MAX),
        }
    }
}

/// How elements of one SQL type are converted.
#[derive(Debug, Clone)]
pub enum ElementKind {
    /// Integer types.
    Int(IntWidth),
    /// Floating-point types.
    Float,
    /// Character types, with the `(n)` length modifier if one was given.
    Text {
        /// Maximum length in characters.
        max_length: Option<usize>,
    },
    /// `boolean`.
    Bool,
    /// `date`.
    Date,
    /// `timestamp without time zone`.
    DateTime,
    /// `timestamp with time zone`.
    DateTimeTz,
    /// `time`.
    Time,
    /// `uuid`.
    Uuid,
    /// A type converted by a registered [`TypeAdapter`].
    Custom(Arc<dyn TypeAdapter>),
    /// An unknown type; elements are kept as text.
    Passthrough,
}

/// The element type of an array column.
#[derive(Debug, Clone)]
pub struct ElementType {
    dbtype: String,
    kind: ElementKind,
}

impl PartialEq for ElementType {
    fn eq(&self, other: &Self) -> bool {
        self.dbtype == other.dbtype
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dbtype)
    }
}

/// Splits `int`, `VARCHAR (10)` or `character  varying(5)` into the
/// lower-cased, whitespace-normalised base name and the modifier text.
fn split_dbtype(dbtype: &str) -> (String, Option<String>) {
    let (base, modifier) = match dbtype.find('(') {
        Some(open) => {
            let rest = &dbtype[open + 1..];
            let modifier = rest.split(')').next().unwrap_or_default().trim().to_string();
            (&dbtype[..open], Some(modifier))
        }
        None => (dbtype, None),
    };
    let base = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    (base, modifier)
}

impl ElementType {
    /// Resolves `dbtype` to an element type.
    ///
    /// Built-in names win; otherwise the process-wide adapter registry is
    /// consulted, and unknown names fall back to text passthrough.
    pub fn from_dbtype(dbtype: &str) -> Self {
        let (base, modifier) = split_dbtype(dbtype);
        let kind = match base.as_str() {
            "smallint" | "int2" | "smallserial" | "serial2" => ElementKind::Int(IntWidth::Small),
            "int" | "integer" | "int4" | "serial" | "serial4" => ElementKind::Int(IntWidth::Regular),
            "bigint" | "int8" | "bigserial" | "serial8" => ElementKind::Int(IntWidth::Big),
            "double precision" | "float8" | "float" | "real" | "float4" => ElementKind::Float,
            "text" | "citext" | "varchar" | "character varying" | "char" | "character"
            | "bpchar" => ElementKind::Text {
                max_length: modifier.as_deref().and_then(|m| m.parse().ok()),
            },
            "boolean" | "bool" => ElementKind::Bool,
            "date" => ElementKind::Date,
            "timestamp" | "timestamp without time zone" | "datetime" => ElementKind::DateTime,
            "timestamptz" | "timestamp with time zone" => ElementKind::DateTimeTz,
            "time" | "time without time zone" => ElementKind::Time,
            "uuid" => ElementKind::Uuid,
            other => match lookup_type(other) {
                Some(adapter) => ElementKind::Custom(adapter),
                None => {
                    tracing::debug!(dbtype = other, "no adapter registered, keeping elements as text");
                    ElementKind::Passthrough
                }
            },
        };

        Self {
            dbtype: dbtype.trim().to_string(),
            kind,
        }
    }

    /// Creates an element type converted by `adapter`.
    pub fn custom(adapter: Arc<dyn TypeAdapter>) -> Self {
        Self {
            dbtype: adapter.type_name().to_string(),
            kind: ElementKind::Custom(adapter),
        }
    }

    /// The SQL type name as given.
    pub fn dbtype(&self) -> &str {
        &self.dbtype
    }

    /// The conversion kind.
    pub const fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Returns `true` for character types and passthrough types.
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, ElementKind::Text { .. } | ElementKind::Passthrough)
    }

    fn invalid(&self, input: impl Into<String>, message: impl fmt::Display) -> PgArrayError {
        PgArrayError::element(self.dbtype.clone(), input, message)
    }

    /// Parses the text of one element.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::InvalidElement`] if `text` is not a valid
    /// literal of this type.
    pub fn parse(&self, text: &str) -> PgArrayResult<Value> {
        match &self.kind {
            ElementKind::Int(width) => {
                let n = text.trim().parse::<i64>().map_err(|e| self.invalid(text, e))?;
                self.check_range(*width, n)
            }
            ElementKind::Float => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| self.invalid(text, e)),
            ElementKind::Text { max_length } => {
                self.check_length(*max_length, text)?;
                Ok(Value::String(text.to_string()))
            }
            ElementKind::Passthrough => Ok(Value::String(text.to_string())),
            ElementKind::Bool => match text.trim().to_lowercase().as_str() {
                "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "f" | "false" | "n" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(self.invalid(text, "expected a boolean")),
            },
            ElementKind::Date => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| self.invalid(text, e)),
            ElementKind::DateTime => self.parse_datetime(text).map(Value::DateTime),
            ElementKind::DateTimeTz => self.parse_datetime_tz(text).map(Value::DateTimeTz),
            ElementKind::Time => NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
                .map(Value::Time)
                .map_err(|e| self.invalid(text, e)),
            ElementKind::Uuid => uuid::Uuid::parse_str(text.trim())
                .map(Value::Uuid)
                .map_err(|e| self.invalid(text, e)),
            ElementKind::Custom(adapter) => adapter.parse(text),
        }
    }

    /// Renders one non-NULL element as PostgreSQL input text.
    ///
    /// The value is cast first, so `Int(1)` formats as `1` for a text array
    /// and `"2011-11-11"` formats as a date for a date array.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::InvalidElement`] if the value cannot be cast.
    pub fn format(&self, value: &Value) -> PgArrayResult<String> {
        if let ElementKind::Custom(adapter) = &self.kind {
            return adapter.format(value);
        }
        let value = self.cast_scalar(value)?;
        Ok(match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if b { "t" } else { "f" }.to_string(),
            Value::Float(f) => format_float(f),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMATS[0]).to_string(),
            Value::DateTimeTz(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f+00").to_string(),
            Value::Time(t) => t.format(TIME_FORMAT).to_string(),
            other => other.to_string(),
        })
    }

    /// Coerces a value, or every leaf of a list, to this element type.
    ///
    /// `Null` is kept as is.
    ///
    /// # Errors
    ///
    /// Returns [`PgArrayError::InvalidElement`] for a leaf that cannot be
    /// represented in this type.
    pub fn cast(&self, value: &Value) -> PgArrayResult<Value> {
        match value {
            Value::List(items) => items
                .iter()
                .map(|item| self.cast(item))
                .collect::<PgArrayResult<Vec<_>>>()
                .map(Value::List),
            other => self.cast_scalar(other),
        }
    }

    /// Parses a whole array literal of this element type.
    ///
    /// # Errors
    ///
    /// See [`parse_array_literal`].
    pub fn parse_literal(&self, text: &str, dimension: Option<usize>) -> PgArrayResult<Value> {
        parse_array_literal(text, &|element| self.parse(element), dimension)
    }

    /// Formats a list value as an array literal of this element type.
    ///
    /// # Errors
    ///
    /// See [`format_array_literal`].
    pub fn format_literal(&self, value: &Value) -> PgArrayResult<String> {
        format_array_literal(value, &|element| self.format(element))
    }

    fn cast_scalar(&self, value: &Value) -> PgArrayResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Value::List(_) = value {
            return Err(self.invalid(value.to_string(), "expected a scalar"));
        }

        match (&self.kind, value) {
            (ElementKind::Int(width), Value::Int(n)) => self.check_range(*width, *n),
            #[allow(clippy::cast_possible_truncation)]
            (ElementKind::Int(width), Value::Float(f)) if f.fract() == 0.0 && f.is_finite() => {
                self.check_range(*width, *f as i64)
            }
            (ElementKind::Int(_), Value::String(s)) => self.parse(s),

            (ElementKind::Float, Value::Float(f)) => Ok(Value::Float(*f)),
            (ElementKind::Float, Value::Int(n)) => Ok(Value::Float(*n as f64)),
            (ElementKind::Float, Value::String(s)) => self.parse(s),

            (ElementKind::Text { max_length }, v) => {
                let text = match v {
                    Value::String(s) => s.clone(),
                    other => self.format_as_text(other),
                };
                self.check_length(*max_length, &text)?;
                Ok(Value::String(text))
            }
            (ElementKind::Passthrough, Value::String(s)) => Ok(Value::String(s.clone())),
            (ElementKind::Passthrough, other) => Ok(Value::String(self.format_as_text(other))),

            (ElementKind::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (ElementKind::Bool, Value::Int(0)) => Ok(Value::Bool(false)),
            (ElementKind::Bool, Value::Int(1)) => Ok(Value::Bool(true)),
            (ElementKind::Bool, Value::String(s)) => self.parse(s),

            (ElementKind::Date, Value::Date(d)) => Ok(Value::Date(*d)),
            (ElementKind::Date, Value::DateTime(dt)) => Ok(Value::Date(dt.date())),
            (ElementKind::Date, Value::DateTimeTz(dt)) => Ok(Value::Date(dt.date_naive())),
            (ElementKind::Date, Value::String(s)) => self.parse(s),

            (ElementKind::DateTime, Value::DateTime(dt)) => Ok(Value::DateTime(*dt)),
            (ElementKind::DateTime, Value::DateTimeTz(dt)) => Ok(Value::DateTime(dt.naive_utc())),
            (ElementKind::DateTime, Value::Date(d)) => Ok(Value::DateTime(d.and_time(NaiveTime::default()))),
            (ElementKind::DateTime, Value::String(s)) => self.parse(s),

            (ElementKind::DateTimeTz, Value::DateTimeTz(dt)) => Ok(Value::DateTimeTz(*dt)),
            (ElementKind::DateTimeTz, Value::DateTime(dt)) => Ok(Value::DateTimeTz(dt.and_utc())),
            (ElementKind::DateTimeTz, Value::String(s)) => self.parse(s),

            (ElementKind::Time, Value::Time(t)) => Ok(Value::Time(*t)),
            (ElementKind::Time, Value::DateTime(dt)) => Ok(Value::Time(dt.time())),
            (ElementKind::Time, Value::String(s)) => self.parse(s),

            (ElementKind::Uuid, Value::Uuid(u)) => Ok(Value::Uuid(*u)),
            (ElementKind::Uuid, Value::String(s)) => self.parse(s),

            (ElementKind::Custom(adapter), v) => adapter.cast(v),

            (_, other) => Err(self.invalid(
                other.to_string(),
                format!("cannot convert to {}", self.dbtype),
            )),
        }
    }

    fn format_as_text(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => b.to_string(),
            Value::Float(f) => format_float(*f),
            Value::DateTime(dt) => dt.format(DATETIME_FORMATS[0]).to_string(),
            Value::DateTimeTz(dt) => dt.format("%Y-%m-%d %H:%M:%S%.f+00").to_string(),
            other => other.to_string(),
        }
    }

    fn check_range(&self, width: IntWidth, n: i64) -> PgArrayResult<Value> {
        let (min, max) = width.bounds();
        if n < min || n > max {
            return Err(self.invalid(n.to_string(), format!("value out of range for {}", self.dbtype)));
        }
        Ok(Value::Int(n))
    }

    fn check_length(&self, max_length: Option<usize>, text: &str) -> PgArrayResult<()> {
        match max_length {
            Some(max) if text.chars().count() > max => Err(self.invalid(
                text,
                format!("value too long for type {}", self.dbtype),
            )),
            _ => Ok(()),
        }
    }

    fn parse_datetime(&self, text: &str) -> PgArrayResult<NaiveDateTime> {
        let trimmed = text.trim();
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .ok_or_else(|| self.invalid(text, "expected YYYY-MM-DD HH:MM:SS[.ffffff]"))
    }

    fn parse_datetime_tz(&self, text: &str) -> PgArrayResult<DateTime<Utc>> {
        let trimmed = text.trim();
        DATETIME_TZ_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(trimmed, fmt).ok())
            .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| self.invalid(text, "expected YYYY-MM-DD HH:MM:SS[.ffffff]+TZ"))
    }
}

/// Spells a float the way PostgreSQL does.
fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
    } else {
        f.to_string()
    }
}
