//! Field type definitions for the ORM.
//!
//! [`FieldType`] names the column type of a model field and [`FieldDef`]
//! carries the metadata of a scalar column. Array columns are described by
//! [`ArrayField`](super::ArrayField), which can produce a `FieldDef` of type
//! [`FieldType::ArrayField`] for generic consumers.

use crate::types::{ElementKind, ElementType, IntWidth};
use crate::value::Value;

/// The type of a model field, determining its SQL column type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum FieldType {
    /// Auto-incrementing 32-bit integer primary key.
    AutoField,
    /// Auto-incrementing 64-bit integer primary key.
    BigAutoField,
    /// Variable-length string with a max length.
    CharField,
    /// Unlimited-length text.
    TextField,
    /// 32-bit signed integer.
    IntegerField,
    /// 64-bit signed integer.
    BigIntegerField,
    /// 16-bit signed integer.
    SmallIntegerField,
    /// 64-bit floating-point number.
    FloatField,
    /// Boolean (true/false).
    BooleanField,
    /// Date without time.
    DateField,
    /// Date and time.
    DateTimeField,
    /// Time without date.
    TimeField,
    /// UUID field.
    UuidField,
    /// A column whose SQL type has no dedicated field (e.g. `macaddr`).
    DbType {
        /// The SQL type name.
        db_type: String,
    },
    /// PostgreSQL array field. Stores a homogeneous array of another field type.
    /// SQL: `INTEGER[]`, `TEXT[][]`, etc.
    ArrayField {
        /// The base field type for the array elements.
        base_field: Box<FieldType>,
        /// Optional maximum array size.
        size: Option<usize>,
    },
}

impl From<&ElementType> for FieldType {
    fn from(element: &ElementType) -> Self {
        match element.kind() {
            ElementKind::Int(IntWidth::Small) => Self::SmallIntegerField,
            ElementKind::Int(IntWidth::Regular) => Self::IntegerField,
            ElementKind::Int(IntWidth::Big) => Self::BigIntegerField,
            ElementKind::Float => Self::FloatField,
            ElementKind::Text { max_length: Some(_) } => Self::CharField,
            ElementKind::Text { max_length: None } => Self::TextField,
            ElementKind::Bool => Self::BooleanField,
            ElementKind::Date => Self::DateField,
            ElementKind::DateTime => Self::DateTimeField,
            ElementKind::Time => Self::TimeField,
            ElementKind::Uuid => Self::UuidField,
            ElementKind::DateTimeTz | ElementKind::Custom(_) | ElementKind::Passthrough => {
                Self::DbType {
                    db_type: element.dbtype().to_string(),
                }
            }
        }
    }
}

impl FieldType {
    /// Returns the SQL column type for the given field type on PostgreSQL.
    pub fn pg_column_type(&self) -> String {
        match self {
            Self::AutoField => "SERIAL".to_string(),
            Self::BigAutoField => "BIGSERIAL".to_string(),
            Self::CharField => "VARCHAR".to_string(),
            Self::TextField => "TEXT".to_string(),
            Self::IntegerField => "INTEGER".to_string(),
            Self::BigIntegerField => "BIGINT".to_string(),
            Self::SmallIntegerField => "SMALLINT".to_string(),
            Self::FloatField => "DOUBLE PRECISION".to_string(),
            Self::BooleanField => "BOOLEAN".to_string(),
            Self::DateField => "DATE".to_string(),
            Self::DateTimeField => "TIMESTAMP".to_string(),
            Self::TimeField => "TIME".to_string(),
            Self::UuidField => "UUID".to_string(),
            Self::DbType { db_type } => db_type.to_uppercase(),
            Self::ArrayField { base_field, .. } => {
                format!("{}[]", base_field.pg_column_type())
            }
        }
    }

    /// Returns the number of array levels (0 for scalar types).
    pub fn array_dimension(&self) -> usize {
        match self {
            Self::ArrayField { base_field, .. } => 1 + base_field.array_dimension(),
            _ => 0,
        }
    }
}

/// Complete definition of a scalar model field.
///
/// Typically constructed by hand when implementing the
/// [`Model`](crate::model::Model) trait.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The Rust attribute name of this field.
    pub name: &'static str,
    /// The database column name (may differ from `name`).
    pub column: String,
    /// The type of this field.
    pub field_type: FieldType,
    /// Whether this field is the primary key.
    pub primary_key: bool,
    /// Whether NULL is allowed in the database.
    pub null: bool,
    /// Whether the field may be left blank in forms.
    pub blank: bool,
    /// Default value for new instances.
    pub default: Option<Value>,
    /// Human-readable help text.
    pub help_text: String,
    /// Human-readable name for the field.
    pub verbose_name: String,
    /// Whether the field is editable in forms.
    pub editable: bool,
}

impl FieldDef {
    /// Creates a new `FieldDef` with sensible defaults.
    ///
    /// Only the field name and type are required. All other attributes take
    /// their default values (non-null, editable, etc.).
    pub fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            column: name.to_string(),
            field_type,
            primary_key: false,
            null: false,
            blank: false,
            default: None,
            help_text: String::new(),
            verbose_name: name.replace('_', " "),
            editable: true,
        }
    }

    /// Sets the database column name.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Marks this field as the primary key. Primary keys are not editable.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.editable = false;
        self
    }

    /// Allows NULL values in the database.
    #[must_use]
    pub const fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Allows the field to be left blank in forms.
    #[must_use]
    pub const fn blank(mut self) -> Self {
        self.blank = true;
        self
    }

    /// Sets the default value for this field.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
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

    /// Returns `true` if this field stores an array.
    pub const fn is_array(&self) -> bool {
        matches!(self.field_type, FieldType::ArrayField { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_new_defaults() {
        let f = FieldDef::new("first_name", FieldType::CharField);
        assert_eq!(f.name, "first_name");
        assert_eq!(f.column, "first_name");
        assert!(!f.primary_key);
        assert!(!f.null);
        assert!(!f.blank);
        assert!(f.default.is_none());
        assert!(f.editable);
        assert_eq!(f.verbose_name, "first name");
    }

    #[test]
    fn test_field_def_builder() {
        let f = FieldDef::new("title", FieldType::TextField)
            .column("title_text")
            .nullable()
            .blank()
            .default("untitled")
            .verbose_name("Title")
            .help_text("Shown in listings");
        assert_eq!(f.column, "title_text");
        assert!(f.null);
        assert!(f.blank);
        assert_eq!(f.default, Some(Value::from("untitled")));
        assert_eq!(f.verbose_name, "Title");
        assert_eq!(f.help_text, "Shown in listings");
        assert!(!f.is_array());
    }

    #[test]
    fn test_field_def_primary_key() {
        let f = FieldDef::new("id", FieldType::AutoField).primary_key();
        assert!(f.primary_key);
        assert!(!f.editable);
    }

    #[test]
    fn test_from_element_type() {
        let cases = [
            ("smallint", FieldType::SmallIntegerField),
            ("int", FieldType::IntegerField),
            ("bigint", FieldType::BigIntegerField),
            ("float8", FieldType::FloatField),
            ("text", FieldType::TextField),
            ("varchar(10)", FieldType::CharField),
            ("bool", FieldType::BooleanField),
            ("date", FieldType::DateField),
            ("timestamp", FieldType::DateTimeField),
            ("time", FieldType::TimeField),
            ("uuid", FieldType::UuidField),
            (
                "macaddr",
                FieldType::DbType {
                    db_type: "macaddr".to_string(),
                },
            ),
        ];
        for (dbtype, expected) in cases {
            assert_eq!(FieldType::from(&ElementType::from_dbtype(dbtype)), expected, "{dbtype}");
        }
    }

    #[test]
    fn test_pg_column_type_array() {
        let ft = FieldType::ArrayField {
            base_field: Box::new(FieldType::IntegerField),
            size: None,
        };
        assert_eq!(ft.pg_column_type(), "INTEGER[]");
        assert_eq!(ft.array_dimension(), 1);
    }

    #[test]
    fn test_pg_column_type_nested_array() {
        let ft = FieldType::ArrayField {
            base_field: Box::new(FieldType::ArrayField {
                base_field: Box::new(FieldType::TextField),
                size: None,
            }),
            size: None,
        };
        assert_eq!(ft.pg_column_type(), "TEXT[][]");
        assert_eq!(ft.array_dimension(), 2);
    }

    #[test]
    fn test_pg_column_types_basic() {
        assert_eq!(FieldType::AutoField.pg_column_type(), "SERIAL");
        assert_eq!(FieldType::BigAutoField.pg_column_type(), "BIGSERIAL");
        assert_eq!(FieldType::TextField.pg_column_type(), "TEXT");
        assert_eq!(FieldType::BooleanField.pg_column_type(), "BOOLEAN");
        assert_eq!(FieldType::UuidField.pg_column_type(), "UUID");
        assert_eq!(
            FieldType::DbType {
                db_type: "macaddr".into()
            }
            .pg_column_type(),
            "MACADDR"
        );
        assert_eq!(FieldType::IntegerField.array_dimension(), 0);
    }

    #[test]
    fn test_field_type_serde() {
        let json = serde_json::to_value(FieldType::IntegerField).unwrap();
        assert_eq!(json, serde_json::json!({"type": "IntegerField"}));
    }
}
