//! Model trait and metadata for the ORM.
//!
//! The [`Model`] trait is implemented by every struct stored in a table.
//! [`ModelMeta`] describes the table: its name and the columns, each either a
//! scalar [`FieldDef`] or an [`ArrayField`].

use std::collections::HashMap;

use pgarray_core::{PgArrayError, PgArrayResult, ValidationError};

use crate::fields::{ArrayField, FieldDef};
use crate::query::compiler::{ArrayColumn, Column, OrderBy};
use crate::value::Value;

pub use crate::query::compiler::Row;

/// A column of a model.
#[derive(Debug, Clone)]
pub enum ModelField {
    /// A scalar column.
    Scalar(FieldDef),
    /// An array column.
    Array(ArrayField),
}

impl ModelField {
    /// The attribute name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scalar(def) => def.name,
            Self::Array(field) => field.name,
        }
    }

    /// The database column name.
    pub fn column(&self) -> &str {
        match self {
            Self::Scalar(def) => &def.column,
            Self::Array(field) => &field.column,
        }
    }

    /// Returns the array field, if this is an array column.
    pub const fn as_array(&self) -> Option<&ArrayField> {
        match self {
            Self::Array(field) => Some(field),
            Self::Scalar(_) => None,
        }
    }

    /// Returns `true` for the primary key column.
    pub const fn is_primary_key(&self) -> bool {
        matches!(self, Self::Scalar(def) if def.primary_key)
    }

    /// The column as referenced by compiled statements.
    pub fn as_column(&self) -> Column {
        match self {
            Self::Scalar(def) => Column::scalar(def.column.clone()),
            Self::Array(field) => Column::array(field.column.clone(), ArrayColumn::from(field)),
        }
    }

    /// Returns the configured default (`Null` when there is none).
    pub fn get_default(&self) -> Value {
        match self {
            Self::Scalar(def) => def.default.clone().unwrap_or(Value::Null),
            Self::Array(field) => field.get_default(),
        }
    }
}

impl From<FieldDef> for ModelField {
    fn from(def: FieldDef) -> Self {
        Self::Scalar(def)
    }
}

impl From<ArrayField> for ModelField {
    fn from(field: ArrayField) -> Self {
        Self::Array(field)
    }
}

/// Table-level options of a model.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    /// The application label (e.g. "pgarray").
    pub app_label: &'static str,
    /// The lower-cased model name (e.g. "item").
    pub model_name: &'static str,
    /// The database table name.
    pub db_table: String,
    /// Human-readable singular name.
    pub verbose_name: String,
    /// Default ordering.
    pub ordering: Vec<OrderBy>,
    /// Columns in declaration order.
    pub fields: Vec<ModelField>,
}

impl ModelMeta {
    /// Creates metadata with `db_table` set to `{app_label}_{model_name}`.
    pub fn new(app_label: &'static str, model_name: &'static str) -> Self {
        Self {
            app_label,
            model_name,
            db_table: format!("{app_label}_{model_name}"),
            verbose_name: model_name.replace('_', " "),
            ordering: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn field(mut self, field: impl Into<ModelField>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Overrides the table name.
    #[must_use]
    pub fn db_table(mut self, db_table: impl Into<String>) -> Self {
        self.db_table = db_table.into();
        self
    }

    /// Sets the default ordering.
    #[must_use]
    pub fn ordering(mut self, ordering: Vec<OrderBy>) -> Self {
        self.ordering = ordering;
        self
    }

    /// Finds a column by attribute name.
    pub fn get_field(&self, name: &str) -> Option<&ModelField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Finds an array column by attribute name.
    pub fn array_field(&self, name: &str) -> Option<&ArrayField> {
        self.get_field(name).and_then(ModelField::as_array)
    }

    /// Iterates over the array columns.
    pub fn array_fields(&self) -> impl Iterator<Item = &ArrayField> {
        self.fields.iter().filter_map(ModelField::as_array)
    }

    /// The primary key column, if declared.
    pub fn pk_field(&self) -> Option<&ModelField> {
        self.fields.iter().find(|f| f.is_primary_key())
    }

    /// Every column, in declaration order.
    pub fn columns(&self) -> Vec<Column> {
        self.fields.iter().map(ModelField::as_column).collect()
    }

    /// Returns the default of the named field.
    pub fn default_for(&self, name: &str) -> Value {
        self.get_field(name).map_or(Value::Null, ModelField::get_default)
    }

    /// Converts the array columns of a database row into lists.
    ///
    /// # Errors
    ///
    /// Returns an error when a stored literal does not parse as the field's
    /// element type.
    pub fn decode_row(&self, mut row: Row) -> PgArrayResult<Row> {
        for field in self.array_fields() {
            let decoded = match row.get_value(&field.column) {
                Some(Value::String(text)) => field.from_db_value(Some(text))?,
                Some(Value::List(_) | Value::Null) | None => continue,
                Some(other) => {
                    return Err(PgArrayError::DatabaseError(format!(
                        "Column '{}' holds {other:?}, expected an array literal",
                        field.column
                    )))
                }
            };
            row.set_value(&field.column, decoded);
        }
        Ok(row)
    }

    /// Validates instance values field by field.
    ///
    /// Array fields run `clean` (conversion, then `validate`); scalar fields
    /// check nullability. Every failing field is reported.
    pub fn full_clean(&self, values: &[(&'static str, Value)]) -> Result<(), ValidationError> {
        let mut errors: HashMap<String, Vec<ValidationError>> = HashMap::new();
        for (name, value) in values {
            let result = match self.get_field(name) {
                Some(ModelField::Array(field)) => field.clean(value).map(|_| ()),
                Some(ModelField::Scalar(def)) if value.is_null() && !def.null && !def.primary_key => {
                    Err(ValidationError::new("This field cannot be null.", "null"))
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                errors.entry((*name).to_string()).or_default().push(err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::with_field_errors(errors))
        }
    }
}

/// The core trait for all ORM models.
///
/// # Examples
///
/// ```
/// use once_cell::sync::Lazy;
/// use pgarray_db::fields::{ArrayField, FieldDef, FieldType};
/// use pgarray_db::model::{Model, ModelMeta, Row};
/// use pgarray_db::value::Value;
/// use pgarray_db::PgArrayResult;
///
/// struct Item {
///     id: Option<i64>,
///     lista: Vec<i64>,
/// }
///
/// impl Model for Item {
///     fn meta() -> &'static ModelMeta {
///         static META: Lazy<ModelMeta> = Lazy::new(|| {
///             ModelMeta::new("pgarray", "item")
///                 .field(FieldDef::new("id", FieldType::AutoField).primary_key())
///                 .field(ArrayField::new("lista").default_factory(|| Value::List(vec![])))
///         });
///         &META
///     }
///
///     fn pk(&self) -> Option<Value> {
///         self.id.map(Value::Int)
///     }
///
///     fn set_pk(&mut self, value: Value) {
///         self.id = value.as_int();
///     }
///
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("id", Value::from(self.id)), ("lista", Value::from(self.lista.clone()))]
///     }
///
///     fn from_row(row: &Row) -> PgArrayResult<Self> {
///         Ok(Self {
///             id: row.get("id")?,
///             lista: row.get("lista")?,
///         })
///     }
/// }
///
/// assert_eq!(Item::table_name(), "pgarray_item");
/// assert!(Item::meta().array_field("lista").is_some());
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta;

    /// Returns the database table name.
    fn table_name() -> &'static str {
        Self::meta().db_table.as_str()
    }

    /// Returns the application label this model belongs to.
    fn app_label() -> &'static str {
        Self::meta().app_label
    }

    /// Returns the primary key value, or `None` if unsaved.
    fn pk(&self) -> Option<Value>;

    /// Sets the primary key value on this instance (used after INSERT).
    fn set_pk(&mut self, value: Value);

    /// Returns the name of the primary key field (e.g., "id").
    fn pk_field_name() -> &'static str {
        Self::meta().pk_field().map_or("id", ModelField::name)
    }

    /// Returns all field name-value pairs for this instance.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Returns field name-value pairs excluding the primary key.
    fn non_pk_field_values(&self) -> Vec<(&'static str, Value)> {
        let pk_name = Self::pk_field_name();
        self.field_values()
            .into_iter()
            .filter(|(name, _)| *name != pk_name)
            .collect()
    }

    /// Constructs a model instance from a decoded database row.
    fn from_row(row: &Row) -> PgArrayResult<Self>
    where
        Self: Sized;

    /// Validates every field of this instance.
    fn full_clean(&self) -> Result<(), ValidationError> {
        Self::meta().full_clean(&self.field_values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;
    use once_cell::sync::Lazy;

    static META: Lazy<ModelMeta> = Lazy::new(|| {
        ModelMeta::new("pgarray", "choices")
            .field(FieldDef::new("id", FieldType::AutoField).primary_key())
            .field(FieldDef::new("title", FieldType::CharField))
            .field(
                ArrayField::new("choices")
                    .dbtype("text")
                    .choices(vec![("A", "A"), ("B", "B")])
                    .null(false),
            )
            .field(ArrayField::new("grid").dbtype("int").dimension(2).column("grid_col"))
    });

    #[test]
    fn test_meta_lookup() {
        assert_eq!(META.db_table, "pgarray_choices");
        assert!(META.array_field("choices").is_some());
        assert!(META.array_field("title").is_none());
        assert!(META.get_field("missing").is_none());
        assert_eq!(META.array_fields().count(), 2);
        assert_eq!(META.pk_field().map(ModelField::name), Some("id"));
        assert_eq!(META.get_field("grid").map(ModelField::column), Some("grid_col"));
    }

    #[test]
    fn test_columns() {
        let columns = META.columns();
        assert_eq!(columns.len(), 4);
        assert!(columns[0].array.is_none());
        let grid = columns[3].array.as_ref().unwrap();
        assert_eq!(grid.db_type(), "int[][]");
        assert_eq!(columns[3].name, "grid_col");
    }

    #[test]
    fn test_decode_row() {
        let row = Row::new(
            vec!["id".into(), "choices".into(), "grid_col".into()],
            vec![Value::Int(1), Value::from("{A,\"B C\"}"), Value::Null],
        );
        let row = META.decode_row(row).unwrap();
        assert_eq!(row.get_value("choices"), Some(&Value::from(vec!["A", "B C"])));
        assert_eq!(row.get_value("grid_col"), Some(&Value::Null));
        assert_eq!(row.get_value("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_decode_row_rejects_bad_literal() {
        let row = Row::new(vec!["grid_col".into()], vec![Value::from("{{1},{x}}")]);
        assert!(META.decode_row(row).is_err());
    }

    #[test]
    fn test_full_clean() {
        let ok = vec![
            ("id", Value::Null),
            ("title", Value::from("t")),
            ("choices", Value::from(vec!["A"])),
        ];
        assert!(META.full_clean(&ok).is_ok());

        let bad = vec![
            ("title", Value::Null),
            ("choices", Value::from(vec!["C"])),
            ("grid", Value::from(vec![1, 2])),
        ];
        let err = META.full_clean(&bad).unwrap_err();
        assert_eq!(err.field_errors.len(), 3);
        assert_eq!(err.field_errors["choices"][0].code, "invalid_choice");
        assert_eq!(err.field_errors["grid"][0].code, "invalid_dimension");
        assert_eq!(err.field_errors["title"][0].code, "null");
    }

    #[test]
    fn test_default_for() {
        let meta = ModelMeta::new("pgarray", "item")
            .field(ArrayField::new("lista").default_factory(|| Value::List(vec![])));
        assert_eq!(meta.default_for("lista"), Value::List(vec![]));
        assert_eq!(meta.default_for("other"), Value::Null);
    }
}
