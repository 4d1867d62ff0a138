//! Form trait and `BaseForm` implementation.
//!
//! [`BaseForm`] holds a list of [`FormFieldKind`]s and manages binding,
//! validation, cleaned data and HTML table rendering. Validation is async
//! so that form-level checks may consult the database.

use std::collections::HashMap;

use async_trait::async_trait;
use pgarray_core::{PgArrayError, PgArrayResult};
use pgarray_db::value::Value;

use crate::bound_field::BoundField;
use crate::fields::{FormFieldKind, FormValue};

/// Submitted form data, keyed by HTML field name.
pub type FormData = HashMap<String, FormValue>;

/// Parses a JSON object into [`FormData`].
///
/// # Errors
///
/// Returns [`PgArrayError::SerializationError`] if the text is not a JSON
/// object.
pub fn form_data_from_json(text: &str) -> PgArrayResult<FormData> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| PgArrayError::SerializationError(e.to_string()))?;
    let serde_json::Value::Object(map) = json else {
        return Err(PgArrayError::SerializationError(
            "form data must be a JSON object".to_string(),
        ));
    };
    Ok(map
        .iter()
        .map(|(k, v)| (k.clone(), FormValue::from_json(v)))
        .collect())
}

/// The core form trait.
#[async_trait]
pub trait Form: Send + Sync {
    /// Returns the form's fields.
    fn fields(&self) -> &[FormFieldKind];

    /// Binds submitted data to this form.
    fn bind(&mut self, data: FormData);

    /// Returns `true` if this form has been bound to data.
    fn is_bound(&self) -> bool;

    /// Validates the form. An unbound form is never valid.
    ///
    /// After calling this, `errors()` and `cleaned_data()` are populated.
    async fn is_valid(&mut self) -> bool;

    /// Returns per-field validation errors.
    fn errors(&self) -> &HashMap<String, Vec<String>>;

    /// Returns the cleaned (validated and coerced) data.
    fn cleaned_data(&self) -> &HashMap<String, Value>;

    /// Cross-field validation hook. The default implementation does nothing.
    async fn clean(&self) -> Result<(), HashMap<String, Vec<String>>> {
        Ok(())
    }
}

/// A general-purpose form implementation.
#[derive(Debug, Default)]
pub struct BaseForm {
    fields: Vec<FormFieldKind>,
    initial: HashMap<String, Value>,
    prefix: Option<String>,
    bound: bool,
    data: FormData,
    errors: HashMap<String, Vec<String>>,
    cleaned_data: HashMap<String, Value>,
}

impl BaseForm {
    /// Creates an unbound form with the given fields.
    pub fn new(fields: Vec<FormFieldKind>) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Creates a form bound to `data`.
    pub fn with_data(fields: Vec<FormFieldKind>, data: FormData) -> Self {
        let mut form = Self::new(fields);
        form.bind(data);
        form
    }

    /// Sets initial values, shown when the form is unbound.
    #[must_use]
    pub fn with_initial(mut self, initial: HashMap<String, Value>) -> Self {
        self.initial = initial;
        self
    }

    /// Sets the form prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FormFieldKind> {
        self.fields.iter().find(|f| f.name() == name)
    }

    fn html_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(p) => format!("{p}-{name}"),
            None => name.to_string(),
        }
    }

    /// Widget text for a field: the submitted data when bound, the prepared
    /// initial value otherwise.
    fn display_value(&self, field: &FormFieldKind) -> Option<String> {
        if self.bound {
            let html_name = self.html_name(field.name());
            return match self.data.get(&html_name) {
                None | Some(FormValue::Missing) => None,
                Some(FormValue::Text(s)) => Some(s.clone()),
                Some(FormValue::List(items)) => Some(field.prepare_value(&Value::List(items.clone()))),
                Some(FormValue::Other(v)) => Some(field.prepare_value(v)),
            };
        }
        self.initial.get(field.name()).map(|v| field.prepare_value(v))
    }

    /// Returns bound fields for rendering.
    pub fn bound_fields(&self) -> Vec<BoundField<'_>> {
        self.fields
            .iter()
            .map(|field| {
                BoundField::new(
                    field.field(),
                    self.display_value(field),
                    self.errors.get(field.name()).cloned().unwrap_or_default(),
                    self.prefix.as_deref(),
                )
            })
            .collect()
    }

    /// Renders the fields as `<tr>` rows, one per line.
    pub fn as_table(&self) -> String {
        self.bound_fields()
            .iter()
            .map(BoundField::as_table_row)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns the non-field (form-level) errors.
    pub fn non_field_errors(&self) -> &[String] {
        self.errors.get("__all__").map_or(&[], Vec::as_slice)
    }

    fn clean_fields(&mut self) {
        for field in &self.fields {
            let raw = self
                .data
                .get(&self.html_name(field.name()))
                .cloned()
                .unwrap_or(FormValue::Missing);
            match field.clean(&raw) {
                Ok(value) => {
                    self.cleaned_data.insert(field.name().to_string(), value);
                }
                Err(err) => {
                    self.errors
                        .entry(field.name().to_string())
                        .or_default()
                        .push(err.message);
                }
            }
        }
    }
}

#[async_trait]
impl Form for BaseForm {
    fn fields(&self) -> &[FormFieldKind] {
        &self.fields
    }

    fn bind(&mut self, data: FormData) {
        self.bound = true;
        self.data = data;
        self.errors.clear();
        self.cleaned_data.clear();
    }

    fn is_bound(&self) -> bool {
        self.bound
    }

    async fn is_valid(&mut self) -> bool {
        if !self.bound {
            return false;
        }
        self.errors.clear();
        self.cleaned_data.clear();

        self.clean_fields();
        if let Err(form_errors) = self.clean().await {
            for (key, msgs) in form_errors {
                self.errors.entry(key).or_default().extend(msgs);
            }
        }
        if !self.errors.is_empty() {
            tracing::debug!(fields = ?self.errors.keys().collect::<Vec<_>>(), "Form failed validation");
        }
        self.errors.is_empty()
    }

    fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }

    fn cleaned_data(&self) -> &HashMap<String, Value> {
        &self.cleaned_data
    }
}
