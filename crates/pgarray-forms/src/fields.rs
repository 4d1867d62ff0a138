//! Form field definitions for array input.
//!
//! [`ArrayFormField`] accepts a delimited string (`"1,2,3"`) or an
//! already-split list and casts each piece through the array's element
//! type. [`TypedMultipleChoiceField`] is used instead when the model field
//! restricts elements to a set of choices. Both implement [`FormField`];
//! [`FormFieldKind`] holds either, or a caller-supplied field.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use pgarray_core::{PgArrayResult, ValidationError, SETTINGS};
use pgarray_db::types::ElementType;
use pgarray_db::value::Value;

use crate::widgets::{widget_for, Widget, WidgetType};

/// Error message for input that is not a delimited list.
pub const INVALID_LIST_MESSAGE: &str = r#"Enter a list of values, joined by commas.  E.g. "a,b,c"."#;

/// Error message for a missing required value.
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// A raw value submitted for one form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// Nothing was submitted.
    Missing,
    /// A single text value.
    Text(String),
    /// Several values, e.g. from a multiple select or a JSON array.
    List(Vec<Value>),
    /// Any other typed value.
    Other(Value),
}

impl FormValue {
    /// Returns `true` for a missing value, an empty string or an empty list.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Other(v) => v.is_null(),
        }
    }

    /// Converts a JSON value (e.g. one entry of a JSON request body).
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Missing,
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => match Value::from_json(other) {
                Some(Value::List(items)) => Self::List(items),
                Some(value) => Self::Other(value),
                None => Self::Text(other.to_string()),
            },
        }
    }
}

impl From<&str> for FormValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FormValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::String(s) => Self::Text(s),
            Value::List(items) => Self::List(items),
            other => Self::Other(other),
        }
    }
}

impl From<i64> for FormValue {
    fn from(n: i64) -> Self {
        Self::Other(Value::Int(n))
    }
}

/// Text of one element as shown to the user.
pub(crate) fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::List(_) => value.to_json().to_string(),
        other => other.to_string(),
    }
}

/// Behaviour shared by every form field.
pub trait FormField: Send + Sync + fmt::Debug {
    /// The field name (HTML name attribute).
    fn name(&self) -> &str;

    /// Human-readable label.
    fn label(&self) -> &str;

    /// Help text displayed alongside the field.
    fn help_text(&self) -> &str {
        ""
    }

    /// Whether an empty value is an error.
    fn required(&self) -> bool;

    /// The widget used for rendering.
    fn widget(&self) -> Box<dyn Widget>;

    /// Converts and validates a submitted value.
    fn clean(&self, value: &FormValue) -> Result<Value, ValidationError>;

    /// Renders a cleaned or initial value as widget text.
    fn prepare_value(&self, value: &Value) -> String;

    /// Allows downcasting to the concrete field type.
    fn as_any(&self) -> &dyn Any;
}

fn default_delimiter() -> String {
    if SETTINGS.is_configured() {
        SETTINGS.get().array.form_delimiter.clone()
    } else {
        ",".to_string()
    }
}

fn capfirst(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// A form field holding a delimited list.
#[derive(Debug, Clone)]
pub struct ArrayFormField {
    /// The field name.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Help text.
    pub help_text: String,
    /// Separator between items (`,` unless configured).
    pub delim: String,
    /// Element type used to cast each item; `None` keeps items as text.
    pub element: Option<ElementType>,
    /// Trim surrounding whitespace from each delimited item.
    pub strip: bool,
    /// Whether an empty value is an error.
    pub required: bool,
    /// Widget used for rendering.
    pub widget: WidgetType,
}

impl Default for ArrayFormField {
    fn default() -> Self {
        Self::new("")
    }
}

impl ArrayFormField {
    /// Creates a required, untyped field with the configured delimiter.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: capfirst(&name.replace('_', " ")),
            name,
            help_text: String::new(),
            delim: default_delimiter(),
            element: None,
            strip: true,
            required: true,
            widget: WidgetType::TextInput,
        }
    }

    /// Sets the delimiter.
    #[must_use]
    pub fn delim(mut self, delim: impl Into<String>) -> Self {
        self.delim = delim.into();
        self
    }

    /// Sets the element type items are cast through.
    #[must_use]
    pub fn element(mut self, element: ElementType) -> Self {
        self.element = Some(element);
        self
    }

    /// Sets whether delimited items are trimmed.
    #[must_use]
    pub const fn strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    /// Sets whether the field is required.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// Sets the widget type.
    #[must_use]
    pub const fn widget(mut self, widget: WidgetType) -> Self {
        self.widget = widget;
        self
    }

    fn invalid() -> ValidationError {
        ValidationError::new(INVALID_LIST_MESSAGE, "invalid")
    }

    fn cast_item(&self, item: &Value) -> Result<Value, ValidationError> {
        let Some(element) = &self.element else {
            return Ok(item.clone());
        };
        let cast = match item {
            Value::String(text) if !element.is_text() => element.parse(text.trim()),
            other => element.cast(other),
        };
        cast.map_err(|e| {
            tracing::debug!(field = %self.name, error = %e, "Array form item rejected");
            Self::invalid().with_param("value", display_text(item))
        })
    }
}

impl FormField for ArrayFormField {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn help_text(&self) -> &str {
        &self.help_text
    }

    fn required(&self) -> bool {
        self.required
    }

    fn widget(&self) -> Box<dyn Widget> {
        widget_for(self.widget, Vec::new())
    }

    /// Empty input cleans to `[]` (or `required`); text is split on the
    /// delimiter; a list passes through; anything else is `invalid`.
    fn clean(&self, value: &FormValue) -> Result<Value, ValidationError> {
        if value.is_empty() {
            if self.required {
                return Err(ValidationError::new(REQUIRED_MESSAGE, "required"));
            }
            return Ok(Value::List(Vec::new()));
        }
        let items: Vec<Value> = match value {
            FormValue::Text(text) => text
                .split(self.delim.as_str())
                .map(|piece| {
                    let piece = if self.strip { piece.trim() } else { piece };
                    Value::String(piece.to_string())
                })
                .collect(),
            FormValue::List(items) => items.clone(),
            FormValue::Missing | FormValue::Other(_) => return Err(Self::invalid()),
        };
        items
            .iter()
            .map(|item| self.cast_item(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    fn prepare_value(&self, value: &Value) -> String {
        match value {
            Value::List(items) => items
                .iter()
                .map(display_text)
                .collect::<Vec<_>>()
                .join(&self.delim),
            other => display_text(other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Converts a chosen value into the cleaned element.
pub type Coerce = Arc<dyn Fn(&Value) -> PgArrayResult<Value> + Send + Sync>;

/// Coerces a choice to its text form.
pub fn coerce_text(value: &Value) -> PgArrayResult<Value> {
    Ok(Value::String(display_text(value)))
}

/// A multiple-choice field whose selections are coerced to typed values.
#[derive(Clone)]
pub struct TypedMultipleChoiceField {
    /// The field name.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Help text.
    pub help_text: String,
    /// Allowed values and their labels.
    pub choices: Vec<(Value, String)>,
    /// Converts each selected value.
    pub coerce: Coerce,
    /// Whether an empty selection is an error.
    pub required: bool,
    /// The cleaned value of an empty selection.
    pub empty_value: Value,
    /// Widget used for rendering.
    pub widget: WidgetType,
}

impl fmt::Debug for TypedMultipleChoiceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedMultipleChoiceField")
            .field("name", &self.name)
            .field("choices", &self.choices)
            .field("required", &self.required)
            .field("empty_value", &self.empty_value)
            .finish_non_exhaustive()
    }
}

impl TypedMultipleChoiceField {
    /// Creates a required field that coerces selections to text.
    pub fn new(name: impl Into<String>, choices: Vec<(Value, String)>) -> Self {
        let name = name.into();
        Self {
            label: capfirst(&name.replace('_', " ")),
            name,
            help_text: String::new(),
            choices,
            coerce: Arc::new(coerce_text),
            required: true,
            empty_value: Value::List(Vec::new()),
            widget: WidgetType::SelectMultiple,
        }
    }

    /// Sets the coercion function.
    #[must_use]
    pub fn coerce(mut self, coerce: impl Fn(&Value) -> PgArrayResult<Value> + Send + Sync + 'static) -> Self {
        self.coerce = Arc::new(coerce);
        self
    }

    /// Sets whether the field is required.
    #[must_use]
    pub const fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = text.into();
        self
    }

    /// The choices as display strings, for widgets.
    pub fn string_choices(&self) -> Vec<(String, String)> {
        self.choices
            .iter()
            .map(|(value, label)| (display_text(value), label.clone()))
            .collect()
    }

    fn invalid_choice(value: &Value) -> ValidationError {
        let text = display_text(value);
        ValidationError::new(
            format!("Select a valid choice. {text} is not one of the available choices."),
            "invalid_choice",
        )
        .with_param("value", text)
    }

    fn is_choice(&self, value: &Value) -> bool {
        let text = display_text(value);
        self.choices.iter().any(|(choice, _)| display_text(choice) == text)
    }
}

impl FormField for TypedMultipleChoiceField {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn help_text(&self) -> &str {
        &self.help_text
    }

    fn required(&self) -> bool {
        self.required
    }

    fn widget(&self) -> Box<dyn Widget> {
        widget_for(self.widget, self.string_choices())
    }

    fn clean(&self, value: &FormValue) -> Result<Value, ValidationError> {
        if value.is_empty() {
            if self.required {
                return Err(ValidationError::new(REQUIRED_MESSAGE, "required"));
            }
            return Ok(self.empty_value.clone());
        }
        let items = match value {
            FormValue::Text(text) => vec![Value::String(text.clone())],
            FormValue::List(items) => items.clone(),
            FormValue::Missing | FormValue::Other(_) => {
                return Err(ValidationError::new("Enter a list of values.", "invalid_list"))
            }
        };
        items
            .iter()
            .map(|item| {
                if !self.is_choice(item) {
                    return Err(Self::invalid_choice(item));
                }
                (self.coerce)(item).map_err(|_| Self::invalid_choice(item))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List)
    }

    fn prepare_value(&self, value: &Value) -> String {
        match value {
            Value::List(items) => items.iter().map(display_text).collect::<Vec<_>>().join(","),
            other => display_text(other),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A form field produced for an array column.
#[derive(Debug)]
pub enum FormFieldKind {
    /// Delimited list input.
    Array(ArrayFormField),
    /// Multiple choice among the column's choices.
    TypedMultipleChoice(TypedMultipleChoiceField),
    /// A caller-supplied field.
    Custom(Box<dyn FormField>),
}

impl FormFieldKind {
    /// The underlying field.
    pub fn field(&self) -> &dyn FormField {
        match self {
            Self::Array(field) => field as &dyn FormField,
            Self::TypedMultipleChoice(field) => field,
            Self::Custom(field) => field.as_ref(),
        }
    }

    /// The field name.
    pub fn name(&self) -> &str {
        self.field().name()
    }

    /// Converts and validates a submitted value.
    pub fn clean(&self, value: &FormValue) -> Result<Value, ValidationError> {
        self.field().clean(value)
    }

    /// Renders a value as widget text.
    pub fn prepare_value(&self, value: &Value) -> String {
        self.field().prepare_value(value)
    }
}

impl From<ArrayFormField> for FormFieldKind {
    fn from(field: ArrayFormField) -> Self {
        Self::Array(field)
    }
}

impl From<TypedMultipleChoiceField> for FormFieldKind {
    fn from(field: TypedMultipleChoiceField) -> Self {
        Self::TypedMultipleChoice(field)
    }
}
