//! Model-backed forms generated from a model's array fields.
//!
//! [`formfield`] picks the form field for one [`ArrayField`]:
//! - a caller-supplied `form_class` wins;
//! - a field with choices becomes a [`TypedMultipleChoiceField`];
//! - otherwise an [`ArrayFormField`] bound to the element type.
//!
//! [`model_form`] builds a [`BaseForm`] from every array field of a model.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use pgarray_db::fields::ArrayField;
use pgarray_db::model::{Model, ModelMeta};
use pgarray_db::value::Value;

use crate::fields::{coerce_text, ArrayFormField, FormField, FormFieldKind, TypedMultipleChoiceField};
use crate::form::{BaseForm, Form};

/// Builds a custom form field for an array column.
pub type FormClass = Arc<dyn Fn(&ArrayField) -> Box<dyn FormField> + Send + Sync>;

/// Overrides applied by [`formfield`].
#[derive(Clone, Default)]
pub struct FormFieldOptions {
    /// Replaces the generated field entirely.
    pub form_class: Option<FormClass>,
    /// Overrides the label (default: the capitalised verbose name).
    pub label: Option<String>,
    /// Overrides the help text.
    pub help_text: Option<String>,
    /// Overrides `required` (default: `!field.blank`).
    pub required: Option<bool>,
}

impl fmt::Debug for FormFieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormFieldOptions")
            .field("form_class", &self.form_class.is_some())
            .field("label", &self.label)
            .field("help_text", &self.help_text)
            .field("required", &self.required)
            .finish()
    }
}

impl FormFieldOptions {
    /// Options that replace the generated field with `form_class`.
    pub fn form_class(
        form_class: impl Fn(&ArrayField) -> Box<dyn FormField> + Send + Sync + 'static,
    ) -> Self {
        Self {
            form_class: Some(Arc::new(form_class)),
            ..Self::default()
        }
    }
}

fn capfirst(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Returns the form field for an array column.
pub fn formfield(field: &ArrayField, options: &FormFieldOptions) -> FormFieldKind {
    if let Some(form_class) = &options.form_class {
        return FormFieldKind::Custom(form_class(field));
    }

    let required = options.required.unwrap_or(!field.blank);
    let label = options
        .label
        .clone()
        .unwrap_or_else(|| capfirst(&field.verbose_name));
    let help_text = options
        .help_text
        .clone()
        .unwrap_or_else(|| field.help_text.clone());

    match field.choices.as_deref() {
        Some(choices) => {
            let element = field.element_type().clone();
            let choice_field = TypedMultipleChoiceField::new(field.name, choices.to_vec())
                .required(required)
                .label(label)
                .help_text(help_text);
            let choice_field = if element.is_text() {
                choice_field.coerce(coerce_text)
            } else {
                choice_field.coerce(move |v| element.cast(v))
            };
            FormFieldKind::TypedMultipleChoice(choice_field)
        }
        None => FormFieldKind::Array(
            ArrayFormField::new(field.name)
                .element(field.element_type().clone())
                .required(required)
                .label(label)
                .help_text(help_text),
        ),
    }
}

/// Which array fields a model form includes.
#[derive(Debug, Clone, Default)]
pub enum ModelFormFields {
    /// Every array field.
    #[default]
    All,
    /// Only the named fields.
    Include(Vec<String>),
    /// Every field except the named ones.
    Exclude(Vec<String>),
}

impl ModelFormFields {
    fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(names) => names.iter().any(|n| n == name),
            Self::Exclude(names) => !names.iter().any(|n| n == name),
        }
    }
}

/// Configuration for generating a model-backed form.
#[derive(Debug, Clone)]
pub struct ModelFormConfig {
    /// The model metadata to generate fields from.
    pub model_meta: &'static ModelMeta,
    /// Which fields to include.
    pub fields: ModelFormFields,
    /// Per-field overrides keyed by attribute name.
    pub overrides: HashMap<String, FormFieldOptions>,
}

impl ModelFormConfig {
    /// Includes every array field with default options.
    pub fn new(model_meta: &'static ModelMeta) -> Self {
        Self {
            model_meta,
            fields: ModelFormFields::All,
            overrides: HashMap::new(),
        }
    }

    /// Sets which fields to include.
    #[must_use]
    pub fn with_fields(mut self, fields: ModelFormFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the options for one field.
    #[must_use]
    pub fn with_options(mut self, field_name: impl Into<String>, options: FormFieldOptions) -> Self {
        self.overrides.insert(field_name.into(), options);
        self
    }
}

/// Generates the form fields described by `config`.
pub fn generate_form_fields(config: &ModelFormConfig) -> Vec<FormFieldKind> {
    let defaults = FormFieldOptions::default();
    config
        .model_meta
        .array_fields()
        .filter(|field| config.fields.includes(field.name))
        .map(|field| formfield(field, config.overrides.get(field.name).unwrap_or(&defaults)))
        .collect()
}

/// Builds an unbound form over every array field of `M`.
pub fn model_form<M: Model>() -> BaseForm {
    BaseForm::new(generate_form_fields(&ModelFormConfig::new(M::meta())))
}

/// Builds an unbound form over `M`'s array fields, initialised from
/// `instance`.
pub fn model_form_for_instance<M: Model>(instance: &M) -> BaseForm {
    let meta = M::meta();
    let initial: HashMap<String, Value> = instance
        .field_values()
        .into_iter()
        .filter(|(name, _)| meta.array_field(name).is_some())
        .map(|(name, value)| (name.to_string(), value))
        .collect();
    model_form::<M>().with_initial(initial)
}

/// Pairs a validated form's cleaned data with `M`'s attribute names, ready
/// for an update or for building an instance.
pub fn cleaned_values<M: Model>(form: &BaseForm) -> Vec<(&'static str, Value)> {
    M::meta()
        .array_fields()
        .filter_map(|field| {
            form.cleaned_data()
                .get(field.name)
                .map(|value| (field.name, value.clone()))
        })
        .collect()
}
