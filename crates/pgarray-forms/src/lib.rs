//! # pgarray-forms
//!
//! Form fields for PostgreSQL array columns.
//!
//! - [`fields`] - [`ArrayFormField`] (delimited list input) and
//!   [`TypedMultipleChoiceField`], unified by [`FormFieldKind`]
//! - [`widgets`] - HTML widgets
//! - [`form`] - [`BaseForm`]: binding, validation, `as_table` rendering
//! - [`model_form`] - fields generated from a model's array fields

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]

pub mod bound_field;
pub mod fields;
pub mod form;
pub mod model_form;
pub mod widgets;

pub use fields::{
    ArrayFormField, FormField, FormFieldKind, FormValue, TypedMultipleChoiceField,
    INVALID_LIST_MESSAGE, REQUIRED_MESSAGE,
};
pub use form::{form_data_from_json, BaseForm, Form, FormData};
pub use model_form::{
    cleaned_values, formfield, model_form, model_form_for_instance, FormFieldOptions,
    ModelFormConfig, ModelFormFields,
};
pub use widgets::{Widget, WidgetType};
