//! Bound fields: form fields paired with their submitted data and errors.

use std::collections::HashMap;

use crate::fields::FormField;
use crate::widgets::{escape, Widget};

/// A form field bound to data and validation state, ready to render.
pub struct BoundField<'a> {
    /// The field's HTML name attribute.
    pub name: String,
    /// The field definition.
    pub field: &'a dyn FormField,
    /// The widget text for the current value.
    pub data: Option<String>,
    /// Validation error messages for this field.
    pub errors: Vec<String>,
    /// The widget instance used for rendering.
    pub widget: Box<dyn Widget>,
}

impl<'a> BoundField<'a> {
    /// Creates a bound field, prefixing the HTML name when a prefix is set.
    pub fn new(
        field: &'a dyn FormField,
        data: Option<String>,
        errors: Vec<String>,
        prefix: Option<&str>,
    ) -> Self {
        let name = match prefix {
            Some(p) => format!("{p}-{}", field.name()),
            None => field.name().to_string(),
        };
        Self {
            name,
            widget: field.widget(),
            field,
            data,
            errors,
        }
    }

    /// Renders the widget with an `id` attribute.
    pub fn render(&self) -> String {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), self.auto_id());
        if self.field.required() {
            attrs.insert("required".to_string(), "required".to_string());
        }
        self.widget.render(&self.name, self.data.as_deref(), &attrs)
    }

    /// Renders the `<label>` element.
    pub fn label_tag(&self) -> String {
        let label_id = self.widget.id_for_label(&self.auto_id());
        format!(
            r#"<label for="{label_id}">{}:</label>"#,
            escape(self.field.label())
        )
    }

    /// Returns the auto-generated HTML `id` for this field.
    pub fn auto_id(&self) -> String {
        format!("id_{}", self.name)
    }

    /// Renders errors as `<ul class="errorlist">`, or nothing.
    pub fn errors_as_ul(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        let items: String = self
            .errors
            .iter()
            .map(|e| format!("<li>{}</li>", escape(e)))
            .collect();
        format!(r#"<ul class="errorlist">{items}</ul>"#)
    }

    /// Renders one `<tr>` of [`BaseForm::as_table`](crate::form::BaseForm::as_table).
    pub fn as_table_row(&self) -> String {
        let help = if self.field.help_text().is_empty() {
            String::new()
        } else {
            format!(
                r#"<br><span class="helptext">{}</span>"#,
                escape(self.field.help_text())
            )
        };
        format!(
            "<tr><th>{}</th><td>{}{}{help}</td></tr>",
            self.label_tag(),
            self.errors_as_ul(),
            self.render()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::ArrayFormField;

    #[test]
    fn test_bound_field_row() {
        let field = ArrayFormField::new("lista").required(false).help_text("Comma separated");
        let bound = BoundField::new(&field, Some("1,2".to_string()), vec![], None);
        assert_eq!(
            bound.as_table_row(),
            "<tr><th><label for=\"id_lista\">Lista:</label></th><td>\
             <input type=\"text\" name=\"lista\" value=\"1,2\" id=\"id_lista\" />\
             <br><span class=\"helptext\">Comma separated</span></td></tr>"
        );
    }

    #[test]
    fn test_bound_field_prefix_and_errors() {
        let field = ArrayFormField::new("lista");
        let bound = BoundField::new(&field, None, vec!["Bad <input>".to_string()], Some("f"));
        assert_eq!(bound.auto_id(), "id_f-lista");
        assert_eq!(
            bound.errors_as_ul(),
            r#"<ul class="errorlist"><li>Bad &lt;input&gt;</li></ul>"#
        );
        assert!(bound.render().contains(r#"required="required""#));
    }
}
