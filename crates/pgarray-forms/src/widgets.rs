//! Widget system for rendering HTML form elements.
//!
//! Array form fields render as a single text input holding the delimited
//! list; typed multiple-choice fields render as a `<select multiple>` or a
//! list of checkboxes.

use std::collections::HashMap;
use std::fmt;

use crate::fields::FormValue;
use crate::form::FormData;

/// Enumerates the built-in widget types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetType {
    /// `<input type="text">`.
    TextInput,
    /// `<textarea>`.
    Textarea,
    /// `<input type="hidden">`.
    HiddenInput,
    /// `<select multiple>`.
    SelectMultiple,
    /// A set of `<input type="checkbox">` elements.
    CheckboxSelectMultiple,
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TextInput => "TextInput",
            Self::Textarea => "Textarea",
            Self::HiddenInput => "HiddenInput",
            Self::SelectMultiple => "SelectMultiple",
            Self::CheckboxSelectMultiple => "CheckboxSelectMultiple",
        };
        write!(f, "{name}")
    }
}

/// A trait for HTML form widgets.
pub trait Widget: Send + Sync + fmt::Debug {
    /// Returns the widget type enum variant.
    fn widget_type(&self) -> WidgetType;

    /// Renders the widget as an HTML string.
    ///
    /// Multiple-choice widgets read `value` as the delimited list of
    /// selected choice values.
    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String;

    /// Extracts the submitted value for `name`.
    fn value_from_data(&self, data: &FormData, name: &str) -> FormValue {
        data.get(name).cloned().unwrap_or(FormValue::Missing)
    }

    /// Returns the HTML `id` attribute value for a label targeting this widget.
    fn id_for_label(&self, id: &str) -> String {
        id.to_string()
    }
}

/// Escapes text for use in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Formats an HTML attributes map into a string like ` key="value" key2="value2"`.
fn render_attrs(attrs: &HashMap<String, String>) -> String {
    let mut parts: Vec<String> = attrs
        .iter()
        .map(|(k, v)| format!(r#" {k}="{}""#, escape(v)))
        .collect();
    parts.sort();
    parts.join("")
}

fn selected_values(value: Option<&str>) -> Vec<&str> {
    value
        .filter(|v| !v.is_empty())
        .map_or_else(Vec::new, |v| v.split(',').collect())
}

/// A basic `<input type="text">` widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextInput;

impl Widget for TextInput {
    fn widget_type(&self) -> WidgetType {
        WidgetType::TextInput
    }

    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String {
        let val = escape(value.unwrap_or(""));
        format!(
            r#"<input type="text" name="{name}" value="{val}"{} />"#,
            render_attrs(attrs)
        )
    }
}

/// A `<textarea>` widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Textarea;

impl Widget for Textarea {
    fn widget_type(&self) -> WidgetType {
        WidgetType::Textarea
    }

    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String {
        let val = escape(value.unwrap_or(""));
        format!(
            r#"<textarea name="{name}" cols="40" rows="10"{}>{val}</textarea>"#,
            render_attrs(attrs)
        )
    }
}

/// An `<input type="hidden">` widget.
#[derive(Debug, Clone, Copy, Default)]
pub struct HiddenInput;

impl Widget for HiddenInput {
    fn widget_type(&self) -> WidgetType {
        WidgetType::HiddenInput
    }

    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String {
        let val = escape(value.unwrap_or(""));
        format!(
            r#"<input type="hidden" name="{name}" value="{val}"{} />"#,
            render_attrs(attrs)
        )
    }
}

/// A `<select multiple>` widget.
#[derive(Debug, Clone, Default)]
pub struct SelectMultiple {
    /// The available choices as `(value, display_label)` pairs.
    pub choices: Vec<(String, String)>,
}

impl SelectMultiple {
    /// Creates a new `SelectMultiple` widget with the given choices.
    pub const fn new(choices: Vec<(String, String)>) -> Self {
        Self { choices }
    }
}

impl Widget for SelectMultiple {
    fn widget_type(&self) -> WidgetType {
        WidgetType::SelectMultiple
    }

    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String {
        let selected_values = selected_values(value);
        let options: String = self
            .choices
            .iter()
            .map(|(val, label)| {
                let selected = if selected_values.contains(&val.as_str()) {
                    " selected"
                } else {
                    ""
                };
                format!(
                    r#"<option value="{}"{selected}>{}</option>"#,
                    escape(val),
                    escape(label)
                )
            })
            .collect();
        format!(
            r#"<select name="{name}" multiple{}>{options}</select>"#,
            render_attrs(attrs)
        )
    }
}

/// A list of checkboxes, one per choice.
#[derive(Debug, Clone, Default)]
pub struct CheckboxSelectMultiple {
    /// The available choices as `(value, display_label)` pairs.
    pub choices: Vec<(String, String)>,
}

impl CheckboxSelectMultiple {
    /// Creates a new `CheckboxSelectMultiple` widget with the given choices.
    pub const fn new(choices: Vec<(String, String)>) -> Self {
        Self { choices }
    }
}

impl Widget for CheckboxSelectMultiple {
    fn widget_type(&self) -> WidgetType {
        WidgetType::CheckboxSelectMultiple
    }

    fn render(&self, name: &str, value: Option<&str>, attrs: &HashMap<String, String>) -> String {
        let selected_values = selected_values(value);
        let items: String = self
            .choices
            .iter()
            .enumerate()
            .map(|(i, (val, label))| {
                let checked = if selected_values.contains(&val.as_str()) {
                    " checked"
                } else {
                    ""
                };
                format!(
                    r#"<li><label for="id_{name}_{i}"><input type="checkbox" name="{name}" value="{}" id="id_{name}_{i}"{checked}{} /> {}</label></li>"#,
                    escape(val),
                    render_attrs(attrs),
                    escape(label)
                )
            })
            .collect();
        format!("<ul>{items}</ul>")
    }

    fn id_for_label(&self, id: &str) -> String {
        format!("{id}_0")
    }
}

/// Creates the widget for a widget type. Choices are ignored by widgets
/// that do not offer any.
pub fn widget_for(widget_type: WidgetType, choices: Vec<(String, String)>) -> Box<dyn Widget> {
    match widget_type {
        WidgetType::TextInput => Box::new(TextInput),
        WidgetType::Textarea => Box::new(Textarea),
        WidgetType::HiddenInput => Box::new(HiddenInput),
        WidgetType::SelectMultiple => Box::new(SelectMultiple::new(choices)),
        WidgetType::CheckboxSelectMultiple => Box::new(CheckboxSelectMultiple::new(choices)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_input_escapes_value() {
        let html = TextInput.render("lista", Some("a,\"b\",<c>"), &HashMap::new());
        assert_eq!(
            html,
            r#"<input type="text" name="lista" value="a,&quot;b&quot;,&lt;c&gt;" />"#
        );
    }

    #[test]
    fn test_text_input_keeps_unicode() {
        let html = TextInput.render("lista", Some("Клиент,こんにちは"), &HashMap::new());
        assert!(html.contains(r#"value="Клиент,こんにちは""#));
    }

    #[test]
    fn test_attrs_are_sorted() {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), "id_lista".to_string());
        attrs.insert("class".to_string(), "wide".to_string());
        let html = HiddenInput.render("lista", None, &attrs);
        assert_eq!(
            html,
            r#"<input type="hidden" name="lista" value="" class="wide" id="id_lista" />"#
        );
    }

    #[test]
    fn test_select_multiple_marks_selected() {
        let widget = SelectMultiple::new(vec![
            ("a".to_string(), "A".to_string()),
            ("b".to_string(), "B".to_string()),
        ]);
        let html = widget.render("tags", Some("b"), &HashMap::new());
        assert_eq!(
            html,
            r#"<select name="tags" multiple><option value="a">A</option><option value="b" selected>B</option></select>"#
        );
    }

    #[test]
    fn test_checkbox_select_multiple() {
        let widget = CheckboxSelectMultiple::new(vec![("a".to_string(), "A".to_string())]);
        let html = widget.render("tags", Some("a"), &HashMap::new());
        assert!(html.contains("checked"));
        assert_eq!(widget.id_for_label("id_tags"), "id_tags_0");
    }

    #[test]
    fn test_value_from_data() {
        let mut data = FormData::new();
        data.insert("lista".to_string(), FormValue::from("1,2"));
        assert_eq!(TextInput.value_from_data(&data, "lista"), FormValue::from("1,2"));
        assert_eq!(TextInput.value_from_data(&data, "other"), FormValue::Missing);
    }

    #[test]
    fn test_widget_for() {
        assert_eq!(
            widget_for(WidgetType::SelectMultiple, vec![]).widget_type(),
            WidgetType::SelectMultiple
        );
        assert_eq!(WidgetType::Textarea.to_string(), "Textarea");
    }
}
