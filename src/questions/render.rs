//! HTML rendering of the security questions form.

use std::{borrow::Cow, fmt::Write};

use super::form::{FieldKind, FormData, FormErrors, SecurityQuestionsForm, Slot};

const TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/templates/security_questions.html"
));

/// Render the page.
///
/// `submitted` holds the posted values when re-rendering after a failed
/// validation; otherwise fields show the form's initial data.
#[must_use]
pub fn render_page(
    form: &SecurityQuestionsForm,
    submitted: Option<&FormData>,
    errors: Option<&FormErrors>,
    action: &str,
) -> String {
    let empty = FormErrors::default();
    let errors = errors.unwrap_or(&empty);

    let mut slots = String::new();
    for slot in form.slots() {
        render_slot(&mut slots, form, slot, submitted, errors);
    }

    TEMPLATE
        .replace("{{ACTION}}", &escape(action))
        .replace("{{NON_FIELD_ERRORS}}", &error_list(errors.non_field()))
        .replace("{{SLOTS}}", &slots)
}

fn render_slot(
    out: &mut String,
    form: &SecurityQuestionsForm,
    slot: &Slot,
    submitted: Option<&FormData>,
    errors: &FormErrors,
) {
    let value = |name: &str| -> String {
        match submitted {
            Some(data) => data.get(name).cloned().unwrap_or_default(),
            None => form.initial_value(name).unwrap_or_default().to_string(),
        }
    };

    let [question, other, answer] = slot.fields();
    let selected = value(&question.name);
    let selected = selected.trim();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "      <fieldset>");
    let _ = writeln!(out, "        <p>");
    let _ = writeln!(
        out,
        r#"          <label for="id_{name}">{label}</label>"#,
        name = question.name,
        label = escape(&question.label),
    );
    let _ = writeln!(
        out,
        r#"          <select name="{name}" id="id_{name}" data-slot="{index}"{required}>"#,
        name = question.name,
        index = slot.index(),
        required = if question.required { " required" } else { "" },
    );
    for choice in form.slot_choices(slot) {
        let id = choice.id.to_string();
        let _ = writeln!(
            out,
            r#"            <option value="{id}" data-is-other="{is_other}"{selected}>{label}</option>"#,
            is_other = u8::from(choice.is_other),
            selected = if id == selected { " selected" } else { "" },
            label = escape(&choice.label),
        );
    }
    let _ = writeln!(out, "          </select>");
    out.push_str(&error_list(errors.get(&question.name)));
    let _ = writeln!(out, "        </p>");

    for field in [other, answer] {
        let _ = writeln!(out, "        <p>");
        let _ = writeln!(
            out,
            r#"          <label for="id_{name}">{label}</label>"#,
            name = field.name,
            label = escape(&field.label),
        );
        let autocomplete = if field.kind == FieldKind::Answer {
            r#" autocomplete="off""#
        } else {
            ""
        };
        let _ = writeln!(
            out,
            r#"          <input type="text" name="{name}" id="id_{name}" value="{value}"{autocomplete}>"#,
            name = field.name,
            value = escape(&value(&field.name)),
        );
        out.push_str(&error_list(errors.get(&field.name)));
        let _ = writeln!(out, "        </p>");
    }

    let _ = writeln!(out, "      </fieldset>");
}

fn error_list(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut out = String::from(r#"<ul class="errorlist">"#);
    for message in messages {
        let _ = write!(out, "<li>{}</li>", escape(message));
    }
    out.push_str("</ul>\n");
    out
}

/// Escape text for HTML element content and quoted attribute values.
#[must_use]
pub fn escape(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}
