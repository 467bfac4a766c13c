//! Minimal inline HTML for the admin pages. Every interpolated value goes
//! through [`escape`].

use crate::field::FieldKind;
use crate::model::ModelDefinition;
use crate::record::Record;
use crate::users::{User, USERS};
use serde_json::Value;
use std::fmt::Write;
use std::sync::Arc;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn user_query(user: &User) -> String {
    format!("user={}", urlencoding::encode(&user.username))
}

pub fn listing_path(model: &ModelDefinition, user: &User) -> String {
    format!("/listings/{}?{}", model.table_name, user_query(user))
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => escape(s),
        Some(other) => escape(&other.to_string()),
    }
}

fn layout(title: &str, user: &User, body: &str) -> String {
    let mut switcher = String::new();
    for u in USERS.users() {
        let marker = if u.username == user.username { " (current)" } else { "" };
        let _ = write!(
            switcher,
            r#" <a href="/?user={}">{}</a>{}"#,
            urlencoding::encode(&u.username),
            escape(&u.name),
            marker
        );
    }
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>\n\
         <nav><a href=\"/?{query}\">Models</a> | acting as {name} [{role}] | switch:{switcher}</nav>\n\
         <h1>{title}</h1>\n{body}\n</body></html>\n",
        title = escape(title),
        query = user_query(user),
        name = escape(&user.name),
        role = escape(&user.role),
        switcher = switcher,
        body = body,
    )
}

/// Landing page: registered models and the publish form.
pub fn model_index(models: &[Arc<ModelDefinition>], user: &User) -> String {
    let mut body = String::from("<ul>\n");
    for model in models {
        let _ = writeln!(
            body,
            r#"<li><a href="{}">{}</a> <code>/api/{}</code></li>"#,
            escape(&listing_path(model, user)),
            escape(&model.name),
            escape(&model.table_name)
        );
    }
    if models.is_empty() {
        body.push_str("<li>No models yet.</li>\n");
    }
    body.push_str("</ul>\n<h2>Publish a model</h2>\n");
    let _ = write!(body, r#"<form method="post" action="/admin/publish?{}">"#, user_query(user));
    body.push_str(
        "\n<label>Name <input name=\"name\" required></label>\n\
         <label>Table <input name=\"tableName\" placeholder=\"defaults to name + s\"></label>\n\
         <label>Owner field <input name=\"ownerField\"></label>\n<table>\n\
         <tr><th>Field</th><th>Type</th><th>Required</th><th>Default</th></tr>\n",
    );
    for _ in 0..4 {
        body.push_str(
            "<tr><td><input name=\"field_name[]\"></td>\
             <td><select name=\"field_type[]\"><option>string</option><option>number</option><option>boolean</option></select></td>\
             <td><select name=\"field_required[]\"><option value=\"\">no</option><option value=\"on\">yes</option></select></td>\
             <td><input name=\"field_default[]\"></td></tr>\n",
        );
    }
    body.push_str("</table>\n<button type=\"submit\">Publish</button>\n</form>\n");
    layout("Models", user, &body)
}

pub fn record_list(model: &ModelDefinition, records: &[Record], user: &User) -> String {
    let query = user_query(user);
    let mut body = format!(r#"<p><a href="/listings/{}/new?{}">New {}</a></p>"#, model.table_name, query, escape(&model.name));
    body.push_str("\n<table>\n<tr><th>id</th>");
    for field in &model.fields {
        let _ = write!(body, "<th>{}</th>", escape(&field.name));
    }
    body.push_str("<th></th></tr>\n");
    for record in records {
        let _ = write!(body, "<tr><td>{}</td>", escape(&record.id));
        for field in &model.fields {
            let _ = write!(body, "<td>{}</td>", display_value(record.get(&field.name)));
        }
        let _ = writeln!(
            body,
            r#"<td><a href="/listings/{t}/{id}?{q}">show</a> <a href="/listings/{t}/{id}/edit?{q}">edit</a> {delete}</td></tr>"#,
            t = model.table_name,
            id = urlencoding::encode(&record.id),
            q = query,
            delete = delete_button(model, record, user),
        );
    }
    body.push_str("</table>");
    layout(&model.name, user, &body)
}

fn delete_button(model: &ModelDefinition, record: &Record, user: &User) -> String {
    format!(
        r#"<form method="post" action="/listings/{}/{}?_method=DELETE&amp;{}" style="display:inline"><button type="submit">delete</button></form>"#,
        model.table_name,
        urlencoding::encode(&record.id),
        user_query(user)
    )
}

pub fn record_show(model: &ModelDefinition, record: &Record, user: &User) -> String {
    let mut body = format!("<dl>\n<dt>id</dt><dd>{}</dd>\n", escape(&record.id));
    for field in &model.fields {
        let _ = writeln!(body, "<dt>{}</dt><dd>{}</dd>", escape(&field.name), display_value(record.get(&field.name)));
    }
    if let Some(owner) = model.owner_field.as_deref().filter(|o| model.field(o).is_none()) {
        let _ = writeln!(body, "<dt>{}</dt><dd>{}</dd>", escape(owner), display_value(record.get(owner)));
    }
    let _ = write!(
        body,
        r#"</dl>
<p><a href="/listings/{t}/{id}/edit?{q}">edit</a> <a href="{back}">back</a> {delete}</p>"#,
        t = model.table_name,
        id = urlencoding::encode(&record.id),
        q = user_query(user),
        back = escape(&listing_path(model, user)),
        delete = delete_button(model, record, user),
    );
    layout(&format!("{} {}", model.name, record.id), user, &body)
}

/// Create form when `record` is `None`, edit form otherwise.
pub fn record_form(model: &ModelDefinition, record: Option<&Record>, user: &User) -> String {
    let action = match record {
        Some(r) => format!("/listings/{}/{}?_method=PUT&amp;{}", model.table_name, urlencoding::encode(&r.id), user_query(user)),
        None => format!("/listings/{}?{}", model.table_name, user_query(user)),
    };
    let mut body = format!("<form method=\"post\" action=\"{}\">\n", action);
    for field in &model.fields {
        let current = record.and_then(|r| r.get(&field.name)).or(field.default.as_ref());
        let marker = if field.required { " *" } else { "" };
        let input = match field.kind {
            FieldKind::Boolean => {
                let checked = matches!(current, Some(Value::Bool(true)));
                format!(
                    r#"<select name="{n}"><option value="false"{f}>false</option><option value="true"{t}>true</option></select>"#,
                    n = escape(&field.name),
                    f = if checked { "" } else { " selected" },
                    t = if checked { " selected" } else { "" },
                )
            }
            FieldKind::Number => {
                format!(r#"<input type="number" step="any" name="{}" value="{}">"#, escape(&field.name), display_value(current))
            }
            FieldKind::String => format!(r#"<input name="{}" value="{}">"#, escape(&field.name), display_value(current)),
        };
        let _ = writeln!(body, "<label>{}{} {}</label><br>", escape(&field.name), marker, input);
    }
    let _ = write!(body, "<button type=\"submit\">Save</button>\n</form>\n<p><a href=\"{}\">back</a></p>", escape(&listing_path(model, user)));
    let title = match record {
        Some(r) => format!("Edit {} {}", model.name, r.id),
        None => format!("New {}", model.name),
    };
    layout(&title, user, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;
    use serde_json::json;

    fn alice() -> User {
        USERS.resolve(Some("alice")).clone()
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b a="x">&'"#), "&lt;b a=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn list_renders_values_escaped() {
        let model = ModelDefinition::new("Note", vec![FieldDescriptor::new("body", FieldKind::String)]);
        let mut record = Record::new("n1");
        record.values.insert("body".into(), json!("<script>"));
        let html = record_list(&model, &[record], &alice());
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("/listings/notes/n1?user=alice"));
    }

    #[test]
    fn edit_form_posts_with_put_override() {
        let model = ModelDefinition::new("Note", vec![FieldDescriptor::new("pinned", FieldKind::Boolean)]);
        let mut record = Record::new("n1");
        record.values.insert("pinned".into(), json!(true));
        let html = record_form(&model, Some(&record), &alice());
        assert!(html.contains("action=\"/listings/notes/n1?_method=PUT&amp;user=alice\""));
        assert!(html.contains(r#"<option value="true" selected>"#));
    }

    #[test]
    fn index_lists_models_and_publish_form() {
        let models = vec![Arc::new(ModelDefinition::new("Product", vec![]))];
        let html = model_index(&models, &alice());
        assert!(html.contains("/listings/products?user=alice"));
        assert!(html.contains("action=\"/admin/publish?user=alice\""));
        assert!(html.contains("field_name[]"));
    }
}
