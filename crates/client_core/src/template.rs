//! `{name}` placeholder substitution for URL and markup templates.

use serde_json::Value;
use tracing::debug;

/// Replaces `{key}` with the matching value of `values`.
///
/// Objects are looked up by key and arrays by index; an empty `{}` takes the next
/// positional value. Strings are inserted verbatim, other JSON values as their JSON text.
/// Missing values and `null` render as nothing. An unterminated `{` is copied literally.
pub fn render_template(template: &str, values: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut position = 0usize;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let name = &after[..close];
        let key = if name.is_empty() {
            let key = position.to_string();
            position += 1;
            key
        } else {
            name.to_string()
        };

        match lookup(values, &key) {
            Some(Value::String(text)) => out.push_str(text),
            Some(Value::Null) => {}
            Some(other) => out.push_str(&other.to_string()),
            None => debug!(placeholder = %key, "template value missing"),
        }

        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn lookup<'a>(values: &'a Value, key: &str) -> Option<&'a Value> {
    match values {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Null => None,
        scalar => (key == "0").then_some(scalar),
    }
}
