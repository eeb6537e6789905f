//! Product record: the normalized shape written to batch files, and its
//! derivation from the raw catalog response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized product payload, one entry in a batch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub name: String,
    pub url_key: String,
    /// Passed through as the catalog sent it (number, string, ...); `None` when absent or null.
    pub price: Option<Value>,
    pub description: String,
    pub images_url: Vec<String>,
}

impl Record {
    /// Builds a record from a response body. Fails only when the body is not a JSON
    /// object; missing fields, nulls and fields of an unexpected type default.
    /// `requested_id` stands in when the payload carries no usable `id`.
    pub fn from_json_body(requested_id: &str, body: &[u8]) -> Result<Record, serde_json::Error> {
        let raw: Map<String, Value> = serde_json::from_slice(body)?;
        let id = match raw.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => requested_id.to_string(),
        };
        Ok(Record {
            id,
            name: text_field(&raw, "name"),
            url_key: text_field(&raw, "url_key"),
            price: raw.get("price").filter(|v| !v.is_null()).cloned(),
            description: normalize_description(raw.get("description").and_then(Value::as_str)),
            images_url: image_urls(raw.get("images")),
        })
    }
}

/// String value of `key`, or empty for anything else.
fn text_field(raw: &Map<String, Value>, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `large_url` of every image entry that has a string one, in order.
fn image_urls(images: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = images else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|img| img.get("large_url").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

const ESCAPES: [(&str, &str); 4] = [
    ("\\u003C", "<"),
    ("\\u003c", "<"),
    ("\\u003E", ">"),
    ("\\u003e", ">"),
];

/// Decodes literal `\u003C`/`\u003E` escapes, drops `<p>`, turns `</p>` into a line
/// break, and trims. Runs to a fixpoint so the result is stable under reapplication.
pub fn normalize_description(description: Option<&str>) -> String {
    let Some(text) = description else {
        return String::new();
    };
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for (from, to) in ESCAPES {
            next = next.replace(from, to);
        }
        next = next.replace("<p>", "").replace("</p>", "\n");
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}
