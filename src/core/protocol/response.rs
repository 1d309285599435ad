// src/core/protocol/response.rs

//! Defines `Response`, the decoded form of a single reply line.

use serde_json::{Map, Value};

/// The `error` text used when a reply line is not a JSON object.
pub const BAD_JSON: &str = "Bad JSON";

/// A decoded reply: the JSON object the server sent, with typed accessors for
/// the fields the protocol defines.
///
/// Field order is preserved as received.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    fields: Map<String, Value>,
}

impl Response {
    /// Decodes one reply line.
    ///
    /// This never fails. A line that is not a JSON object becomes
    /// `{"ok": false, "error": "Bad JSON", "raw": <line>}`.
    pub fn decode(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(fields)) => Self { fields },
            _ => Self::bad_json(line),
        }
    }

    fn bad_json(line: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("ok".to_string(), Value::Bool(false));
        fields.insert("error".to_string(), Value::String(BAD_JSON.to_string()));
        fields.insert("raw".to_string(), Value::String(line.to_string()));
        Self { fields }
    }

    /// The success flag. A missing or non-boolean `ok` counts as failure.
    pub fn ok(&self) -> bool {
        self.fields.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    /// The server's error message, if it sent one.
    pub fn error(&self) -> Option<&str> {
        self.fields.get("error").and_then(Value::as_str)
    }

    /// The `rows` array of a multi-row result.
    pub fn rows(&self) -> Option<&Vec<Value>> {
        self.fields.get("rows").and_then(Value::as_array)
    }

    /// The `found` flag of a single-row lookup. `None` if the reply has no
    /// `found` field; a present but non-boolean value reads as `false`.
    pub fn found(&self) -> Option<bool> {
        self.fields
            .get("found")
            .map(|v| v.as_bool().unwrap_or(false))
    }

    /// The `row` object of a single-row lookup.
    pub fn row(&self) -> Option<&Map<String, Value>> {
        self.fields.get("row").and_then(Value::as_object)
    }

    /// The original line, present only on a `Bad JSON` fallback.
    pub fn raw(&self) -> Option<&str> {
        self.fields.get("raw").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for Response {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
