//! Lenient scalar decoding for backend identifiers and labels.
//!
//! The backend is not consistent about whether ids and labels travel as JSON
//! strings or numbers. Both are accepted and normalized to `String`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a JSON string or number; anything else is an error.
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// Accepts any scalar; `null` becomes the empty string.
pub fn de_label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar label, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "de_string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "de_label")]
        label: String,
    }

    #[test]
    fn numeric_id_becomes_string() {
        let p: Probe = serde_json::from_str(r#"{"id": 42, "label": "x"}"#).unwrap();
        assert_eq!(p.id, "42");
        assert_eq!(p.label, "x");
    }

    #[test]
    fn null_label_is_empty() {
        let p: Probe = serde_json::from_str(r#"{"id": "7", "label": null}"#).unwrap();
        assert_eq!(p.label, "");
    }

    #[test]
    fn object_id_rejected() {
        let res: Result<Probe, _> = serde_json::from_str(r#"{"id": {"a": 1}}"#);
        assert!(res.is_err());
    }
}
