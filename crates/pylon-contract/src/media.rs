//! Media type matching and body decoding.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::params;
use crate::schema::{self, CompiledSchema};

/// A declared media type with its compiled schema.
#[derive(Debug, Clone)]
pub struct MediaType {
    /// Lowercased media range as declared, e.g. `application/json`.
    pub range: String,
    /// Compiled schema, if one was declared.
    pub schema: Option<CompiledSchema>,
}

/// The `content` map of a request body or response.
#[derive(Debug, Clone, Default)]
pub struct Content {
    media_types: IndexMap<String, MediaType>,
}

impl Content {
    /// Adds a media type.
    pub fn insert(&mut self, media_type: MediaType) {
        self.media_types.insert(media_type.range.clone(), media_type);
    }

    /// Returns true if no media type is declared.
    pub fn is_empty(&self) -> bool {
        self.media_types.is_empty()
    }

    /// Iterates over declared media types.
    pub fn iter(&self) -> impl Iterator<Item = &MediaType> {
        self.media_types.values()
    }

    /// Finds the declared entry for a `Content-Type` value: exact essence,
    /// then `type/*`, then `*/*`.
    pub fn find(&self, content_type: &str) -> Option<&MediaType> {
        let essence = essence(content_type);
        if essence.is_empty() {
            return None;
        }

        if let Some(found) = self.media_types.get(essence.as_str()) {
            return Some(found);
        }

        essence
            .split_once('/')
            .and_then(|(ty, _)| self.media_types.get(format!("{ty}/*").as_str()))
            .or_else(|| self.media_types.get("*/*"))
    }
}

/// Lowercased `type/subtype` without parameters.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// How a body of a given media type is decoded for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `application/json` and `*+json`.
    Json,
    /// `application/x-www-form-urlencoded`.
    Form,
    /// `text/*`.
    Text,
    /// Anything else; accepted without schema validation.
    Opaque,
}

impl BodyKind {
    /// Classifies a media type essence.
    pub fn of(essence: &str) -> Self {
        if essence == "application/json" || essence.ends_with("+json") {
            Self::Json
        } else if essence == "application/x-www-form-urlencoded" {
            Self::Form
        } else if essence.starts_with("text/") {
            Self::Text
        } else {
            Self::Opaque
        }
    }
}

/// Decodes a body for validation.
///
/// Returns `Ok(None)` for media types that are not validated.
pub fn decode_body(
    content_type: &str,
    body: &[u8],
    schema: Option<&CompiledSchema>,
) -> Result<Option<Value>, String> {
    match BodyKind::of(&essence(content_type)) {
        BodyKind::Json => serde_json::from_slice(body)
            .map(Some)
            .map_err(|e| e.to_string()),
        BodyKind::Form => decode_form(body, schema.map(CompiledSchema::schema)).map(Some),
        BodyKind::Text => std::str::from_utf8(body)
            .map(|text| Some(Value::String(text.to_string())))
            .map_err(|e| e.to_string()),
        BodyKind::Opaque => Ok(None),
    }
}

fn decode_form(body: &[u8], schema: Option<&Value>) -> Result<Value, String> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|e| e.to_string())?;

    let mut grouped: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in pairs {
        grouped.entry(key).or_default().push(value);
    }

    let mut object = Map::with_capacity(grouped.len());
    for (key, values) in grouped {
        let property = schema.and_then(|s| schema::property_schema(s, &key));
        object.insert(key, params::coerce_values(&values, property));
    }
    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn content(ranges: &[&str]) -> Content {
        let mut content = Content::default();
        for range in ranges {
            content.insert(MediaType {
                range: (*range).to_string(),
                schema: None,
            });
        }
        content
    }

    #[test]
    fn test_essence() {
        assert_eq!(essence("Application/JSON; charset=utf-8"), "application/json");
        assert_eq!(essence(""), "");
    }

    #[test]
    fn test_find_exact_then_wildcards() {
        let c = content(&["application/json", "text/*", "*/*"]);
        assert_eq!(c.find("application/json").unwrap().range, "application/json");
        assert_eq!(c.find("text/plain; charset=utf-8").unwrap().range, "text/*");
        assert_eq!(c.find("image/png").unwrap().range, "*/*");
    }

    #[test]
    fn test_find_undeclared() {
        let c = content(&["application/json"]);
        assert!(c.find("text/xml").is_none());
        assert!(c.find("").is_none());
    }

    #[test]
    fn test_body_kind() {
        assert_eq!(BodyKind::of("application/json"), BodyKind::Json);
        assert_eq!(BodyKind::of("application/problem+json"), BodyKind::Json);
        assert_eq!(BodyKind::of("application/x-www-form-urlencoded"), BodyKind::Form);
        assert_eq!(BodyKind::of("text/plain"), BodyKind::Text);
        assert_eq!(BodyKind::of("application/octet-stream"), BodyKind::Opaque);
    }

    #[test]
    fn test_decode_json() {
        let value = decode_body("application/json", br#"{"id": 1}"#, None).unwrap();
        assert_eq!(value, Some(json!({"id": 1})));

        assert!(decode_body("application/json", b"{", None).is_err());
    }

    #[test]
    fn test_decode_form_without_schema_keeps_strings() {
        let value = decode_body("application/x-www-form-urlencoded", b"a=1&b=two", None).unwrap();
        assert_eq!(value, Some(json!({"a": "1", "b": "two"})));
    }

    #[test]
    fn test_decode_opaque_is_skipped() {
        let value = decode_body("application/octet-stream", &[0xff, 0x00], None).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_decode_text() {
        let value = decode_body("text/plain", b"hello", None).unwrap();
        assert_eq!(value, Some(json!("hello")));
        assert!(decode_body("text/plain", &[0xff, 0xfe], None).is_err());
    }
}
