//! Parameter extraction and coercion.
//!
//! Parameters arrive as strings. Before schema validation they are coerced
//! into typed JSON according to the declared schema type; a value that does
//! not parse stays a string so the schema engine reports the mismatch.

use http::HeaderMap;
use indexmap::IndexMap;
use serde_json::Value;

use crate::document::ParameterLocation;
use crate::operation::Parameter;
use crate::schema::{self, CompiledSchema};

/// Path parameter values keyed by declared name, percent-decoded.
pub type PathParameters = IndexMap<String, String>;

/// Coerces a single raw value according to `schema`.
pub fn coerce(raw: &str, schema: Option<&Value>) -> Value {
    let Some(schema) = schema else {
        return Value::String(raw.to_string());
    };

    match schema::primary_type(schema) {
        Some("integer") => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some("number") => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map_or_else(|| Value::String(raw.to_string()), Value::Number),
        Some("boolean") => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some("array") => split_array(raw, schema),
        _ => Value::String(raw.to_string()),
    }
}

/// Coerces exploded values (repeated query keys or form fields).
///
/// Array schemas take every value as one item, commas included; anything
/// else takes the first one.
pub fn coerce_values(values: &[String], schema: Option<&Value>) -> Value {
    match schema {
        Some(s) if schema::primary_type(s) == Some("array") => {
            let items = schema::items_schema(s);
            Value::Array(values.iter().map(|v| coerce(v, items)).collect())
        }
        _ => values
            .first()
            .map_or(Value::Null, |first| coerce(first, schema)),
    }
}

fn split_array(raw: &str, schema: &Value) -> Value {
    let items = schema::items_schema(schema);
    if raw.is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(raw.split(',').map(|item| coerce(item.trim(), items)).collect())
}

/// Parses the query string into ordered key/value pairs.
pub fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .unwrap_or_default()
}

/// Parses every `Cookie` header into name/value pairs.
pub fn cookies(headers: &HeaderMap) -> IndexMap<String, String> {
    let mut cookies = IndexMap::new();
    for value in headers.get_all(http::header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().trim_matches('"').to_string());
            }
        }
    }
    cookies
}

/// Request values parameters are read from.
#[derive(Debug)]
pub struct ParameterSource<'a> {
    /// Path parameters from the resolver.
    pub path: &'a PathParameters,
    /// Decoded query pairs.
    pub query: &'a [(String, String)],
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Parsed cookies.
    pub cookies: &'a IndexMap<String, String>,
}

/// Outcome of reading one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// The parameter is absent.
    Missing,
    /// The parameter is present and was coerced.
    Value(Value),
    /// The parameter is present but could not be decoded.
    Undecodable(String),
}

impl ParameterSource<'_> {
    /// Reads and coerces a declared parameter.
    pub fn extract(&self, param: &Parameter) -> Extracted {
        let schema = param.schema.as_ref().map(CompiledSchema::schema);

        let raw: Vec<String> = match param.location {
            ParameterLocation::Path => self.path.get(&param.name).cloned().into_iter().collect(),
            ParameterLocation::Query => self
                .query
                .iter()
                .filter(|(key, _)| *key == param.name)
                .map(|(_, value)| value.clone())
                .collect(),
            ParameterLocation::Header => {
                let mut values = Vec::new();
                for value in self.headers.get_all(param.name.as_str()) {
                    match value.to_str() {
                        Ok(v) => values.push(v.trim().to_string()),
                        Err(_) => {
                            return Extracted::Undecodable(
                                "header value is not visible ASCII".to_string(),
                            )
                        }
                    }
                }
                if values.len() > 1 {
                    vec![values.join(",")]
                } else {
                    values
                }
            }
            ParameterLocation::Cookie => {
                self.cookies.get(&param.name).cloned().into_iter().collect()
            }
        };

        if raw.is_empty() {
            return Extracted::Missing;
        }

        if param.json_content {
            return match serde_json::from_str(&raw[0]) {
                Ok(value) => Extracted::Value(value),
                Err(e) => Extracted::Undecodable(e.to_string()),
            };
        }

        // Only exploded query arrays repeat the key; every other style packs
        // the items into one comma separated value.
        if param.location == ParameterLocation::Query && param.explode {
            return Extracted::Value(coerce_values(&raw, schema));
        }
        Extracted::Value(coerce(&raw[0], schema))
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use serde_json::json;

    use super::*;
    use crate::formats::FormatRegistry;
    use crate::schema::{Dialect, SchemaCompiler};

    #[test]
    fn test_coerce_scalars() {
        assert_eq!(coerce("42", Some(&json!({"type": "integer"}))), json!(42));
        assert_eq!(coerce("4.5", Some(&json!({"type": "number"}))), json!(4.5));
        assert_eq!(coerce("true", Some(&json!({"type": "boolean"}))), json!(true));
        assert_eq!(coerce("abc", Some(&json!({"type": "string"}))), json!("abc"));
        assert_eq!(coerce("abc", None), json!("abc"));
    }

    #[test]
    fn test_coerce_keeps_unparseable_as_string() {
        assert_eq!(coerce("abc", Some(&json!({"type": "integer"}))), json!("abc"));
        assert_eq!(coerce("yes", Some(&json!({"type": "boolean"}))), json!("yes"));
    }

    #[test]
    fn test_coerce_nullable_integer() {
        let schema = json!({"anyOf": [{"type": "integer"}, {"type": "null"}]});
        assert_eq!(coerce("7", Some(&schema)), json!(7));
    }

    #[test]
    fn test_coerce_array() {
        let schema = json!({"type": "array", "items": {"type": "integer"}});
        assert_eq!(coerce("1,2,3", Some(&schema)), json!([1, 2, 3]));
        assert_eq!(
            coerce_values(&["1".to_string(), "2".to_string()], Some(&schema)),
            json!([1, 2])
        );
    }

    #[test]
    fn test_coerce_object_stays_string() {
        assert_eq!(coerce("a=b", Some(&json!({"type": "object"}))), json!("a=b"));
    }

    #[test]
    fn test_query_pairs() {
        let pairs = query_pairs(Some("a=1&b=hello%20world&a=2"));
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], ("b".to_string(), "hello world".to_string()));
        assert!(query_pairs(None).is_empty());
    }

    #[test]
    fn test_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::COOKIE,
            HeaderValue::from_static("session=abc; theme=\"dark\""),
        );
        let cookies = cookies(&headers);
        assert_eq!(cookies.get("session").map(String::as_str), Some("abc"));
        assert_eq!(cookies.get("theme").map(String::as_str), Some("dark"));
    }

    fn param(name: &str, location: ParameterLocation) -> Parameter {
        Parameter {
            name: name.to_string(),
            location,
            required: false,
            explode: true,
            json_content: false,
            schema: None,
        }
    }

    #[test]
    fn test_extract_by_location() {
        let mut path = PathParameters::new();
        path.insert("id".to_string(), "abc".to_string());
        let query = query_pairs(Some("limit=10"));
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", HeaderValue::from_static("t-1"));
        let cookies = IndexMap::new();

        let source = ParameterSource {
            path: &path,
            query: &query,
            headers: &headers,
            cookies: &cookies,
        };

        assert_eq!(
            source.extract(&param("id", ParameterLocation::Path)),
            Extracted::Value(json!("abc"))
        );
        assert_eq!(
            source.extract(&param("limit", ParameterLocation::Query)),
            Extracted::Value(json!("10"))
        );
        assert_eq!(
            source.extract(&param("X-Trace", ParameterLocation::Header)),
            Extracted::Value(json!("t-1"))
        );
        assert_eq!(
            source.extract(&param("session", ParameterLocation::Cookie)),
            Extracted::Missing
        );
    }

    #[test]
    fn test_exploded_query_keeps_commas() {
        let path = PathParameters::new();
        let headers = HeaderMap::new();
        let cookies = IndexMap::new();
        let schema = json!({"type": "array", "maxItems": 1, "items": {"type": "string"}});
        let mut tag = param("tag", ParameterLocation::Query);
        tag.schema = Some(
            SchemaCompiler::new(Dialect::OpenApi30, FormatRegistry::default())
                .compile(schema, "tag")
                .unwrap(),
        );

        let query = query_pairs(Some("tag=a%2Cb"));
        let source = ParameterSource {
            path: &path,
            query: &query,
            headers: &headers,
            cookies: &cookies,
        };
        assert_eq!(source.extract(&tag), Extracted::Value(json!(["a,b"])));

        let query = query_pairs(Some("tag=a&tag=b"));
        let source = ParameterSource {
            query: &query,
            ..source
        };
        assert_eq!(source.extract(&tag), Extracted::Value(json!(["a", "b"])));

        tag.explode = false;
        let query = query_pairs(Some("tag=a,b"));
        let source = ParameterSource {
            query: &query,
            ..source
        };
        assert_eq!(source.extract(&tag), Extracted::Value(json!(["a", "b"])));
    }

    #[test]
    fn test_extract_json_content() {
        let path = PathParameters::new();
        let query = query_pairs(Some("filter=%7B%22a%22%3A1%7D"));
        let headers = HeaderMap::new();
        let cookies = IndexMap::new();
        let source = ParameterSource {
            path: &path,
            query: &query,
            headers: &headers,
            cookies: &cookies,
        };

        let mut filter = param("filter", ParameterLocation::Query);
        filter.json_content = true;
        assert_eq!(source.extract(&filter), Extracted::Value(json!({"a": 1})));
    }
}
