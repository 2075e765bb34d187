//! Typed view of an OpenAPI 3.x document.
//!
//! Only the parts of the document that drive validation are modelled here.
//! Schemas stay as raw [`serde_json::Value`]s; they are resolved and compiled
//! by [`crate::schema`]. Maps use [`IndexMap`] so declaration order survives
//! deserialization, which the route table depends on.

use indexmap::IndexMap;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ContractError, ContractResult};

/// Maximum number of hops when following chained component references.
const MAX_REF_HOPS: usize = 64;

/// Either a `$ref` object or an inline value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    /// A reference to a component.
    Ref {
        /// The reference string, e.g. `#/components/parameters/Id`.
        #[serde(rename = "$ref")]
        reference: String,
    },
    /// An inline value.
    Item(T),
}

/// Root of an OpenAPI document.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenApiDocument {
    /// The `openapi` version string.
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub openapi: Option<String>,
    /// Present on Swagger 2.0 documents, which are rejected.
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub swagger: Option<String>,
    /// Document metadata.
    #[serde(default)]
    pub info: Info,
    /// Declared servers.
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Path items keyed by template.
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
    /// Reusable components.
    #[serde(default)]
    pub components: Components,
    /// Document-wide security requirements.
    #[serde(default)]
    pub security: Option<Vec<SecurityRequirementObject>>,
}

/// Document metadata.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Info {
    /// API title.
    #[serde(default, deserialize_with = "scalar_string")]
    pub title: String,
    /// API version.
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
}

/// A server entry.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    /// Server URL, possibly templated.
    #[serde(deserialize_with = "scalar_string")]
    pub url: String,
    /// Template variables.
    #[serde(default)]
    pub variables: IndexMap<String, ServerVariable>,
}

/// A server URL template variable.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerVariable {
    /// Default substitution value.
    #[serde(default, deserialize_with = "scalar_string")]
    pub default: String,
}

/// Accepts any scalar where the document model wants a string.
///
/// Unquoted YAML such as `version: 1.0` arrives as a number.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::invalid_type(
            de::Unexpected::Other(json_kind(&other)),
            &"a string",
        )),
    }
}

fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_string(deserializer).map(|s| Some(s).filter(|s| !s.is_empty()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "scalar",
    }
}

/// Operations and shared parameters for one path template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    /// Parameters shared by every operation on this path.
    #[serde(default)]
    pub parameters: Vec<RefOr<ParameterObject>>,
    /// GET operation.
    pub get: Option<OperationObject>,
    /// PUT operation.
    pub put: Option<OperationObject>,
    /// POST operation.
    pub post: Option<OperationObject>,
    /// DELETE operation.
    pub delete: Option<OperationObject>,
    /// OPTIONS operation.
    pub options: Option<OperationObject>,
    /// HEAD operation.
    pub head: Option<OperationObject>,
    /// PATCH operation.
    pub patch: Option<OperationObject>,
    /// TRACE operation.
    pub trace: Option<OperationObject>,
}

impl PathItem {
    /// Returns the declared operations in the fixed OpenAPI method order.
    pub fn operations(&self) -> impl Iterator<Item = (http::Method, &OperationObject)> {
        [
            (http::Method::GET, self.get.as_ref()),
            (http::Method::PUT, self.put.as_ref()),
            (http::Method::POST, self.post.as_ref()),
            (http::Method::DELETE, self.delete.as_ref()),
            (http::Method::OPTIONS, self.options.as_ref()),
            (http::Method::HEAD, self.head.as_ref()),
            (http::Method::PATCH, self.patch.as_ref()),
            (http::Method::TRACE, self.trace.as_ref()),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.map(|op| (method, op)))
    }
}

/// A single operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    /// Declared operation id.
    pub operation_id: Option<String>,
    /// Short summary.
    pub summary: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Deprecation flag.
    #[serde(default)]
    pub deprecated: bool,
    /// Operation-level parameters.
    #[serde(default)]
    pub parameters: Vec<RefOr<ParameterObject>>,
    /// Request body.
    pub request_body: Option<RefOr<RequestBodyObject>>,
    /// Responses keyed by status, range or `default`.
    #[serde(default)]
    pub responses: IndexMap<String, RefOr<ResponseObject>>,
    /// Operation-level security; overrides the document-level requirement.
    pub security: Option<Vec<SecurityRequirementObject>>,
}

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path segment.
    Path,
    /// Query string.
    Query,
    /// Request header.
    Header,
    /// Cookie.
    Cookie,
}

impl ParameterLocation {
    /// Returns the OpenAPI name of the location.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterObject {
    /// Parameter name.
    pub name: String,
    /// Parameter location.
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Whether the parameter must be present.
    #[serde(default)]
    pub required: bool,
    /// Serialization style.
    pub style: Option<String>,
    /// Explode flag.
    pub explode: Option<bool>,
    /// Parameter schema.
    pub schema: Option<Value>,
    /// Content-based serialization, used instead of `schema`.
    pub content: Option<IndexMap<String, MediaTypeObject>>,
}

/// A request body declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBodyObject {
    /// Whether the body must be present.
    #[serde(default)]
    pub required: bool,
    /// Accepted media types.
    #[serde(default)]
    pub content: IndexMap<String, MediaTypeObject>,
}

/// A media type entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaTypeObject {
    /// Schema for payloads of this media type.
    pub schema: Option<Value>,
}

/// A response declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseObject {
    /// Response description.
    #[serde(default)]
    pub description: String,
    /// Declared response headers.
    #[serde(default)]
    pub headers: IndexMap<String, RefOr<HeaderObject>>,
    /// Response media types.
    #[serde(default)]
    pub content: IndexMap<String, MediaTypeObject>,
}

/// A response header declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderObject {
    /// Whether the header must be present.
    #[serde(default)]
    pub required: bool,
    /// Header schema.
    pub schema: Option<Value>,
}

/// A security requirement: scheme name to scopes.
pub type SecurityRequirementObject = IndexMap<String, Vec<String>>;

/// A security scheme declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SecuritySchemeObject {
    /// API key in a header, query parameter or cookie.
    #[serde(rename = "apiKey")]
    ApiKey {
        /// Key name.
        name: String,
        /// Key location.
        #[serde(rename = "in")]
        location: ParameterLocation,
    },
    /// HTTP authentication (`basic`, `bearer`, ...).
    #[serde(rename = "http")]
    Http {
        /// Authorization scheme.
        scheme: String,
    },
    /// OAuth 2.
    #[serde(rename = "oauth2")]
    OAuth2,
    /// OpenID Connect.
    #[serde(rename = "openIdConnect")]
    OpenIdConnect,
    /// Mutual TLS; not observable at this layer.
    #[serde(rename = "mutualTLS")]
    MutualTls,
}

/// Reusable components.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    /// Schemas.
    #[serde(default)]
    pub schemas: IndexMap<String, Value>,
    /// Parameters.
    #[serde(default)]
    pub parameters: IndexMap<String, RefOr<ParameterObject>>,
    /// Request bodies.
    #[serde(default)]
    pub request_bodies: IndexMap<String, RefOr<RequestBodyObject>>,
    /// Responses.
    #[serde(default)]
    pub responses: IndexMap<String, RefOr<ResponseObject>>,
    /// Headers.
    #[serde(default)]
    pub headers: IndexMap<String, RefOr<HeaderObject>>,
    /// Security schemes.
    #[serde(default)]
    pub security_schemes: IndexMap<String, RefOr<SecuritySchemeObject>>,
}

impl Components {
    /// Resolves a parameter reference.
    pub fn parameter<'a>(
        &'a self,
        item: &'a RefOr<ParameterObject>,
    ) -> ContractResult<&'a ParameterObject> {
        follow(&self.parameters, "#/components/parameters/", item)
    }

    /// Resolves a request body reference.
    pub fn request_body<'a>(
        &'a self,
        item: &'a RefOr<RequestBodyObject>,
    ) -> ContractResult<&'a RequestBodyObject> {
        follow(&self.request_bodies, "#/components/requestBodies/", item)
    }

    /// Resolves a response reference.
    pub fn response<'a>(
        &'a self,
        item: &'a RefOr<ResponseObject>,
    ) -> ContractResult<&'a ResponseObject> {
        follow(&self.responses, "#/components/responses/", item)
    }

    /// Resolves a header reference.
    pub fn header<'a>(&'a self, item: &'a RefOr<HeaderObject>) -> ContractResult<&'a HeaderObject> {
        follow(&self.headers, "#/components/headers/", item)
    }

    /// Looks up a security scheme by name.
    pub fn security_scheme(&self, name: &str) -> ContractResult<&SecuritySchemeObject> {
        let item = self
            .security_schemes
            .get(name)
            .ok_or_else(|| ContractError::UnknownSecurityScheme(name.to_string()))?;
        follow(&self.security_schemes, "#/components/securitySchemes/", item)
    }
}

fn follow<'a, T>(
    components: &'a IndexMap<String, RefOr<T>>,
    prefix: &str,
    mut item: &'a RefOr<T>,
) -> ContractResult<&'a T> {
    for _ in 0..MAX_REF_HOPS {
        match item {
            RefOr::Item(value) => return Ok(value),
            RefOr::Ref { reference } => {
                let unresolved = || ContractError::UnresolvedReference {
                    reference: reference.clone(),
                };
                let name = reference.strip_prefix(prefix).ok_or_else(unresolved)?;
                item = components
                    .get(unescape_pointer(name).as_str())
                    .ok_or_else(unresolved)?;
            }
        }
    }

    Err(ContractError::UnresolvedReference {
        reference: format!("{prefix}... (reference chain too long)"),
    })
}

/// Unescapes a single JSON pointer token (`~1` is `/`, `~0` is `~`).
pub(crate) fn unescape_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Parses document bytes into a raw JSON value.
///
/// JSON is detected by a leading `{`; everything else goes through the YAML
/// parser.
pub fn parse_raw(bytes: &[u8]) -> ContractResult<Value> {
    let trimmed = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map_or(&[][..], |start| &bytes[start..]);

    if trimmed.is_empty() {
        return Err(ContractError::Parse("document is empty".to_string()));
    }

    if trimmed.first() == Some(&b'{') {
        return serde_json::from_slice(trimmed).map_err(|e| ContractError::Parse(e.to_string()));
    }

    let yaml: serde_yaml::Value =
        serde_yaml::from_slice(trimmed).map_err(|e| ContractError::Parse(e.to_string()))?;
    yaml_to_json(yaml)
}

/// Converts a YAML value into JSON, stringifying non-string mapping keys
/// (YAML happily parses `200:` as an integer key).
fn yaml_to_json(value: serde_yaml::Value) -> ContractResult<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<ContractResult<_>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut object = serde_json::Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => {
                        return Err(ContractError::Parse(format!(
                            "unsupported mapping key: {other:?}"
                        )))
                    }
                };
                object.insert(key, yaml_to_json(value)?);
            }
            Value::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

impl OpenApiDocument {
    /// Deserializes the typed document from a raw value.
    pub fn from_value(raw: &Value) -> ContractResult<Self> {
        Self::deserialize(raw).map_err(|e| ContractError::Parse(e.to_string()))
    }

    /// Returns the OpenAPI version, rejecting anything that is not 3.x.
    pub fn checked_version(&self) -> ContractResult<&str> {
        if let Some(swagger) = &self.swagger {
            return Err(ContractError::UnsupportedVersion(format!("swagger {swagger}")));
        }
        match self.openapi.as_deref() {
            Some(version) if version.starts_with("3.") => Ok(version),
            Some(version) => Err(ContractError::UnsupportedVersion(version.to_string())),
            None => Err(ContractError::UnsupportedVersion(
                "missing 'openapi' field".to_string(),
            )),
        }
    }

    /// Returns true for OpenAPI 3.1 documents (JSON Schema 2020-12 dialect).
    pub fn is_3_1(&self) -> bool {
        self.openapi
            .as_deref()
            .is_some_and(|version| version.starts_with("3.1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
openapi: 3.0.3
info:
  title: Items
  version: "1.0"
paths:
  /items/{id}:
    parameters:
      - $ref: '#/components/parameters/Id'
    get:
      operationId: getItem
      responses:
        200:
          description: ok
components:
  parameters:
    Id:
      name: id
      in: path
      required: true
      schema:
        type: string
"#;

    #[test]
    fn test_parse_yaml_with_integer_status_keys() {
        let raw = parse_raw(YAML.as_bytes()).unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();

        assert_eq!(doc.checked_version().unwrap(), "3.0.3");
        assert_eq!(doc.info.title, "Items");
        let item = doc.paths.get("/items/{id}").unwrap();
        let op = item.get.as_ref().unwrap();
        assert!(op.responses.contains_key("200"));
    }

    #[test]
    fn test_parse_json() {
        let raw = parse_raw(br#"  {"openapi": "3.1.0", "info": {"title": "t", "version": "1"}}"#)
            .unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();
        assert!(doc.is_3_1());
        assert!(doc.paths.is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(
            parse_raw(b"{not json"),
            Err(ContractError::Parse(_))
        ));
        assert!(matches!(parse_raw(b"   "), Err(ContractError::Parse(_))));
    }

    #[test]
    fn test_swagger_rejected() {
        let raw = parse_raw(b"swagger: '2.0'\ninfo: {title: t, version: '1'}\n").unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();
        assert!(matches!(
            doc.checked_version(),
            Err(ContractError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_unquoted_numeric_strings_accepted() {
        let raw = parse_raw(
            b"openapi: 3.0.3\ninfo: {title: 2024, version: 1.0}\nservers: [{url: 42}]\npaths: {}\n",
        )
        .unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();

        assert_eq!(doc.info.version, "1.0");
        assert_eq!(doc.info.title, "2024");
        assert_eq!(doc.servers[0].url, "42");
        assert_eq!(doc.checked_version().unwrap(), "3.0.3");
    }

    #[test]
    fn test_structured_version_rejected() {
        let raw = parse_raw(b"openapi: 3.0.3\ninfo: {title: t, version: [1]}\n").unwrap();
        assert!(matches!(
            OpenApiDocument::from_value(&raw),
            Err(ContractError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_version_rejected() {
        let raw = parse_raw(b"info: {title: t, version: '1'}\n").unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();
        assert!(doc.checked_version().is_err());
    }

    #[test]
    fn test_parameter_ref_resolution() {
        let raw = parse_raw(YAML.as_bytes()).unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();
        let item = doc.paths.get("/items/{id}").unwrap();

        let param = doc.components.parameter(&item.parameters[0]).unwrap();
        assert_eq!(param.name, "id");
        assert_eq!(param.location, ParameterLocation::Path);
        assert!(param.required);
    }

    #[test]
    fn test_unresolved_parameter_ref() {
        let components = Components::default();
        let item = RefOr::Ref {
            reference: "#/components/parameters/Missing".to_string(),
        };
        assert!(matches!(
            components.parameter(&item),
            Err(ContractError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_path_item_operation_order() {
        let raw = parse_raw(
            br#"{"openapi":"3.0.0","paths":{"/a":{
                "post":{"responses":{}},
                "get":{"responses":{}}}}}"#,
        )
        .unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();
        let methods: Vec<_> = doc.paths["/a"].operations().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![http::Method::GET, http::Method::POST]);
    }

    #[test]
    fn test_security_scheme_variants() {
        let raw = parse_raw(
            br#"{"openapi":"3.0.0","components":{"securitySchemes":{
                "key":{"type":"apiKey","name":"X-Api-Key","in":"header"},
                "bearer":{"type":"http","scheme":"bearer"}}}}"#,
        )
        .unwrap();
        let doc = OpenApiDocument::from_value(&raw).unwrap();

        assert!(matches!(
            doc.components.security_scheme("key").unwrap(),
            SecuritySchemeObject::ApiKey { location: ParameterLocation::Header, .. }
        ));
        assert!(matches!(
            doc.components.security_scheme("bearer").unwrap(),
            SecuritySchemeObject::Http { .. }
        ));
        assert!(matches!(
            doc.components.security_scheme("nope"),
            Err(ContractError::UnknownSecurityScheme(_))
        ));
    }
}
