//! Compiled operations.
//!
//! An [`Operation`] is what the resolver hands back and what both gates
//! validate against. Everything here is built once by the
//! [`ContractLoader`](crate::ContractLoader) and never changes afterwards.

use http::Method;
use indexmap::IndexMap;

use crate::document::ParameterLocation;
use crate::media::Content;
use crate::schema::CompiledSchema;

/// A declared request parameter with its compiled schema.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Where the parameter is carried.
    pub location: ParameterLocation,
    /// Whether the parameter must be present.
    pub required: bool,
    /// Whether array values arrive as repeated keys (`form` + explode).
    pub explode: bool,
    /// Whether the value is a JSON document (`content: application/json`).
    pub json_content: bool,
    /// Compiled schema, if one was declared.
    pub schema: Option<CompiledSchema>,
}

/// A declared request body.
#[derive(Debug, Clone)]
pub struct RequestBody {
    /// Whether an empty body is a violation.
    pub required: bool,
    /// Accepted media types.
    pub content: Content,
}

/// A declared response header.
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    /// Header name as declared.
    pub name: String,
    /// Whether the header must be present.
    pub required: bool,
    /// Compiled schema, if one was declared.
    pub schema: Option<CompiledSchema>,
}

/// A declared response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Declared headers.
    pub headers: Vec<ResponseHeader>,
    /// Declared media types. Empty means no body is described.
    pub content: Content,
}

/// How a security scheme is satisfied at the HTTP level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityScheme {
    /// A named key in a header, query parameter or cookie.
    ApiKey {
        /// Key name.
        name: String,
        /// Key location.
        location: ParameterLocation,
    },
    /// `Authorization: <scheme> <credentials>`.
    Http {
        /// Lowercased scheme, e.g. `bearer` or `basic`.
        scheme: String,
    },
    /// OAuth 2 or OpenID Connect: a bearer token.
    BearerToken,
    /// Not checkable from the request (mutual TLS).
    Unverifiable,
}

/// One requirement object: all listed schemes must be satisfied.
#[derive(Debug, Clone, Default)]
pub struct SecurityRequirement {
    /// Scheme name and resolved scheme.
    pub schemes: Vec<(String, SecurityScheme)>,
}

/// A (method, path template) pair and everything needed to validate it.
#[derive(Debug, Clone)]
pub struct Operation {
    pub(crate) id: String,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) summary: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) deprecated: bool,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) request_body: Option<RequestBody>,
    pub(crate) responses: IndexMap<String, Response>,
    pub(crate) security: Vec<SecurityRequirement>,
}

impl Operation {
    /// Declared `operationId`, or `METHOD template` when none was declared.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path template as declared.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Summary, if declared.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Tags.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Whether the operation is deprecated.
    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Merged path-item and operation parameters, in declaration order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Request body, if declared.
    pub fn request_body(&self) -> Option<&RequestBody> {
        self.request_body.as_ref()
    }

    /// Declared responses keyed by `"200"`, `"2XX"` or `"default"`.
    pub fn responses(&self) -> &IndexMap<String, Response> {
        &self.responses
    }

    /// Security requirements; any one of them must be met.
    pub fn security(&self) -> &[SecurityRequirement] {
        &self.security
    }

    /// Finds the response for a status: exact, then range, then `default`.
    pub fn response_for(&self, status: u16) -> Option<&Response> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);

        self.responses
            .get(&exact)
            .or_else(|| {
                self.responses
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&range))
                    .map(|(_, response)| response)
            })
            .or_else(|| self.responses.get("default"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Response {
        Response {
            headers: Vec::new(),
            content: Content::default(),
        }
    }

    fn operation(keys: &[&str]) -> Operation {
        Operation {
            id: "getItem".to_string(),
            method: Method::GET,
            path: "/items/{id}".to_string(),
            summary: None,
            tags: vec!["items".to_string()],
            deprecated: false,
            parameters: Vec::new(),
            request_body: None,
            responses: keys.iter().map(|k| ((*k).to_string(), response())).collect(),
            security: Vec::new(),
        }
    }

    #[test]
    fn test_response_lookup_exact_first() {
        let op = operation(&["2XX", "200", "default"]);
        let found = op.response_for(200).map(|r| r as *const Response);
        let exact = op.responses().get("200").map(|r| r as *const Response);
        assert_eq!(found, exact);
    }

    #[test]
    fn test_response_lookup_range() {
        let op = operation(&["200", "4xx"]);
        let found = op.response_for(404).map(|r| r as *const Response);
        let range = op.responses().get("4xx").map(|r| r as *const Response);
        assert_eq!(found, range);
    }

    #[test]
    fn test_response_lookup_default() {
        let op = operation(&["200", "default"]);
        assert!(op.response_for(500).is_some());
    }

    #[test]
    fn test_response_lookup_undeclared() {
        let op = operation(&["200"]);
        assert!(op.response_for(201).is_none());
    }

    #[test]
    fn test_accessors() {
        let op = operation(&["200"]);
        assert_eq!(op.id(), "getItem");
        assert_eq!(op.method(), Method::GET);
        assert_eq!(op.path(), "/items/{id}");
        assert_eq!(op.tags(), ["items".to_string()]);
        assert!(!op.is_deprecated());
        assert!(op.request_body().is_none());
    }
}
