//! Contract loading.
//!
//! [`ContractLoader`] turns document bytes into an immutable [`Contract`]:
//! parse, check the version, resolve references, compile every schema and
//! build the route table. Any problem is a [`ContractError`]; there is no
//! partially loaded contract.

use std::collections::HashSet;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::document::{
    Components, MediaTypeObject, OpenApiDocument, ParameterLocation, ParameterObject,
    SecurityRequirementObject, SecuritySchemeObject, Server,
};
use crate::error::{ContractError, ContractResult, ValidationError};
use crate::formats::FormatRegistry;
use crate::media::{Content, MediaType};
use crate::operation::{
    Operation, Parameter, RequestBody, Response, ResponseHeader, SecurityRequirement,
    SecurityScheme,
};
use crate::resolver::{RouteMatch, RouteResolver};
use crate::schema::{Dialect, SchemaCompiler, SchemaResolver};

/// Document metadata kept on the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInfo {
    /// API title.
    pub title: String,
    /// API version.
    pub version: String,
    /// OpenAPI version string, e.g. `3.0.3`.
    pub openapi: String,
}

/// Loads contracts.
#[derive(Debug, Clone, Default)]
pub struct ContractLoader {
    formats: FormatRegistry,
    base_path: Option<String>,
}

impl ContractLoader {
    /// Creates a loader with the default format registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a string format. Re-registering a name replaces it.
    pub fn with_format<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.formats.register(name, validator);
        self
    }

    /// Replaces the whole format registry.
    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    /// Overrides the base path taken from the document's `servers`.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Loads a contract from YAML or JSON bytes.
    pub fn load(&self, bytes: &[u8]) -> ContractResult<Contract> {
        let raw = crate::document::parse_raw(bytes)?;
        let doc = OpenApiDocument::from_value(&raw)?;
        let openapi = doc.checked_version()?.to_string();

        let dialect = if doc.is_3_1() {
            Dialect::OpenApi31
        } else {
            Dialect::OpenApi30
        };
        let builder = OperationBuilder {
            components: &doc.components,
            resolver: SchemaResolver::new(&raw, dialect),
            compiler: SchemaCompiler::new(dialect, self.formats.clone()),
            default_security: doc.security.as_deref(),
        };

        let mut operations = Vec::new();
        let mut seen_ids = HashSet::new();
        for (template, item) in &doc.paths {
            for (method, op) in item.operations() {
                let operation = builder.build(template, method, &item.parameters, op)?;
                if !seen_ids.insert(operation.id.clone()) {
                    return Err(ContractError::DuplicateOperationId(operation.id));
                }
                operations.push(Arc::new(operation));
            }
        }

        let base_paths = match &self.base_path {
            Some(base) => vec![normalize_base(base)],
            None => server_base_paths(&doc.servers),
        };
        let resolver = RouteResolver::new(&operations, base_paths)?;

        info!(
            title = %doc.info.title,
            version = %doc.info.version,
            openapi = %openapi,
            operations = operations.len(),
            formats = self.formats.len(),
            "contract loaded"
        );

        Ok(Contract {
            info: ContractInfo {
                title: doc.info.title.clone(),
                version: doc.info.version.clone(),
                openapi,
            },
            operations,
            resolver,
            formats: self.formats.clone(),
        })
    }
}

/// An immutable, loaded contract.
///
/// `Send + Sync`; share it with `Arc` across requests.
#[derive(Debug)]
pub struct Contract {
    info: ContractInfo,
    operations: Vec<Arc<Operation>>,
    resolver: RouteResolver,
    formats: FormatRegistry,
}

impl Contract {
    /// Loads a contract with the default loader.
    pub fn from_slice(bytes: &[u8]) -> ContractResult<Self> {
        ContractLoader::new().load(bytes)
    }

    /// Document metadata.
    pub fn info(&self) -> &ContractInfo {
        &self.info
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[Arc<Operation>] {
        &self.operations
    }

    /// Looks up an operation by id.
    pub fn operation(&self, id: &str) -> Option<&Arc<Operation>> {
        self.operations.iter().find(|op| op.id() == id)
    }

    /// Resolves a request to an operation.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, ValidationError> {
        self.resolver.resolve(method, path)
    }

    /// The route resolver.
    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    /// The format registry the schemas were compiled with.
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }
}

struct OperationBuilder<'a> {
    components: &'a Components,
    resolver: SchemaResolver<'a>,
    compiler: SchemaCompiler,
    default_security: Option<&'a [SecurityRequirementObject]>,
}

impl OperationBuilder<'_> {
    fn build(
        &self,
        template: &str,
        method: Method,
        shared: &[crate::document::RefOr<ParameterObject>],
        op: &crate::document::OperationObject,
    ) -> ContractResult<Operation> {
        let label = format!("{method} {template}");
        let id = op.operation_id.clone().unwrap_or_else(|| label.clone());

        // Operation-level parameters override path-level ones by (in, name).
        let mut merged: IndexMap<(ParameterLocation, String), &ParameterObject> = IndexMap::new();
        for item in shared.iter().chain(&op.parameters) {
            let param = self.components.parameter(item)?;
            let key = match param.location {
                ParameterLocation::Header => param.name.to_ascii_lowercase(),
                _ => param.name.clone(),
            };
            merged.insert((param.location, key), param);
        }

        let parameters = merged
            .values()
            .map(|param| self.parameter(&label, param))
            .collect::<ContractResult<Vec<_>>>()?;

        let request_body = match &op.request_body {
            Some(item) => {
                let body = self.components.request_body(item)?;
                Some(RequestBody {
                    required: body.required,
                    content: self.content(&format!("{label} request body"), &body.content)?,
                })
            }
            None => None,
        };

        let mut responses = IndexMap::with_capacity(op.responses.len());
        for (key, item) in &op.responses {
            let response = self.components.response(item)?;
            let location = format!("{label} response {key}");

            let mut headers = Vec::with_capacity(response.headers.len());
            for (name, header) in &response.headers {
                let header = self.components.header(header)?;
                headers.push(ResponseHeader {
                    name: name.clone(),
                    required: header.required,
                    schema: self.schema(&format!("{location} header {name}"), header.schema.as_ref())?,
                });
            }

            responses.insert(
                key.clone(),
                Response {
                    headers,
                    content: self.content(&location, &response.content)?,
                },
            );
        }

        let security = self.security(op.security.as_deref().or(self.default_security))?;

        debug!(operation_id = %id, route = %label, "operation compiled");

        Ok(Operation {
            id,
            method,
            path: template.to_string(),
            summary: op.summary.clone(),
            tags: op.tags.clone(),
            deprecated: op.deprecated,
            parameters,
            request_body,
            responses,
            security,
        })
    }

    fn parameter(&self, label: &str, param: &ParameterObject) -> ContractResult<Parameter> {
        let location = format!("{label} parameter {}", param.name);

        let (schema, json_content) = match (&param.schema, &param.content) {
            (Some(schema), _) => (self.schema(&location, Some(schema))?, false),
            (None, Some(content)) => {
                let (media, entry) = content.first().ok_or_else(|| ContractError::SchemaCompile {
                    location: location.clone(),
                    reason: "parameter content is empty".to_string(),
                })?;
                let json = crate::media::BodyKind::of(&crate::media::essence(media))
                    == crate::media::BodyKind::Json;
                (self.schema(&location, entry.schema.as_ref())?, json)
            }
            (None, None) => (None, false),
        };

        let style = param.style.as_deref().unwrap_or(match param.location {
            ParameterLocation::Query | ParameterLocation::Cookie => "form",
            ParameterLocation::Path | ParameterLocation::Header => "simple",
        });
        let explode = param.explode.unwrap_or(style == "form");

        Ok(Parameter {
            name: param.name.clone(),
            location: param.location,
            // Path parameters are always required.
            required: param.required || param.location == ParameterLocation::Path,
            explode,
            json_content,
            schema,
        })
    }

    fn content(
        &self,
        location: &str,
        content: &IndexMap<String, MediaTypeObject>,
    ) -> ContractResult<Content> {
        let mut compiled = Content::default();
        for (range, media) in content {
            compiled.insert(MediaType {
                range: crate::media::essence(range),
                schema: self.schema(&format!("{location} {range}"), media.schema.as_ref())?,
            });
        }
        Ok(compiled)
    }

    fn schema(
        &self,
        location: &str,
        schema: Option<&Value>,
    ) -> ContractResult<Option<crate::schema::CompiledSchema>> {
        let Some(schema) = schema else {
            return Ok(None);
        };
        let resolved = self.resolver.resolve(schema)?;
        self.compiler.compile(resolved, location).map(Some)
    }

    fn security(
        &self,
        requirements: Option<&[SecurityRequirementObject]>,
    ) -> ContractResult<Vec<SecurityRequirement>> {
        let Some(requirements) = requirements else {
            return Ok(Vec::new());
        };

        let mut compiled = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let mut schemes = Vec::with_capacity(requirement.len());
            for name in requirement.keys() {
                let scheme = match self.components.security_scheme(name)? {
                    SecuritySchemeObject::ApiKey { name, location } => SecurityScheme::ApiKey {
                        name: name.clone(),
                        location: *location,
                    },
                    SecuritySchemeObject::Http { scheme } => SecurityScheme::Http {
                        scheme: scheme.to_ascii_lowercase(),
                    },
                    SecuritySchemeObject::OAuth2 | SecuritySchemeObject::OpenIdConnect => {
                        SecurityScheme::BearerToken
                    }
                    SecuritySchemeObject::MutualTls => SecurityScheme::Unverifiable,
                };
                schemes.push((name.clone(), scheme));
            }
            compiled.push(SecurityRequirement { schemes });
        }

        // A single empty requirement object means "no security".
        if compiled.iter().any(|r| r.schemes.is_empty()) {
            return Ok(Vec::new());
        }
        Ok(compiled)
    }
}

/// Extracts URL path prefixes from the declared servers.
fn server_base_paths(servers: &[Server]) -> Vec<String> {
    servers
        .iter()
        .map(|server| {
            let mut url = server.url.clone();
            for (name, variable) in &server.variables {
                url = url.replace(&format!("{{{name}}}"), &variable.default);
            }
            let path = match url.split_once("://") {
                Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
                None => url.as_str(),
            };
            normalize_base(path)
        })
        .collect::<indexmap::IndexSet<_>>()
        .into_iter()
        .collect()
}

fn normalize_base(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
