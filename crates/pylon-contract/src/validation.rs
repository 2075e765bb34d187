//! Request and response validation against compiled operations.
//!
//! [`RequestValidator`] checks parameters, security and the request body in
//! that order and stops at the first failure. [`ResponseValidator`] checks
//! the status, declared headers and body of a captured response. Both only
//! ever return [`ValidationError`]s; schema engine errors are translated
//! into causes here.

use std::sync::Arc;

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method, Uri};
use tracing::debug;

use crate::config::ValidationConfig;
use crate::error::{FieldError, SchemaViolation, ValidationError, ViolationLocation};
use crate::media;
use crate::operation::{Operation, Parameter, SecurityRequirement, SecurityScheme};
use crate::params::{self, Extracted, ParameterSource, PathParameters};
use crate::resolver::RouteMatch;
use crate::schema::CompiledSchema;

/// Cause used when no security requirement is satisfied.
pub const SECURITY_FAILED: &str = "security requirements failed";

/// Everything known about a request once it has been resolved.
///
/// Built before request validation and reused by the response side.
#[derive(Debug, Clone)]
pub struct RequestValidationInput {
    /// The resolved operation.
    pub operation: Arc<Operation>,
    /// Path parameters extracted by the resolver.
    pub path_params: PathParameters,
    /// Request method.
    pub method: Method,
    /// Request URI.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestValidationInput {
    /// Builds the input from a route match and the request head.
    pub fn new(route: RouteMatch, parts: &http::request::Parts) -> Self {
        Self {
            operation: route.operation,
            path_params: route.path_params,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// The resolved operation id.
    pub fn operation_id(&self) -> &str {
        self.operation.id()
    }
}

/// Validates requests against their operation.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    skip_security: bool,
}

impl RequestValidator {
    /// Creates a validator honouring the security switch in `config`.
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            skip_security: !config.validate_security,
        }
    }

    /// Validates parameters, then security, then the body.
    pub fn validate(
        &self,
        input: &RequestValidationInput,
        body: &[u8],
    ) -> Result<(), ValidationError> {
        let query = params::query_pairs(input.uri.query());
        let cookies = params::cookies(&input.headers);
        let source = ParameterSource {
            path: &input.path_params,
            query: &query,
            headers: &input.headers,
            cookies: &cookies,
        };

        for param in input.operation.parameters() {
            validate_parameter(&source, param)?;
        }

        if !self.skip_security {
            validate_security(&source, input.operation.security())?;
        }

        validate_request_body(input, body)?;

        debug!(operation_id = input.operation_id(), "request conforms to contract");
        Ok(())
    }
}

fn parameter_violation(param: &Parameter, detail: impl std::fmt::Display) -> SchemaViolation {
    SchemaViolation::new(
        ViolationLocation::Parameter {
            location: param.location,
            name: param.name.clone(),
        },
        format!(
            "parameter \"{}\" in {} has an error: {}",
            param.name, param.location, detail
        ),
        400,
    )
}

fn validate_parameter(source: &ParameterSource<'_>, param: &Parameter) -> Result<(), ValidationError> {
    let value = match source.extract(param) {
        Extracted::Missing if param.required => {
            return Err(parameter_violation(param, "value is required but missing").into())
        }
        Extracted::Missing => return Ok(()),
        Extracted::Undecodable(reason) => return Err(parameter_violation(param, reason).into()),
        Extracted::Value(value) => value,
    };

    if let Some(schema) = &param.schema {
        check_schema(schema, &value).map_err(|errors| {
            parameter_violation(param, &errors[0]).with_errors(errors)
        })?;
    }
    Ok(())
}

fn validate_security(
    source: &ParameterSource<'_>,
    requirements: &[SecurityRequirement],
) -> Result<(), ValidationError> {
    if requirements.is_empty() {
        return Ok(());
    }

    let satisfied = requirements.iter().any(|requirement| {
        requirement
            .schemes
            .iter()
            .all(|(_, scheme)| scheme_satisfied(source, scheme))
    });

    if satisfied {
        Ok(())
    } else {
        Err(SchemaViolation::new(ViolationLocation::Security, SECURITY_FAILED, 401).into())
    }
}

fn scheme_satisfied(source: &ParameterSource<'_>, scheme: &SecurityScheme) -> bool {
    use crate::document::ParameterLocation;

    match scheme {
        SecurityScheme::ApiKey { name, location } => match location {
            ParameterLocation::Header => source.headers.contains_key(name.as_str()),
            ParameterLocation::Query => source.query.iter().any(|(key, _)| key == name),
            ParameterLocation::Cookie => source.cookies.contains_key(name),
            ParameterLocation::Path => false,
        },
        SecurityScheme::Http { scheme } => authorization_matches(source.headers, scheme),
        SecurityScheme::BearerToken => authorization_matches(source.headers, "bearer"),
        SecurityScheme::Unverifiable => true,
    }
}

fn authorization_matches(headers: &HeaderMap, scheme: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().split_once(' '))
        .is_some_and(|(given, credentials)| {
            given.eq_ignore_ascii_case(scheme) && !credentials.trim().is_empty()
        })
}

fn request_body_violation(detail: impl std::fmt::Display, status: u16) -> SchemaViolation {
    SchemaViolation::new(
        ViolationLocation::RequestBody,
        format!("request body has an error: {detail}"),
        status,
    )
}

fn validate_request_body(input: &RequestValidationInput, body: &[u8]) -> Result<(), ValidationError> {
    let Some(request_body) = input.operation.request_body() else {
        return Ok(());
    };

    if body.is_empty() {
        if request_body.required {
            return Err(request_body_violation("value is required but missing", 400).into());
        }
        return Ok(());
    }

    if request_body.content.is_empty() {
        return Ok(());
    }

    let content_type = header_str(&input.headers, CONTENT_TYPE);
    let Some(media_type) = request_body.content.find(content_type) else {
        return Err(SchemaViolation::new(
            ViolationLocation::RequestBody,
            format!("header Content-Type has unexpected value: {content_type:?}"),
            415,
        )
        .into());
    };

    let decoded = media::decode_body(content_type, body, media_type.schema.as_ref()).map_err(
        |reason| request_body_violation(format!("failed to decode request body: {reason}"), 400),
    )?;

    if let (Some(value), Some(schema)) = (decoded, &media_type.schema) {
        check_schema(schema, &value).map_err(|errors| {
            request_body_violation(format!("doesn't match schema: {}", errors[0]), 400)
                .with_errors(errors)
        })?;
    }
    Ok(())
}

fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn check_schema(schema: &CompiledSchema, value: &serde_json::Value) -> Result<(), Vec<FieldError>> {
    schema.validate(value)
}

/// What was observed on the way out.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidationInput<'a> {
    /// Response status.
    pub status: u16,
    /// Response headers.
    pub headers: &'a HeaderMap,
    /// Captured body; `None` when nothing was written.
    pub body: Option<&'a [u8]>,
    /// Whether the capture limit was exceeded, so the body is incomplete.
    pub truncated: bool,
}

/// Validates responses against their operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    /// Creates a response validator.
    pub fn new() -> Self {
        Self
    }

    /// Validates status, declared headers and body.
    ///
    /// A truncated body is not validated; status and headers still are.
    pub fn validate(
        &self,
        request: &RequestValidationInput,
        response: &ResponseValidationInput<'_>,
    ) -> Result<(), ValidationError> {
        let Some(declared) = request.operation.response_for(response.status) else {
            return Err(SchemaViolation::unstatused(
                ViolationLocation::ResponseStatus,
                format!(
                    "status code {} is not declared for this operation",
                    response.status
                ),
            )
            .into());
        };

        for header in &declared.headers {
            if header.name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            let location = || ViolationLocation::ResponseHeader {
                name: header.name.clone(),
            };

            let Some(raw) = response.headers.get(header.name.as_str()) else {
                if header.required {
                    return Err(SchemaViolation::unstatused(
                        location(),
                        format!("response header \"{}\" missing", header.name),
                    )
                    .into());
                }
                continue;
            };

            if let Some(schema) = &header.schema {
                let value = params::coerce(raw.to_str().unwrap_or_default(), Some(schema.schema()));
                check_schema(schema, &value).map_err(|errors| {
                    SchemaViolation::unstatused(
                        location(),
                        format!(
                            "response header \"{}\" doesn't match schema: {}",
                            header.name, errors[0]
                        ),
                    )
                    .with_errors(errors)
                })?;
            }
        }

        if declared.content.is_empty() {
            return Ok(());
        }

        let content_type = header_str(response.headers, CONTENT_TYPE);
        let Some(media_type) = declared.content.find(content_type) else {
            return Err(SchemaViolation::unstatused(
                ViolationLocation::ResponseBody,
                format!("response header Content-Type has unexpected value: {content_type:?}"),
            )
            .into());
        };

        if response.truncated {
            return Ok(());
        }

        let body = match response.body {
            Some(body) if !body.is_empty() => body,
            _ => {
                return Err(SchemaViolation::unstatused(
                    ViolationLocation::ResponseBody,
                    "response body is missing",
                )
                .into())
            }
        };

        let decoded = media::decode_body(content_type, body, media_type.schema.as_ref()).map_err(
            |reason| {
                SchemaViolation::unstatused(
                    ViolationLocation::ResponseBody,
                    format!("failed to decode response body: {reason}"),
                )
            },
        )?;

        if let (Some(value), Some(schema)) = (decoded, &media_type.schema) {
            check_schema(schema, &value).map_err(|errors| {
                SchemaViolation::unstatused(
                    ViolationLocation::ResponseBody,
                    format!("response body doesn't match schema: {}", errors[0]),
                )
                .with_errors(errors)
            })?;
        }

        debug!(
            operation_id = request.operation_id(),
            status = response.status,
            "response conforms to contract"
        );
        Ok(())
    }
}
