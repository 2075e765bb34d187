//! Route resolution from HTTP requests.
//!
//! This module provides the [`RouteResolver`] which maps an incoming request
//! (method + path) to a declared [`Operation`]. Templates are tried in
//! contract declaration order and the first one that matches both the path
//! and the method wins.

use std::sync::Arc;

use http::Method;
use regex::Regex;
use tracing::debug;

use crate::error::{ContractError, ContractResult, ValidationError};
use crate::operation::Operation;
use crate::params::PathParameters;

/// Result of resolving a request to an operation.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched operation.
    pub operation: Arc<Operation>,
    /// Extracted, percent-decoded path parameters.
    pub path_params: PathParameters,
}

/// A compiled path template and the operations declared on it.
#[derive(Debug)]
struct CompiledRoute {
    template: String,
    pattern: Regex,
    param_names: Vec<String>,
    operations: Vec<Arc<Operation>>,
}

/// Resolves requests to operations.
#[derive(Debug)]
pub struct RouteResolver {
    routes: Vec<CompiledRoute>,
    base_paths: Vec<String>,
}

impl RouteResolver {
    /// Builds a resolver from operations in declaration order.
    ///
    /// `base_paths` are prefixes stripped before matching; an empty string
    /// means the document root.
    pub fn new(operations: &[Arc<Operation>], base_paths: Vec<String>) -> ContractResult<Self> {
        let mut routes: Vec<CompiledRoute> = Vec::new();

        for op in operations {
            if let Some(route) = routes.iter_mut().find(|r| r.template == op.path()) {
                route.operations.push(Arc::clone(op));
                continue;
            }

            let (pattern, param_names) = compile_template(op.path())?;
            routes.push(CompiledRoute {
                template: op.path().to_string(),
                pattern,
                param_names,
                operations: vec![Arc::clone(op)],
            });
        }

        let base_paths = if base_paths.is_empty() {
            vec![String::new()]
        } else {
            base_paths
        };

        debug!(
            templates = routes.len(),
            operations = operations.len(),
            base_paths = ?base_paths,
            "route resolver initialized"
        );

        Ok(Self { routes, base_paths })
    }

    /// Resolves a request to an operation.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, ValidationError> {
        let mut path_matched = false;

        for base in &self.base_paths {
            let Some(relative) = strip_base(base, path) else {
                continue;
            };

            for route in &self.routes {
                let Some(captures) = route.pattern.captures(relative) else {
                    continue;
                };
                path_matched = true;

                let Some(operation) = route.operations.iter().find(|op| op.method() == method)
                else {
                    continue;
                };

                let mut path_params = PathParameters::with_capacity(route.param_names.len());
                for (i, name) in route.param_names.iter().enumerate() {
                    if let Some(value) = captures.get(i + 1) {
                        path_params.insert(name.clone(), percent_decode(value.as_str()));
                    }
                }

                return Ok(RouteMatch {
                    operation: Arc::clone(operation),
                    path_params,
                });
            }
        }

        if path_matched {
            Err(ValidationError::MethodNotAllowed {
                method: method.to_string(),
                path: path.to_string(),
            })
        } else {
            Err(ValidationError::RouteNotFound {
                method: method.to_string(),
                path: path.to_string(),
            })
        }
    }

    /// Returns the declared templates in order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.template.as_str())
    }

    /// Returns the methods declared for a template.
    pub fn methods_for(&self, template: &str) -> Vec<&Method> {
        self.routes
            .iter()
            .find(|r| r.template == template)
            .map(|r| r.operations.iter().map(|op| op.method()).collect())
            .unwrap_or_default()
    }
}

fn strip_base<'p>(base: &str, path: &'p str) -> Option<&'p str> {
    if base.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(base) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
}

/// Compiles a template into an anchored regex.
///
/// Each `{name}` becomes a non-empty, slash-free capture; everything else is
/// matched literally. A segment may mix literals and parameters, as in
/// `/files/{name}.json`.
fn compile_template(template: &str) -> ContractResult<(Regex, Vec<String>)> {
    let invalid = |reason: &str| ContractError::InvalidPath {
        template: template.to_string(),
        reason: reason.to_string(),
    };

    if !template.starts_with('/') {
        return Err(invalid("template must start with '/'"));
    }

    let mut pattern = String::from("^");
    let mut param_names = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        match rest.find(['{', '}']) {
            None => {
                pattern.push_str(&regex::escape(rest));
                rest = "";
            }
            Some(open) if rest.as_bytes()[open] == b'{' => {
                pattern.push_str(&regex::escape(&rest[..open]));
                let after = &rest[open + 1..];
                let close = after.find('}').ok_or_else(|| invalid("unbalanced braces"))?;
                let name = &after[..close];
                if name.is_empty() || name.contains(['{', '/']) {
                    return Err(invalid("invalid parameter name"));
                }
                if param_names.iter().any(|n| n == name) {
                    return Err(invalid("duplicate parameter name"));
                }
                param_names.push(name.to_string());
                pattern.push_str("([^/]+)");
                rest = &after[close + 1..];
            }
            Some(_) => return Err(invalid("unbalanced braces")),
        }
    }
    pattern.push('$');

    let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
    Ok((regex, param_names))
}
