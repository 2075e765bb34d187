//! Schema resolution and compilation.
//!
//! OpenAPI schemas are plain JSON Schema with a few dialect quirks. Before a
//! schema is handed to `jsonschema` every local `$ref` is inlined and the
//! OpenAPI 3.0 `nullable` keyword is rewritten into an `anyOf`. The compiled
//! validator is wrapped in [`CompiledSchema`], the only place engine errors
//! are translated into [`FieldError`]s.

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, Validator};
use serde_json::{Map, Value};

use crate::error::{ContractError, ContractResult, FieldError};
use crate::formats::FormatRegistry;

/// Maximum `$ref` nesting before a schema is replaced by `{}`.
pub const MAX_REF_DEPTH: usize = 64;

/// Keywords whose values are data, not subschemas.
const DATA_KEYWORDS: &[&str] = &["example", "examples", "enum", "const", "default"];

/// Schema dialect used when compiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// OpenAPI 3.0 (JSON Schema draft 4 semantics, `nullable` keyword).
    OpenApi30,
    /// OpenAPI 3.1 (JSON Schema 2020-12).
    OpenApi31,
}

impl Dialect {
    fn draft(self) -> Draft {
        match self {
            Self::OpenApi30 => Draft::Draft4,
            Self::OpenApi31 => Draft::Draft202012,
        }
    }
}

/// Inlines local references and normalises a schema.
pub struct SchemaResolver<'a> {
    root: &'a Value,
    dialect: Dialect,
}

impl<'a> SchemaResolver<'a> {
    /// Creates a resolver over the raw document.
    pub fn new(root: &'a Value, dialect: Dialect) -> Self {
        Self { root, dialect }
    }

    /// Returns a self-contained copy of `schema`.
    pub fn resolve(&self, schema: &Value) -> ContractResult<Value> {
        let mut visiting = Vec::new();
        self.resolve_inner(schema, 0, &mut visiting)
    }

    fn resolve_inner(
        &self,
        schema: &Value,
        depth: usize,
        visiting: &mut Vec<String>,
    ) -> ContractResult<Value> {
        match schema {
            Value::Object(object) => {
                if let Some(Value::String(reference)) = object.get("$ref") {
                    return self.resolve_ref(reference, depth, visiting);
                }

                let mut resolved = Map::with_capacity(object.len());
                for (key, value) in object {
                    let value = if DATA_KEYWORDS.contains(&key.as_str()) {
                        value.clone()
                    } else {
                        self.resolve_inner(value, depth, visiting)?
                    };
                    resolved.insert(key.clone(), value);
                }

                if self.dialect == Dialect::OpenApi30 {
                    return Ok(rewrite_nullable(resolved));
                }
                Ok(Value::Object(resolved))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_inner(item, depth, visiting))
                .collect::<ContractResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_ref(
        &self,
        reference: &str,
        depth: usize,
        visiting: &mut Vec<String>,
    ) -> ContractResult<Value> {
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| ContractError::UnresolvedReference {
                reference: reference.to_string(),
            })?;

        // Circular or too deep: accept anything below this point.
        if depth >= MAX_REF_DEPTH || visiting.iter().any(|r| r == reference) {
            return Ok(Value::Object(Map::new()));
        }

        let target = self
            .root
            .pointer(pointer)
            .ok_or_else(|| ContractError::UnresolvedReference {
                reference: reference.to_string(),
            })?;

        visiting.push(reference.to_string());
        let resolved = self.resolve_inner(target, depth + 1, visiting);
        visiting.pop();
        resolved
    }
}

/// `nullable: true` becomes `anyOf: [schema, {type: null}]`.
fn rewrite_nullable(mut object: Map<String, Value>) -> Value {
    match object.remove("nullable") {
        Some(Value::Bool(true)) => {
            let mut null = Map::new();
            null.insert("type".to_string(), Value::String("null".to_string()));
            let mut wrapper = Map::new();
            wrapper.insert(
                "anyOf".to_string(),
                Value::Array(vec![Value::Object(object), Value::Object(null)]),
            );
            Value::Object(wrapper)
        }
        _ => Value::Object(object),
    }
}

/// Compiles schemas with a fixed dialect and format registry.
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    dialect: Dialect,
    formats: FormatRegistry,
}

impl SchemaCompiler {
    /// Creates a compiler.
    pub fn new(dialect: Dialect, formats: FormatRegistry) -> Self {
        Self { dialect, formats }
    }

    /// Returns the dialect.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Compiles an already-resolved schema.
    ///
    /// `location` only feeds error messages.
    pub fn compile(&self, schema: Value, location: &str) -> ContractResult<CompiledSchema> {
        let mut options = jsonschema::options()
            .with_draft(self.dialect.draft())
            .should_validate_formats(true);

        for (name, format) in self.formats.iter() {
            let format = Arc::clone(format);
            options = options.with_format(name.to_string(), move |value: &str| format(value));
        }

        let validator = options
            .build(&schema)
            .map_err(|e| ContractError::SchemaCompile {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CompiledSchema {
            inner: Arc::new(Inner { schema, validator }),
        })
    }
}

struct Inner {
    schema: Value,
    validator: Validator,
}

/// A schema compiled once at load time.
///
/// Cheap to clone; clones share the compiled validator.
#[derive(Clone)]
pub struct CompiledSchema {
    inner: Arc<Inner>,
}

impl CompiledSchema {
    /// The resolved schema document.
    pub fn schema(&self) -> &Value {
        &self.inner.schema
    }

    /// Returns true if the value conforms.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.inner.validator.is_valid(value)
    }

    /// Validates a value, collecting every field-level failure.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .inner
            .validator
            .iter_errors(value)
            .map(|err| FieldError {
                path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The primary JSON type declared by the schema, looking through the
    /// `anyOf` produced for nullable schemas.
    pub fn primary_type(&self) -> Option<&str> {
        primary_type(self.schema())
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.inner.schema)
            .finish_non_exhaustive()
    }
}

/// Returns the first non-null `type` of a resolved schema.
pub fn primary_type(schema: &Value) -> Option<&str> {
    match schema.get("type") {
        Some(Value::String(ty)) => return Some(ty.as_str()),
        Some(Value::Array(types)) => {
            if let Some(ty) = types.iter().filter_map(Value::as_str).find(|t| *t != "null") {
                return Some(ty);
            }
        }
        _ => {}
    }

    ["anyOf", "oneOf", "allOf"]
        .iter()
        .filter_map(|key| schema.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(primary_type)
}

/// Returns the subschema for array items, if declared.
pub fn items_schema(schema: &Value) -> Option<&Value> {
    if let Some(items) = schema.get("items") {
        return Some(items);
    }
    ["anyOf", "oneOf", "allOf"]
        .iter()
        .filter_map(|key| schema.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(items_schema)
}

/// Returns the subschema for an object property, if declared.
pub fn property_schema<'s>(schema: &'s Value, name: &str) -> Option<&'s Value> {
    if let Some(property) = schema.get("properties").and_then(|p| p.get(name)) {
        return Some(property);
    }
    ["anyOf", "oneOf", "allOf"]
        .iter()
        .filter_map(|key| schema.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(|sub| property_schema(sub, name))
}
