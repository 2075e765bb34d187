//! Custom string formats for schema validation.
//!
//! Every [`ContractLoader`](crate::ContractLoader) owns its own registry; there
//! is no process-wide format table, so independently loaded contracts never
//! see each other's registrations.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

/// A format predicate: returns `true` when the string is valid.
pub type FormatFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Named string format validators.
#[derive(Clone)]
pub struct FormatRegistry {
    formats: IndexMap<String, FormatFn>,
}

impl FormatRegistry {
    /// Creates an empty registry with no formats at all.
    pub fn empty() -> Self {
        Self {
            formats: IndexMap::new(),
        }
    }

    /// Registers a format. Registering an existing name replaces it.
    pub fn register<F>(&mut self, name: impl Into<String>, validator: F) -> &mut Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.formats.insert(name.into(), Arc::new(validator));
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.register(name, validator);
        self
    }

    /// Returns true if a format with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    /// Checks a value against a named format. Unknown formats pass.
    pub fn check(&self, name: &str, value: &str) -> bool {
        self.formats.get(name).is_none_or(|f| f(value))
    }

    /// Iterates over registered formats.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormatFn)> {
        self.formats.iter().map(|(name, f)| (name.as_str(), f))
    }

    /// Number of registered formats.
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Returns true if no formats are registered.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for FormatRegistry {
    /// The default registry knows `uuid`.
    fn default() -> Self {
        Self::empty().with("uuid", is_uuid)
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Hyphenated UUID check (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
pub fn is_uuid(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::try_parse(value).is_ok()
}
