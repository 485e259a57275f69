//! Provider registry: an explicit map from provider identifier to
//! implementation.
//!
//! The application registers every backend it can construct and then
//! resolves the configured identifier. An identifier with no registered
//! implementation resolves to [`CoreError::NotConfigured`].
//!
//! ```rust
//! use std::sync::Arc;
//! use bugreport_harness_core::registry::ProviderRegistry;
//!
//! let mut names: ProviderRegistry<str> = ProviderRegistry::new();
//! names.register("openai", Arc::from("OpenAI"));
//! assert_eq!(&*names.resolve("openai").unwrap(), "OpenAI");
//! assert!(names.resolve("vertex").is_err());
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// Registry of shared provider instances keyed by identifier.
pub struct ProviderRegistry<P: ?Sized> {
    providers: BTreeMap<String, Arc<P>>,
}

impl<P: ?Sized> ProviderRegistry<P> {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Register (or replace) the implementation for `id`.
    pub fn register(&mut self, id: impl Into<String>, provider: Arc<P>) {
        self.providers.insert(id.into(), provider);
    }

    /// Look up the implementation for `id`.
    pub fn resolve(&self, id: &str) -> Result<Arc<P>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotConfigured {
                provider: id.to_string(),
            })
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<P: ?Sized> Default for ProviderRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}
