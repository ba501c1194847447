//! Provider registry

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::ProviderName;
use crate::provider::Provider;

/// Explicit mapping from provider name to instance
///
/// Built once at startup and passed by reference to the aggregator.
/// Iteration order is by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderName, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name, replacing any previous one
    pub fn register(&mut self, provider: Arc<dyn Provider>) -> Option<Arc<dyn Provider>> {
        let name = provider.name();
        tracing::debug!(provider = %name, "registering provider");
        self.providers.insert(name, provider)
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Registered names
    pub fn names(&self) -> Vec<ProviderName> {
        self.providers.keys().cloned().collect()
    }

    /// All registered providers
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.values().cloned().collect()
    }

    /// Keep only the named providers
    ///
    /// Unknown names are logged and skipped.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut selected = Self::new();
        for name in names {
            match self.get(name.as_ref()) {
                Some(provider) => {
                    selected.register(provider);
                }
                None => tracing::warn!(provider = name.as_ref(), "unknown provider requested"),
            }
        }
        selected
    }

    /// Number of providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    fn named(name: &'static str) -> Arc<dyn Provider> {
        let mut mock = MockProvider::new();
        mock.expect_name().return_const(ProviderName::from(name));
        Arc::new(mock)
    }

    #[test]
    fn test_register_and_get() {
        let registry = ProviderRegistry::new().with(named("Github")).with(named("Color Sublime"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("Github").is_some());
        assert!(registry.get("Nope").is_none());
        assert_eq!(
            registry.names(),
            vec![ProviderName::from("Color Sublime"), ProviderName::from("Github")]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.register(named("Github")).is_none());
        assert!(registry.register(named("Github")).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_select() {
        let registry = ProviderRegistry::new()
            .with(named("Github"))
            .with(named("Package Control"))
            .with(named("tmTheme-editor"));

        let selected = registry.select(&["Github", "unknown", "tmTheme-editor"]);
        assert_eq!(selected.len(), 2);
        assert!(selected.get("Package Control").is_none());
        assert!(ProviderRegistry::new().is_empty());
    }
}
