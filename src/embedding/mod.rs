//! Embedding providers and the backend registry
//!
//! The registry is an explicit value constructed once at process start and
//! passed by reference, not a hidden module-global. Resolving an unknown
//! backend name is a misconfiguration and fails fast.

mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

use crate::error::{HindsightError, Result};
use std::collections::HashMap;
use std::sync::Arc;

type ProviderFactory = Box<dyn Fn(&str) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Explicit factory for embedding backends, keyed by backend name.
pub struct EmbedderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl EmbedderRegistry {
    /// Empty registry; use [`EmbedderRegistry::with_defaults`] for the
    /// standard backends.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `fastembed` backend registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("fastembed", |model| {
            let provider = FastEmbedProvider::new(model)
                .map_err(|e| HindsightError::Embedding(e.to_string()))?;
            Ok(Arc::new(provider) as Arc<dyn EmbeddingProvider>)
        });
        registry
    }

    /// Register a backend under `name`. The factory receives the configured
    /// model name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&str) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Construct the provider for a backend name.
    ///
    /// Unknown names return [`HindsightError::UnknownBackend`] immediately:
    /// this indicates misconfiguration, not transient data absence.
    pub fn get(&self, backend: &str, model: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.factories.get(backend) {
            Some(factory) => factory(model),
            None => Err(HindsightError::UnknownBackend {
                kind: "embedder".to_string(),
                name: backend.to_string(),
            }),
        }
    }

    /// Registered backend names, for diagnostics.
    pub fn backends(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for EmbedderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProvider;

    impl EmbeddingProvider for NoopProvider {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.0; 4])
        }

        fn embed_batch(
            &self,
            texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_name(&self) -> &str {
            "noop"
        }
    }

    #[test]
    fn test_unknown_backend_fails_fast() {
        let registry = EmbedderRegistry::new();
        let err = registry.get("nonexistent", "model").unwrap_err();
        assert!(matches!(err, HindsightError::UnknownBackend { .. }));
    }

    #[test]
    fn test_registered_backend_resolves() {
        let mut registry = EmbedderRegistry::new();
        registry.register("noop", |_| Ok(Arc::new(NoopProvider)));

        let provider = registry.get("noop", "anything").unwrap();
        assert_eq!(provider.dimension(), 4);
        assert!(registry.backends().contains(&"noop"));
    }
}
