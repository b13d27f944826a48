use std::sync::Arc;

use tracing::warn;

use super::SourceAdapter;

/// Registered adapters in registration order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any adapter with the same name in place.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        match self.adapters.iter().position(|a| a.name() == adapter.name()) {
            Some(slot) => self.adapters[slot] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn with(mut self, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn all(&self) -> &[Arc<dyn SourceAdapter>] {
        &self.adapters
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Adapters named in `subset`, in registration order, or all of them
    /// when no subset is given. Unknown names are skipped.
    pub fn select(&self, subset: Option<&[String]>) -> Vec<Arc<dyn SourceAdapter>> {
        let Some(names) = subset else {
            return self.adapters.clone();
        };

        for name in names {
            if self.get(name).is_none() {
                warn!("Ignoring unknown adapter '{}'", name);
            }
        }

        self.adapters
            .iter()
            .filter(|a| names.iter().any(|n| n == a.name()))
            .cloned()
            .collect()
    }
}
