use dashmap::DashMap;
use nutpress_api::cache::{CacheEntry, CacheKey, CacheProvider};
use nutpress_api::error::{PipelineError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-process cache store. Entries live until the heap they were produced
/// from turns dirty, or until the optional TTL elapses.
pub struct MemoryCacheProvider {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Option<Duration>,
}

impl MemoryCacheProvider {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

impl Default for MemoryCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for MemoryCacheProvider {
    fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?.clone();

        if let Some(ttl) = self.ttl {
            let expired = entry
                .created_at
                .elapsed()
                .map(|age| age > ttl)
                .unwrap_or(false);
            if expired {
                drop(self.entries.remove(key));
                return None;
            }
        }

        Some(entry)
    }

    fn store(&self, key: CacheKey, entry: CacheEntry) {
        // Last write wins; content is idempotent for a given key.
        self.entries.insert(key, entry);
    }

    fn invalidate_heap(&self, heap_id: &str) {
        self.entries.retain(|key, _| key.heap_id != heap_id);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Factory producing a fresh provider instance.
pub type ProviderFactory = Box<dyn Fn() -> Arc<dyn CacheProvider> + Send + Sync>;

/// Explicit factory-registration table mapping a provider id to its factory,
/// resolved at configuration time. A configuration-time dependency, not a
/// runtime singleton.
pub struct CacheProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl CacheProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `"memory"` provider registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", Box::new(|| Arc::new(MemoryCacheProvider::new())));
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, factory: ProviderFactory) {
        self.factories.insert(id.into(), factory);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Instantiates the provider registered under `id`. An unknown id is a
    /// fatal configuration error.
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn CacheProvider>> {
        let factory = self.factories.get(id).ok_or_else(|| {
            PipelineError::Configuration(format!("unknown cache provider '{id}'"))
        })?;
        Ok(factory())
    }
}

impl Default for CacheProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
