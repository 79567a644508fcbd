use nutpress_api::dao::NutDao;
use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::VersionNumber;
use nutpress_api::nut::NutRef;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use crate::filter::FilterChain;
use crate::nut::combine_versions;

/// Notified when a heap's resolved set changed (or a composed sub-heap's
/// did). Used by the cache layer to drop entries keyed on the heap.
pub trait HeapListener: Send + Sync {
    fn heap_dirty(&self, heap_id: &str);
}

struct HeapSource {
    dao: Arc<dyn NutDao>,
    patterns: Vec<String>,
}

/// One fully resolved nut set with its combined version. Replaced as a whole
/// on refresh, so concurrent readers see either the old or the new set,
/// never a mix.
struct ResolvedSet {
    nuts: Vec<NutRef>,
    version: VersionNumber,
}

/// A named, versioned aggregate of nuts produced by one or more DAOs plus
/// filters, optionally composed from other heaps.
pub struct Heap {
    id: String,
    sources: Vec<HeapSource>,
    filters: FilterChain,
    composition: Vec<Arc<Heap>>,
    state: RwLock<Option<Arc<ResolvedSet>>>,
    listeners: Mutex<Vec<Arc<dyn HeapListener>>>,
}

impl Heap {
    pub fn builder(id: impl Into<String>) -> HeapBuilder {
        HeapBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The resolved nuts, in DAO-declaration order followed by composition
    /// order. Resolves lazily and memoizes until the heap turns dirty.
    pub async fn nuts(&self) -> Result<Vec<NutRef>> {
        Ok(self.ensure_resolved().await?.nuts.clone())
    }

    /// Order-sensitive combination of all member versions.
    pub async fn version(&self) -> Result<VersionNumber> {
        Ok(self.ensure_resolved().await?.version)
    }

    /// The nuts together with the version they were resolved under, taken
    /// from one resolved set. Callers pairing content with a version must
    /// use this instead of separate `nuts`/`version` calls, which may
    /// straddle a refresh.
    pub async fn snapshot(&self) -> Result<(Vec<NutRef>, VersionNumber)> {
        let set = self.ensure_resolved().await?;
        Ok((set.nuts.clone(), set.version))
    }

    /// Type-erased resolution used when flattening a composed parent; the
    /// declared `Send` bound keeps the recursive future finite.
    fn nuts_boxed(&self) -> Pin<Box<dyn Future<Output = Result<Vec<NutRef>>> + Send + '_>> {
        Box::pin(self.nuts())
    }

    /// Smallest non-zero polling interval among this heap's DAOs and its
    /// composition, `None` when nothing polls.
    pub fn polling_interval(&self) -> Option<Duration> {
        let own = self.sources.iter().filter_map(|s| s.dao.polling_interval());
        let composed = self.composition.iter().filter_map(|h| h.polling_interval());
        own.chain(composed).min()
    }

    pub fn observe(&self, listener: Arc<dyn HeapListener>) {
        self.listeners
            .lock()
            .expect("heap listeners lock poisoned")
            .push(listener);
    }

    /// Re-resolves through the DAOs and compares combined versions. On a
    /// change the whole resolved set is swapped atomically and observers are
    /// notified. Returns whether anything changed.
    pub async fn check_for_updates(&self) -> Result<bool> {
        let fresh = self.resolve().await?;

        let changed = {
            let mut state = self.state.write().expect("heap state lock poisoned");
            match state.as_ref() {
                Some(current) if current.version == fresh.version => false,
                _ => {
                    *state = Some(fresh);
                    true
                }
            }
        };

        if changed {
            tracing::info!(heap = %self.id, "heap content changed");
            self.notify_dirty();
        }

        Ok(changed)
    }

    /// Drops the memoized set so the next read re-resolves, and tells
    /// observers. Called when a composed sub-heap turns dirty.
    fn invalidate(&self) {
        self.state
            .write()
            .expect("heap state lock poisoned")
            .take();
        self.notify_dirty();
    }

    fn notify_dirty(&self) {
        let listeners = self
            .listeners
            .lock()
            .expect("heap listeners lock poisoned")
            .clone();
        for listener in listeners {
            listener.heap_dirty(&self.id);
        }
    }

    async fn ensure_resolved(&self) -> Result<Arc<ResolvedSet>> {
        if let Some(current) = self
            .state
            .read()
            .expect("heap state lock poisoned")
            .clone()
        {
            return Ok(current);
        }

        let resolved = self.resolve().await?;

        let mut state = self.state.write().expect("heap state lock poisoned");
        match state.as_ref() {
            // Another resolver won the race; keep its set.
            Some(current) => Ok(current.clone()),
            None => {
                *state = Some(resolved.clone());
                Ok(resolved)
            }
        }
    }

    async fn resolve(&self) -> Result<Arc<ResolvedSet>> {
        let mut nuts: Vec<NutRef> = Vec::new();

        for source in &self.sources {
            let patterns = self.filters.apply(source.patterns.clone());
            for pattern in patterns {
                let resolved = source.dao.create(&pattern).await?;
                if resolved.is_empty() {
                    return Err(PipelineError::Resolution { pattern });
                }
                nuts.extend(resolved);
            }
        }

        // Flatten the composition without duplicating a sub-heap listed twice.
        let mut seen = HashSet::new();
        for sub in &self.composition {
            if seen.insert(sub.id.clone()) {
                nuts.extend(sub.nuts_boxed().await?);
            }
        }

        // Duplicate names are a caller configuration error, never merged.
        let mut names = HashSet::new();
        for nut in &nuts {
            if !names.insert(nut.name().to_string()) {
                return Err(PipelineError::Configuration(format!(
                    "duplicate nut name '{}' in heap '{}'",
                    nut.name(),
                    self.id
                )));
            }
        }

        let version = combine_versions(&nuts);
        Ok(Arc::new(ResolvedSet { nuts, version }))
    }
}

/// Forwards a sub-heap's dirty notification to the composed parent.
struct CompositionForwarder {
    parent: Weak<Heap>,
}

impl HeapListener for CompositionForwarder {
    fn heap_dirty(&self, _sub_heap_id: &str) {
        if let Some(parent) = self.parent.upgrade() {
            parent.invalidate();
        }
    }
}

pub struct HeapBuilder {
    id: String,
    sources: Vec<HeapSource>,
    filters: FilterChain,
    composition: Vec<Arc<Heap>>,
}

impl HeapBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sources: Vec::new(),
            filters: FilterChain::default(),
            composition: Vec::new(),
        }
    }

    /// Declares a DAO with its path patterns. Sources resolve in declaration
    /// order. Patterns are regexes and are validated at build time.
    pub fn source<I, S>(mut self, dao: Arc<dyn NutDao>, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources.push(HeapSource {
            dao,
            patterns: patterns.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn filter(mut self, filter: Arc<dyn nutpress_api::filter::NutFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn compose(mut self, heap: Arc<Heap>) -> Self {
        self.composition.push(heap);
        self
    }

    /// Validates the wiring and builds the heap. All failures here are
    /// configuration errors; nothing is resolved yet.
    pub fn build(self) -> Result<Arc<Heap>> {
        if self.sources.is_empty() && self.composition.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "heap '{}' needs at least one source or composed heap",
                self.id
            )));
        }

        if self.sources.iter().any(|s| s.patterns.is_empty()) {
            return Err(PipelineError::Configuration(format!(
                "heap '{}' declares a source without patterns",
                self.id
            )));
        }

        for pattern in self.sources.iter().flat_map(|s| s.patterns.iter()) {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(PipelineError::Configuration(format!(
                    "heap '{}': invalid path pattern '{pattern}': {e}",
                    self.id
                )));
            }
        }

        // Self-inclusion anywhere in the composition tree is fatal.
        for sub in &self.composition {
            if composition_contains(sub, &self.id) {
                return Err(PipelineError::Configuration(format!(
                    "heap '{}' includes itself through its composition",
                    self.id
                )));
            }
        }

        let heap = Arc::new(Heap {
            id: self.id,
            sources: self.sources,
            filters: self.filters,
            composition: self.composition,
            state: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
        });

        for sub in &heap.composition {
            sub.observe(Arc::new(CompositionForwarder {
                parent: Arc::downgrade(&heap),
            }));
        }

        Ok(heap)
    }
}

fn composition_contains(heap: &Arc<Heap>, id: &str) -> bool {
    heap.id == id || heap.composition.iter().any(|h| composition_contains(h, id))
}
