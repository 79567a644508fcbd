use nutpress_api::cache::CacheProvider;
use nutpress_api::error::{PipelineError, Result};
use std::sync::Arc;

use crate::cache::CacheProviderRegistry;
use crate::engine::{ChainOutcome, ChainRequest, Engine, EngineChain};
use crate::heap::{Heap, HeapListener};

/// Named end-to-end association of a heap with an engine chain.
pub struct Workflow {
    id: String,
    heap: Arc<Heap>,
    chain: EngineChain,
}

impl Workflow {
    pub fn builder(id: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn heap(&self) -> &Arc<Heap> {
        &self.heap
    }

    /// Runs the chain against the heap's current nuts.
    pub async fn run(&self, request: &ChainRequest) -> Result<ChainOutcome> {
        self.chain.execute(&self.heap, request).await
    }
}

/// Invalidates a workflow's cache entries when its heap turns dirty.
struct CacheInvalidator {
    provider: Arc<dyn CacheProvider>,
}

impl HeapListener for CacheInvalidator {
    fn heap_dirty(&self, heap_id: &str) {
        tracing::debug!(heap = %heap_id, "dropping cache entries for dirty heap");
        self.provider.invalidate_heap(heap_id);
    }
}

/// Wires heap, engines and cache provider together. Everything that can be
/// misconfigured fails here, never at request time.
pub struct WorkflowBuilder {
    id: String,
    heap: Option<Arc<Heap>>,
    engines: Vec<Arc<dyn Engine>>,
    cache: Option<Arc<dyn CacheProvider>>,
}

impl WorkflowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            heap: None,
            engines: Vec::new(),
            cache: None,
        }
    }

    pub fn heap(mut self, heap: Arc<Heap>) -> Self {
        self.heap = Some(heap);
        self
    }

    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn cache(mut self, provider: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(provider);
        self
    }

    /// Resolves a provider id through the registry.
    pub fn cache_from(self, registry: &CacheProviderRegistry, id: &str) -> Result<Self> {
        let provider = registry.resolve(id)?;
        Ok(self.cache(provider))
    }

    pub fn build(self) -> Result<Workflow> {
        let heap = self.heap.ok_or_else(|| {
            PipelineError::Configuration(format!("workflow '{}' has no heap", self.id))
        })?;

        let chain = EngineChain::new(self.id.clone(), self.engines, self.cache.clone())?;

        if let Some(provider) = self.cache {
            heap.observe(Arc::new(CacheInvalidator { provider }));
        }

        Ok(Workflow {
            id: self.id,
            heap,
            chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheProvider;
    use crate::dao::MemoryNutDao;
    use crate::engine::{StageReport, TextAggregator};
    use nutpress_api::models::EngineRole;
    use nutpress_api::nut::NutRef;

    fn heap() -> Arc<Heap> {
        let dao = MemoryNutDao::new();
        dao.put("a.css", b"a".to_vec());
        Heap::builder("h")
            .source(Arc::new(dao), ["a.css"])
            .build()
            .unwrap()
    }

    #[test]
    fn workflow_needs_a_heap() {
        assert!(matches!(
            Workflow::builder("wf").build(),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn cache_role_engines_are_rejected() {
        struct FakeCacheEngine;
        impl Engine for FakeCacheEngine {
            fn role(&self) -> EngineRole {
                EngineRole::Cache
            }
            fn process(
                &self,
                _: &crate::engine::EngineRequest,
                nuts: Vec<NutRef>,
                _: &mut StageReport,
            ) -> Result<Vec<NutRef>> {
                Ok(nuts)
            }
        }

        let result = Workflow::builder("wf")
            .heap(heap())
            .engine(Arc::new(FakeCacheEngine))
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn colliding_role_priorities_are_rejected() {
        let result = Workflow::builder("wf")
            .heap(heap())
            .engine(Arc::new(TextAggregator::default()))
            .engine(Arc::new(TextAggregator::new("other")))
            .build();
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[test]
    fn unknown_cache_provider_fails_at_build() {
        let registry = CacheProviderRegistry::with_defaults();
        assert!(Workflow::builder("wf").cache_from(&registry, "nope").is_err());
    }

    #[tokio::test]
    async fn built_workflow_runs() {
        let workflow = Workflow::builder("wf")
            .heap(heap())
            .engine(Arc::new(TextAggregator::default()))
            .cache(Arc::new(MemoryCacheProvider::new()))
            .build()
            .unwrap();

        let outcome = workflow.run(&ChainRequest::all()).await.unwrap();
        assert_eq!(outcome.nuts.len(), 1);
        assert_eq!(outcome.nuts[0].name(), "aggregate.css");
    }
}
