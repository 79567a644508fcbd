use dashmap::DashMap;
use nutpress_api::cache::{CacheEntry, CacheProvider};
use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::EngineRole;
use nutpress_api::nut::NutRef;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::engine::request::EngineRequest;
use crate::engine::{Engine, ProcessingFailure, StageReport};
use crate::heap::Heap;
use crate::nut::{find_by_name, to_memory};

/// Caller-facing parameters of one chain invocation.
#[derive(Debug, Clone, Default)]
pub struct ChainRequest {
    /// Nut names to process; empty means all of the heap.
    pub nut_names: Vec<String>,
    /// Roles to bypass; a skipped stage passes its input through unchanged.
    pub skip: HashSet<EngineRole>,
    /// Drop-and-record a failing nut instead of aborting the chain.
    pub best_effort: bool,
}

impl ChainRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nut_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn skipping(mut self, role: EngineRole) -> Self {
        self.skip.insert(role);
        self
    }

    pub fn best_effort(mut self, enabled: bool) -> Self {
        self.best_effort = enabled;
        self
    }
}

/// Result of one chain invocation.
pub struct ChainOutcome {
    pub nuts: Vec<NutRef>,
    /// Nuts dropped under best-effort processing, in failure order.
    pub failures: Vec<ProcessingFailure>,
    pub from_cache: bool,
}

/// Ordered composition of engines around a heap.
///
/// Stages always run in the same role order; within a role, engines run in
/// priority order, each receiving the prior output list. The cache check
/// runs before any work engine: a hit bypasses them all, a miss computes,
/// then stores the materialized result under the same key.
pub struct EngineChain {
    workflow_id: String,
    engines: Vec<Arc<dyn Engine>>,
    cache: Option<Arc<dyn CacheProvider>>,
    // At most one computation in flight per cache key; unrelated requests
    // never contend on a common lock.
    in_flight: DashMap<u64, Arc<Mutex<()>>>,
}

impl EngineChain {
    pub fn new(
        workflow_id: impl Into<String>,
        engines: Vec<Arc<dyn Engine>>,
        cache: Option<Arc<dyn CacheProvider>>,
    ) -> Result<Self> {
        let workflow_id = workflow_id.into();

        let mut slots = HashSet::new();
        for engine in &engines {
            if engine.role() == EngineRole::Cache {
                return Err(PipelineError::Configuration(format!(
                    "workflow '{workflow_id}': cache steps are chain-owned, engines cannot claim the cache role"
                )));
            }
            if !slots.insert((engine.role(), engine.priority())) {
                return Err(PipelineError::Configuration(format!(
                    "workflow '{workflow_id}': two engines share role {} at priority {}",
                    engine.role(),
                    engine.priority()
                )));
            }
        }

        let mut engines = engines;
        engines.sort_by_key(|e| e.priority());

        Ok(Self {
            workflow_id,
            engines,
            cache,
            in_flight: DashMap::new(),
        })
    }

    /// Processes the heap's current nuts through the chain.
    pub async fn execute(&self, heap: &Heap, request: &ChainRequest) -> Result<ChainOutcome> {
        // One snapshot: the nuts and the version the cache key carries must
        // come from the same resolved set, or a refresh in between would let
        // stale bytes be stored under the new version.
        let (nuts, heap_version) = heap.snapshot().await?;
        let selected = select_requested(nuts, &request.nut_names)?;

        let engine_request = EngineRequest {
            workflow_id: self.workflow_id.clone(),
            heap_id: heap.id().to_string(),
            heap_version,
            nut_names: request.nut_names.clone(),
            skip: request.skip.clone(),
            best_effort: request.best_effort,
        };

        let Some(cache) = self
            .cache
            .as_ref()
            .filter(|_| !engine_request.should_skip(EngineRole::Cache))
        else {
            let (nuts, failures) = self.run_stages(&engine_request, selected)?;
            return Ok(ChainOutcome {
                nuts,
                failures,
                from_cache: false,
            });
        };

        let key = engine_request.cache_key();
        if let Some(entry) = cache.lookup(&key) {
            tracing::debug!(workflow = %self.workflow_id, "cache hit");
            return Ok(ChainOutcome {
                nuts: entry.nuts,
                failures: Vec::new(),
                from_cache: true,
            });
        }

        let digest = key.digest();
        let lock = self
            .in_flight
            .entry(digest)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        // Cleared on every exit path; heap versions mint new digests, so a
        // leaked slot would accumulate forever in a long-lived process.
        let _slot = InFlightSlot {
            map: &self.in_flight,
            digest,
        };
        let _guard = lock.lock().await;

        // Re-check: an identical request may have populated the entry while
        // we waited for the key's lock.
        if let Some(entry) = cache.lookup(&key) {
            tracing::debug!(workflow = %self.workflow_id, "cache hit after wait");
            return Ok(ChainOutcome {
                nuts: entry.nuts,
                failures: Vec::new(),
                from_cache: true,
            });
        }

        tracing::debug!(workflow = %self.workflow_id, "cache miss, running work engines");
        let (processed, failures) = self.run_stages(&engine_request, selected)?;

        // A partial best-effort result is never stored; replaying it from
        // the cache would hide the dropped nuts from later callers.
        if !failures.is_empty() {
            return Ok(ChainOutcome {
                nuts: processed,
                failures,
                from_cache: false,
            });
        }

        let mut materialized = Vec::with_capacity(processed.len());
        for nut in &processed {
            materialized.push(to_memory(nut)?);
        }

        cache.store(key, CacheEntry::new(materialized.clone()));

        Ok(ChainOutcome {
            nuts: materialized,
            failures,
            from_cache: false,
        })
    }

    fn run_stages(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
    ) -> Result<(Vec<NutRef>, Vec<ProcessingFailure>)> {
        let mut report = StageReport::default();
        let mut current = nuts;

        let stages = EngineRole::BEFORE_CACHE
            .into_iter()
            .chain(EngineRole::AFTER_CACHE);

        for role in stages {
            if request.should_skip(role) {
                continue;
            }
            for engine in self.engines.iter().filter(|e| e.role() == role) {
                current = engine.process(request, current, &mut report)?;
            }
        }

        Ok((current, report.failures))
    }
}

/// Removes its per-key in-flight entry when the computation ends, whichever
/// way it ends.
struct InFlightSlot<'a> {
    map: &'a DashMap<u64, Arc<Mutex<()>>>,
    digest: u64,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.digest);
    }
}

/// Narrows the heap's nuts to the requested names, preserving heap order.
/// A name absent from the top level may still resolve through a member's
/// references, e.g. an image a stylesheet points to; those land after the
/// top-level selection. A name found nowhere is a resolution failure.
fn select_requested(nuts: Vec<NutRef>, names: &[String]) -> Result<Vec<NutRef>> {
    if names.is_empty() {
        return Ok(nuts);
    }

    let mut selected: Vec<NutRef> = nuts
        .iter()
        .filter(|n| names.iter().any(|name| name == n.name()))
        .cloned()
        .collect();

    for name in names {
        if selected.iter().any(|n| n.name() == name) {
            continue;
        }
        match find_by_name(&nuts, name) {
            Some(found) => selected.push(found),
            None => {
                return Err(PipelineError::Resolution {
                    pattern: name.clone(),
                });
            }
        }
    }

    Ok(selected)
}
