use nutpress_api::cache::CacheKey;
use nutpress_api::models::{EngineRole, VersionNumber};
use std::collections::HashSet;
use xxhash_rust::xxh3::Xxh3;

/// One chain invocation as seen by the engines: which workflow and heap
/// content it runs against, which nuts were asked for, which stages the
/// caller wants bypassed, and whether per-nut failures abort the chain.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub workflow_id: String,
    pub heap_id: String,
    pub heap_version: VersionNumber,
    /// Requested nut names; empty means "all of the heap".
    pub nut_names: Vec<String>,
    pub skip: HashSet<EngineRole>,
    pub best_effort: bool,
}

impl EngineRequest {
    pub fn should_skip(&self, role: EngineRole) -> bool {
        self.skip.contains(&role)
    }

    /// Stable fingerprint of the skip-set, independent of insertion order.
    pub fn skip_fingerprint(&self) -> u64 {
        let mut roles: Vec<EngineRole> = self.skip.iter().copied().collect();
        roles.sort();

        let mut hasher = Xxh3::new();
        for role in roles {
            hasher.update(role.to_string().as_bytes());
            hasher.update(b"\0");
        }
        hasher.digest()
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            workflow_id: self.workflow_id.clone(),
            heap_id: self.heap_id.clone(),
            heap_version: self.heap_version,
            nut_names: self.nut_names.clone(),
            skip_fingerprint: self.skip_fingerprint(),
        }
    }
}
