use crate::models::VersionNumber;
use crate::nut::NutRef;
use std::time::SystemTime;
use xxhash_rust::xxh3::Xxh3;

/// Identifies one processed result: same workflow, same heap content, same
/// requested nuts, same set of bypassed stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub workflow_id: String,
    pub heap_id: String,
    pub heap_version: VersionNumber,
    /// Requested nut names; empty means "all".
    pub nut_names: Vec<String>,
    /// Fingerprint of the active skip-set.
    pub skip_fingerprint: u64,
}

impl CacheKey {
    /// Stable 64-bit digest of the whole key.
    pub fn digest(&self) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(self.workflow_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.heap_id.as_bytes());
        hasher.update(&self.heap_version.as_u64().to_be_bytes());
        for name in &self.nut_names {
            hasher.update(name.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(&self.skip_fingerprint.to_be_bytes());
        hasher.digest()
    }
}

/// A processed nut list ready to be served again. The nuts are fully
/// materialized: looking them up never re-runs work engines.
#[derive(Clone)]
pub struct CacheEntry {
    pub nuts: Vec<NutRef>,
    pub created_at: SystemTime,
}

impl CacheEntry {
    pub fn new(nuts: Vec<NutRef>) -> Self {
        Self {
            nuts,
            created_at: SystemTime::now(),
        }
    }
}

/// Pluggable key -> processed-result store consulted by the engine chain.
///
/// Stores are last-write-wins: concurrent identical requests may both
/// compute and both store without correctness impact, since content is
/// idempotent for a given key.
pub trait CacheProvider: Send + Sync {
    fn lookup(&self, key: &CacheKey) -> Option<CacheEntry>;

    fn store(&self, key: CacheKey, entry: CacheEntry);

    /// Drops every entry produced from the given heap, whatever its version.
    fn invalidate_heap(&self, heap_id: &str);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
