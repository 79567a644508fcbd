use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an engine inside a chain.
///
/// A chain always walks its work stages in the same order: inspection,
/// aggregation, conversion, then (after the cache check) compression and
/// post-processing. `Cache` is not a work stage; it tags the cache
/// check/store steps so callers can bypass them through a skip-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineRole {
    Inspector,
    Aggregator,
    Converter,
    Cache,
    Compressor,
    PostProcessor,
}

impl EngineRole {
    /// Work stages running before the cache check, in execution order.
    pub const BEFORE_CACHE: [EngineRole; 3] = [
        EngineRole::Inspector,
        EngineRole::Aggregator,
        EngineRole::Converter,
    ];

    /// Work stages running after the cache check, in execution order.
    pub const AFTER_CACHE: [EngineRole; 2] = [EngineRole::Compressor, EngineRole::PostProcessor];
}

impl fmt::Display for EngineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineRole::Inspector => "inspector",
            EngineRole::Aggregator => "aggregator",
            EngineRole::Converter => "converter",
            EngineRole::Cache => "cache",
            EngineRole::Compressor => "compressor",
            EngineRole::PostProcessor => "post-processor",
        };
        write!(f, "{name}")
    }
}
