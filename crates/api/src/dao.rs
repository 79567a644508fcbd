use crate::error::Result;
use crate::nut::NutRef;
use async_trait::async_trait;
use std::time::Duration;

/// Resource-source boundary: resolves path patterns into versioned nuts.
///
/// Resolution is the only operation expected to block on I/O besides stream
/// opening. Whether an empty resolution is fatal is the caller's policy, not
/// the DAO's.
#[async_trait]
pub trait NutDao: Send + Sync {
    /// Resolves a path pattern (typically a regex) into concrete nuts, each
    /// carrying a version derived from the backing store's content or
    /// timestamp.
    async fn create(&self, pattern: &str) -> Result<Vec<NutRef>>;

    /// How often the backing store should be re-checked for changes.
    /// `None` or a zero duration disables polling.
    fn polling_interval(&self) -> Option<Duration> {
        None
    }

    /// Alternate base URIs this DAO proxies through, tried in order until
    /// one resolves.
    fn proxy_uris(&self) -> &[String] {
        &[]
    }
}
