use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::{Xxh3, xxh3_64};

/// Opaque, comparable version identifier derived from content.
///
/// Two nuts carry the same version iff the wrapped values are equal. The
/// combination of several versions is order-sensitive, since byte
/// concatenation is order-sensitive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Version derived from content bytes.
    pub fn of_content(bytes: &[u8]) -> Self {
        Self(xxh3_64(bytes))
    }

    /// Version derived from a modification timestamp (seconds).
    pub fn from_timestamp(secs: u64) -> Self {
        Self(secs)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Combines a sequence of versions into one.
    ///
    /// A single member keeps its own version. Otherwise the members are
    /// digested in order, so `[v1, v2]` and `[v2, v1]` differ whenever
    /// `v1 != v2`.
    pub fn combine_all<I>(versions: I) -> Self
    where
        I: IntoIterator<Item = VersionNumber>,
    {
        let mut hasher = Xxh3::new();
        let mut count = 0usize;
        let mut single = VersionNumber::default();

        for v in versions {
            hasher.update(&v.0.to_be_bytes());
            single = v;
            count += 1;
        }

        match count {
            0 => VersionNumber::default(),
            1 => single,
            _ => Self(hasher.digest()),
        }
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
