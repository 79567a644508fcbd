/// Path-list transformer applied before DAO resolution.
///
/// Pure function over an ordered sequence of candidate paths. The relative
/// order of retained paths must be preserved. A path that cannot be
/// evaluated is excluded, never a reason to fail: filter-level configuration
/// errors are fatal at build time, not at filter time.
pub trait NutFilter: Send + Sync {
    fn filter_paths(&self, paths: Vec<String>) -> Vec<String>;
}
