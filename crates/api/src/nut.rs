use crate::error::Result;
use crate::models::{NutType, VersionNumber};
use std::io::Read;
use std::sync::Arc;

pub type NutRef = Arc<dyn Nut>;

/// One-shot byte stream over a nut's content. Not rewindable: a new logical
/// read requires a new `open_stream` call.
pub type NutStream = Box<dyn Read + Send>;

/// A single versioned web resource.
///
/// Implementations must be able to report their version without fully
/// materializing the byte content (lazy, memoized hashing is fine).
pub trait Nut: Send + Sync {
    /// Workflow-relative path of the resource.
    fn name(&self) -> &str;

    fn nut_type(&self) -> NutType;

    fn version(&self) -> VersionNumber;

    /// Opens a fresh stream over the content. Each returned stream can be
    /// drained exactly once.
    fn open_stream(&self) -> Result<NutStream>;

    /// Nuts this resource depends on, e.g. an image a stylesheet points to.
    /// A same-set weak dependency, not ownership; the graph is cycle-free.
    fn referenced(&self) -> &[NutRef] {
        &[]
    }

    /// For a composite nut, the ordered nuts it concatenates. `None` for a
    /// plain resource.
    fn components(&self) -> Option<&[NutRef]> {
        None
    }

    /// Alternate retrieval locations, tried in order.
    fn proxy_uris(&self) -> &[String] {
        &[]
    }
}
