pub mod composite;
pub mod memory;

pub use composite::CompositeNut;
pub use memory::MemoryNut;

use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::VersionNumber;
use nutpress_api::nut::{Nut, NutRef};
use std::io::Read;
use std::sync::Arc;

/// Order-sensitive combination of all member versions.
pub fn combine_versions(nuts: &[NutRef]) -> VersionNumber {
    VersionNumber::combine_all(nuts.iter().map(|n| n.version()))
}

/// Drains one freshly opened stream into memory. An I/O failure mid-read
/// aborts the whole read; partial output is never returned.
pub fn read_all(nut: &dyn Nut) -> Result<Vec<u8>> {
    let mut stream = nut.open_stream()?;
    let mut bytes = Vec::new();
    stream
        .read_to_end(&mut bytes)
        .map_err(|source| PipelineError::Streaming {
            nut: nut.name().to_string(),
            source,
        })?;
    Ok(bytes)
}

/// Materializes a nut (and its references, recursively) into memory-backed
/// nuts, keeping name, type and version. The source streams are drained
/// exactly once.
pub fn to_memory(nut: &NutRef) -> Result<NutRef> {
    let bytes = read_all(nut.as_ref())?;

    let mut references = Vec::with_capacity(nut.referenced().len());
    for referenced in nut.referenced() {
        references.push(to_memory(referenced)?);
    }

    Ok(Arc::new(
        MemoryNut::with_version(nut.name(), nut.nut_type(), bytes, nut.version())
            .with_references(references)
            .with_proxy_uris(nut.proxy_uris().to_vec()),
    ))
}

/// Finds a nut by name, looking through the given nuts then their
/// references, depth-first.
pub fn find_by_name(nuts: &[NutRef], name: &str) -> Option<NutRef> {
    for nut in nuts {
        if nut.name() == name {
            return Some(nut.clone());
        }
        if let Some(found) = find_by_name(nut.referenced(), name) {
            return Some(found);
        }
    }
    None
}
