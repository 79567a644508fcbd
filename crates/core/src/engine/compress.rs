use nutpress_api::error::Result;
use nutpress_api::models::EngineRole;
use nutpress_api::nut::NutRef;
use std::sync::Arc;

use crate::engine::{Engine, EngineRequest, StageReport, per_nut};
use crate::nut::{MemoryNut, read_all};

/// Compresses each nut's bytes through the zstd codec. Name, type, version
/// and references are preserved; only the bytes change.
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl Engine for ZstdCompressor {
    fn role(&self) -> EngineRole {
        EngineRole::Compressor
    }

    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>> {
        per_nut(self.role(), request, nuts, report, |nut| {
            let bytes = read_all(nut.as_ref())?;
            let compressed = zstd::encode_all(&bytes[..], self.level)?;

            Ok(Arc::new(
                MemoryNut::with_version(nut.name(), nut.nut_type(), compressed, nut.version())
                    .with_references(nut.referenced().to_vec())
                    .with_proxy_uris(nut.proxy_uris().to_vec()),
            ) as NutRef)
        })
    }
}
