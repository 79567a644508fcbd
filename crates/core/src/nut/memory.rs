use nutpress_api::error::Result;
use nutpress_api::models::{NutType, VersionNumber};
use nutpress_api::nut::{Nut, NutRef, NutStream};
use once_cell::sync::OnceCell;
use std::io::Cursor;
use std::sync::Arc;

/// A nut fully backed by memory. This is what DAOs hand out for small
/// resources and what the chain stores in the cache after materialization.
pub struct MemoryNut {
    name: String,
    nut_type: NutType,
    bytes: Arc<[u8]>,
    // Content hash, deferred until someone asks for it.
    version: OnceCell<VersionNumber>,
    references: Vec<NutRef>,
    proxy_uris: Vec<String>,
}

impl MemoryNut {
    /// Builds a nut whose version derives lazily from its content.
    pub fn new(name: impl Into<String>, nut_type: NutType, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            nut_type,
            bytes: bytes.into(),
            version: OnceCell::new(),
            references: Vec::new(),
            proxy_uris: Vec::new(),
        }
    }

    /// Builds a nut with an externally computed version, e.g. one combined
    /// from composite components or taken from a backing store timestamp.
    pub fn with_version(
        name: impl Into<String>,
        nut_type: NutType,
        bytes: impl Into<Arc<[u8]>>,
        version: VersionNumber,
    ) -> Self {
        let nut = Self::new(name, nut_type, bytes);
        let _ = nut.version.set(version);
        nut
    }

    pub fn with_references(mut self, references: Vec<NutRef>) -> Self {
        self.references = references;
        self
    }

    pub fn with_proxy_uris(mut self, proxy_uris: Vec<String>) -> Self {
        self.proxy_uris = proxy_uris;
        self
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }
}

impl Nut for MemoryNut {
    fn name(&self) -> &str {
        &self.name
    }

    fn nut_type(&self) -> NutType {
        self.nut_type
    }

    fn version(&self) -> VersionNumber {
        *self
            .version
            .get_or_init(|| VersionNumber::of_content(&self.bytes))
    }

    fn open_stream(&self) -> Result<NutStream> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }

    fn referenced(&self) -> &[NutRef] {
        &self.references
    }

    fn proxy_uris(&self) -> &[String] {
        &self.proxy_uris
    }
}
