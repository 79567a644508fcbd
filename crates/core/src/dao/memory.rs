use async_trait::async_trait;
use indexmap::IndexMap;
use nutpress_api::dao::NutDao;
use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::NutType;
use nutpress_api::nut::NutRef;
use regex::Regex;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::nut::MemoryNut;

/// Registry-backed DAO resolving regex patterns over registered paths.
///
/// This is the reference implementation of the resource-source contract;
/// disk and cloud backends live outside the core. Content can be replaced
/// after registration, which makes it the fixture of choice for
/// change-detection tests: the version of a resolved nut always derives from
/// the current content.
pub struct MemoryNutDao {
    // IndexMap keeps registration order, so resolution order is stable.
    entries: RwLock<IndexMap<String, Arc<[u8]>>>,
    polling_interval: Option<Duration>,
    proxy_uris: Vec<String>,
}

impl MemoryNutDao {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            polling_interval: None,
            proxy_uris: Vec::new(),
        }
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    pub fn with_proxy_uris(mut self, proxy_uris: Vec<String>) -> Self {
        self.proxy_uris = proxy_uris;
        self
    }

    /// Registers a path or replaces its content.
    pub fn put(&self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.entries
            .write()
            .expect("dao entries lock poisoned")
            .insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) {
        self.entries
            .write()
            .expect("dao entries lock poisoned")
            .shift_remove(path);
    }
}

impl Default for MemoryNutDao {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NutDao for MemoryNutDao {
    async fn create(&self, pattern: &str) -> Result<Vec<NutRef>> {
        // Heap builders validate patterns up front; a pattern that still
        // fails to compile here cannot resolve anything.
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            tracing::warn!(%pattern, error = %e, "pattern does not compile");
            PipelineError::Resolution {
                pattern: pattern.to_string(),
            }
        })?;

        let entries = self.entries.read().expect("dao entries lock poisoned");
        let mut nuts: Vec<NutRef> = Vec::new();

        for (path, bytes) in entries.iter() {
            if !regex.is_match(path) {
                continue;
            }

            let Some(nut_type) = NutType::for_path(path) else {
                tracing::debug!("skipping '{path}': no nut type for extension");
                continue;
            };

            nuts.push(Arc::new(
                MemoryNut::new(path.clone(), nut_type, Arc::clone(bytes))
                    .with_proxy_uris(self.proxy_uris.clone()),
            ));
        }

        Ok(nuts)
    }

    fn polling_interval(&self) -> Option<Duration> {
        self.polling_interval.filter(|d| !d.is_zero())
    }

    fn proxy_uris(&self) -> &[String] {
        &self.proxy_uris
    }
}
