use nutpress_api::error::{PipelineError, Result};
use nutpress_api::filter::NutFilter;
use regex::Regex;
use std::sync::Arc;

/// Ordered chain of path filters; each consumes the prior's output.
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn NutFilter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn NutFilter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Arc<dyn NutFilter>) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn apply(&self, paths: Vec<String>) -> Vec<String> {
        self.filters
            .iter()
            .fold(paths, |acc, f| f.filter_paths(acc))
    }
}

/// Excludes every path matching one of the configured regexes.
///
/// A pattern that does not compile is a configuration error at build time;
/// at filter time nothing can fail, malformed entries simply don't match.
pub struct RegexRemoveFilter {
    patterns: Vec<Regex>,
}

impl RegexRemoveFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            compiled.push(Regex::new(pattern).map_err(|e| {
                PipelineError::Configuration(format!("invalid filter pattern '{pattern}': {e}"))
            })?);
        }
        Ok(Self { patterns: compiled })
    }
}

impl NutFilter for RegexRemoveFilter {
    fn filter_paths(&self, paths: Vec<String>) -> Vec<String> {
        paths
            .into_iter()
            .filter(|p| !self.patterns.iter().any(|re| re.is_match(p)))
            .collect()
    }
}
