use crate::models::EngineRole;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid wiring detected while building a heap, chain or workflow.
    /// Never raised at request time.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A path pattern resolved to nothing when the caller required at least
    /// one nut, or every proxy URI failed.
    #[error("no nut could be resolved for pattern '{pattern}'")]
    Resolution { pattern: String },
    /// An engine stage failed on a specific nut.
    #[error("{role} stage failed on nut '{nut}': {detail}")]
    Processing {
        nut: String,
        role: EngineRole,
        detail: String,
    },
    /// I/O failure while draining a nut's stream. Partial output is invalid.
    #[error("streaming failure on nut '{nut}': {source}")]
    Streaming {
        nut: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
