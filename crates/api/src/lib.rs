pub mod cache;
pub mod dao;
pub mod error;
pub mod filter;
pub mod models;
pub mod nut;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheKey, CacheProvider};
pub use dao::NutDao;
pub use error::{PipelineError, Result};
pub use filter::NutFilter;
pub use models::{EngineRole, NutType, VersionNumber};
pub use nut::{Nut, NutRef, NutStream};
