pub mod cache;
pub mod dao;
pub mod engine;
pub mod filter;
pub mod heap;
pub mod logging;
pub mod nut;
pub mod runtime;
pub mod workflow;

pub use nutpress_api::error::{PipelineError, Result};
