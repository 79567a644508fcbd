pub mod aggregate;
pub mod chain;
pub mod compress;
pub mod inspect;
pub mod request;

pub use aggregate::TextAggregator;
pub use chain::{ChainOutcome, ChainRequest, EngineChain};
pub use compress::ZstdCompressor;
pub use inspect::{CssImportInspector, CssUrlInspector};
pub use request::EngineRequest;

use nutpress_api::error::{PipelineError, Result};
use nutpress_api::models::EngineRole;
use nutpress_api::nut::NutRef;

/// One pipeline stage. Stateless across requests; an implementation may own
/// an internal cache map but must never mutate shared state otherwise.
pub trait Engine: Send + Sync {
    fn role(&self) -> EngineRole;

    /// Ordering among engines sharing a role; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Transforms the prior stage's output list into this stage's output
    /// list. Input ordering must be preserved except where the engine
    /// explicitly merges entries. Per-nut failures are reported through
    /// `report` when the request is best-effort.
    fn process(
        &self,
        request: &EngineRequest,
        nuts: Vec<NutRef>,
        report: &mut StageReport,
    ) -> Result<Vec<NutRef>>;
}

/// A nut dropped by a stage under best-effort processing.
#[derive(Debug, Clone)]
pub struct ProcessingFailure {
    pub nut: String,
    pub role: EngineRole,
    pub detail: String,
}

/// Collects per-nut failures across the stages of one chain invocation.
#[derive(Debug, Default)]
pub struct StageReport {
    pub failures: Vec<ProcessingFailure>,
}

/// Runs `op` over each nut independently, honoring the request's
/// best-effort flag: a failing nut is dropped and recorded, or the first
/// failure aborts with a processing error naming the nut and stage.
pub fn per_nut<F>(
    role: EngineRole,
    request: &EngineRequest,
    nuts: Vec<NutRef>,
    report: &mut StageReport,
    mut op: F,
) -> Result<Vec<NutRef>>
where
    F: FnMut(NutRef) -> Result<NutRef>,
{
    let mut out = Vec::with_capacity(nuts.len());

    for nut in nuts {
        let name = nut.name().to_string();
        match op(nut) {
            Ok(processed) => out.push(processed),
            Err(error) if request.best_effort => {
                tracing::warn!(nut = %name, %role, %error, "dropping nut (best effort)");
                report.failures.push(ProcessingFailure {
                    nut: name,
                    role,
                    detail: error.to_string(),
                });
            }
            Err(error @ PipelineError::Processing { .. }) => return Err(error),
            Err(error) => {
                return Err(PipelineError::Processing {
                    nut: name,
                    role,
                    detail: error.to_string(),
                });
            }
        }
    }

    Ok(out)
}
