use chorus_core::CoreError;
use chorus_models::ModelError;
use chorus_store::StoreError;
use thiserror::Error;

/// Stage-fatal failures. Per-batch model failures are recorded in the error
/// checkpoint instead of surfacing here; only checkpoint corruption, invalid
/// hierarchies, and unbatched terminal-stage model errors abort a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Core(#[from] CoreError),
}
