//! Checkpoint-resumable stage runner and per-stage driver functions.
//!
//! Each stage partitions its input into batches, skips batches whose key is
//! already in the stage's error checkpoint, invokes the injected model
//! through the bounded invoker, and persists successes and failures to
//! separate append-only logs. Re-invoking a stage therefore resumes where
//! the previous run left off instead of reprocessing everything.

mod error;
mod runner;

pub use error::PipelineError;
pub use runner::{
    generate_base_clusters_from_conversation_summaries, reduce_clusters_from_base_clusters,
    reduce_dimensionality_from_clusters, summarise_conversations, StageOptions,
};
