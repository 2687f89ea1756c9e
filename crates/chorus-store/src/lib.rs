//! Append-only JSONL checkpoint store for pipeline stages

mod checkpoint;

pub use checkpoint::{error_checkpoint_name, CheckpointManager, StoreError};
