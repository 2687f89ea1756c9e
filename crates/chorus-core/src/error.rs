use thiserror::Error;

/// Errors raised while assembling or validating the cluster hierarchy
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cluster {id} references unknown parent {parent_id}")]
    UnknownParent { id: String, parent_id: String },

    #[error("cluster hierarchy contains a cycle involving {id}")]
    CycleDetected { id: String },
}
