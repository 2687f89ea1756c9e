//! Core data model and batching primitives for conversation clustering

mod batch;
mod error;
mod tree;
mod types;

pub use batch::{partition_batches, BatchItem, BatchKey};
pub use error::CoreError;
pub use tree::{build_cluster_tree, cluster_levels, ClusterTreeNode};
pub use types::{
    slugify, Cluster, ClusteringError, Conversation, ConversationSummary, FailureRecord,
    GeneratedCluster, GeneratedSummary, Message, MetaClusteringError, Metadata, ProjectedCluster,
    SummarisationError,
};
