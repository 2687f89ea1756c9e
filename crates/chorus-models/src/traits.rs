//! Model capability traits.
//!
//! Each backend is a capability with one entry point per operation plus a
//! checkpoint-filename accessor; implementations are selected by dependency
//! injection at pipeline construction time. Every checkpointed capability
//! derives its companion error-log name through the store's naming rule.

use crate::error::Result;
use chorus_core::{Cluster, Conversation, ConversationSummary, ProjectedCluster};
use chorus_store::error_checkpoint_name;

/// Capability: summarise one batch of conversations
#[allow(async_fn_in_trait)]
pub trait SummaryModel: Send + Sync {
    fn checkpoint_filename(&self) -> &str;

    fn error_checkpoint_filename(&self) -> String {
        error_checkpoint_name(self.checkpoint_filename())
    }

    async fn summarise(&self, conversations: &[Conversation]) -> Result<Vec<ConversationSummary>>;
}

/// Capability: aggregate one batch of summaries into base clusters
#[allow(async_fn_in_trait)]
pub trait ClusterModel: Send + Sync {
    fn checkpoint_filename(&self) -> &str;

    fn error_checkpoint_filename(&self) -> String {
        error_checkpoint_name(self.checkpoint_filename())
    }

    async fn cluster_summaries(&self, summaries: &[ConversationSummary]) -> Result<Vec<Cluster>>;
}

/// Capability: reduce one batch of clusters into a shallower hierarchy
#[allow(async_fn_in_trait)]
pub trait MetaClusterModel: Send + Sync {
    fn checkpoint_filename(&self) -> &str;

    fn error_checkpoint_filename(&self) -> String {
        error_checkpoint_name(self.checkpoint_filename())
    }

    async fn reduce_clusters(&self, clusters: &[Cluster]) -> Result<Vec<Cluster>>;
}

/// Capability: place clusters on a 2D map
#[allow(async_fn_in_trait)]
pub trait DimensionalityModel: Send + Sync {
    fn checkpoint_filename(&self) -> &str;

    async fn project(&self, clusters: &[Cluster]) -> Result<Vec<ProjectedCluster>>;
}

/// Capability: embed a list of texts
#[allow(async_fn_in_trait)]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// One embedding backend is typically shared by the cluster, meta-cluster and
// projection models.
impl<E: EmbeddingModel> EmbeddingModel for &E {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }
}
