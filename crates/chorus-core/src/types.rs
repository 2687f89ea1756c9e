//! Record types flowing through the pipeline stages

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Free-form metadata attached to conversations and summaries
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A single message within a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub created_at: DateTime<Utc>,
    pub role: String,
    pub content: String,
}

/// A raw conversational record, the pipeline's input unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Summary of one conversation; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub chat_id: String,
    pub summary: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Structured payload returned by a summarisation model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedSummary {
    pub summary: String,
}

/// Structured payload returned by a cluster-naming model call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCluster {
    pub name: String,
    pub summary: String,
}

/// A group of conversations aggregated by the clustering stages.
///
/// `parent_id` is populated by meta-clustering and forms a tree: following
/// parent links never revisits a node (validated by [`crate::build_cluster_tree`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub chat_ids: Vec<String>,
    pub parent_id: Option<String>,
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        chat_ids: Vec<String>,
    ) -> Self {
        let name = name.into();
        let slug = slugify(&name);
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name,
            description: description.into(),
            slug,
            chat_ids,
            parent_id: None,
        }
    }

    pub fn count(&self) -> usize {
        self.chat_ids.len()
    }
}

/// Cluster plus 2D coordinates; terminal artifact of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedCluster {
    #[serde(flatten)]
    pub cluster: Cluster,
    pub x_coord: f32,
    pub y_coord: f32,
    pub level: usize,
}

/// One record per failed summarisation batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarisationError {
    pub chat_ids: Vec<String>,
    pub error: String,
}

/// One record per failed clustering batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringError {
    pub chat_ids: Vec<String>,
    pub error: String,
}

/// One record per failed meta-clustering batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaClusteringError {
    pub cluster_ids: Vec<String>,
    pub error: String,
}

/// A persisted per-batch failure: carries the identifiers of the failed batch
/// and the error message that sank it. A batch fails atomically, so one
/// record covers every item in the batch.
pub trait FailureRecord: Serialize + DeserializeOwned {
    fn from_failure(ids: Vec<String>, error: String) -> Self;
    fn failed_ids(&self) -> &[String];
    fn message(&self) -> &str;
}

impl FailureRecord for SummarisationError {
    fn from_failure(ids: Vec<String>, error: String) -> Self {
        Self {
            chat_ids: ids,
            error,
        }
    }

    fn failed_ids(&self) -> &[String] {
        &self.chat_ids
    }

    fn message(&self) -> &str {
        &self.error
    }
}

impl FailureRecord for ClusteringError {
    fn from_failure(ids: Vec<String>, error: String) -> Self {
        Self {
            chat_ids: ids,
            error,
        }
    }

    fn failed_ids(&self) -> &[String] {
        &self.chat_ids
    }

    fn message(&self) -> &str {
        &self.error
    }
}

impl FailureRecord for MetaClusteringError {
    fn from_failure(ids: Vec<String>, error: String) -> Self {
        Self {
            cluster_ids: ids,
            error,
        }
    }

    fn failed_ids(&self) -> &[String] {
        &self.cluster_ids
    }

    fn message(&self) -> &str {
        &self.error
    }
}

static SLUG_RE: OnceLock<regex::Regex> = OnceLock::new();

/// Lowercase, dash-separated identifier derived from a cluster name
pub fn slugify(name: &str) -> String {
    let re = SLUG_RE.get_or_init(|| regex::Regex::new(r"[^a-z0-9]+").expect("valid regex"));
    re.replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}
