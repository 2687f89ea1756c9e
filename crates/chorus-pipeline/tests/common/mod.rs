#![allow(dead_code)]

use chorus_core::{Cluster, Conversation, ConversationSummary, Message, ProjectedCluster};
use chorus_models::{
    ClusterModel, DimensionalityModel, MetaClusterModel, ModelError, SummaryModel,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Mutex;

pub fn conversation(chat_id: &str) -> Conversation {
    Conversation {
        chat_id: chat_id.to_string(),
        created_at: Utc::now(),
        messages: vec![Message {
            created_at: Utc::now(),
            role: "user".to_string(),
            content: format!("message in chat {chat_id}"),
        }],
        metadata: Default::default(),
    }
}

pub fn summary(chat_id: &str) -> ConversationSummary {
    ConversationSummary {
        chat_id: chat_id.to_string(),
        summary: format!("summary of chat {chat_id}"),
        metadata: Default::default(),
    }
}

pub fn cluster(id: &str, chat_ids: &[&str]) -> Cluster {
    Cluster {
        id: id.to_string(),
        name: format!("cluster {id}"),
        description: "a group of conversations".to_string(),
        slug: format!("cluster-{id}"),
        chat_ids: chat_ids.iter().map(|c| c.to_string()).collect(),
        parent_id: None,
    }
}

fn scripted_failure() -> ModelError {
    ModelError::Api {
        status: 500,
        message: "scripted failure".to_string(),
    }
}

/// Summary model that records every batch it sees and fails any batch
/// containing a designated chat id.
pub struct ScriptedSummaryModel {
    calls: Mutex<Vec<Vec<String>>>,
    fail_chat_ids: HashSet<String>,
}

impl ScriptedSummaryModel {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(chat_ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_chat_ids: chat_ids.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl SummaryModel for ScriptedSummaryModel {
    fn checkpoint_filename(&self) -> &str {
        "summaries.jsonl"
    }

    async fn summarise(
        &self,
        conversations: &[Conversation],
    ) -> chorus_models::Result<Vec<ConversationSummary>> {
        self.calls
            .lock()
            .unwrap()
            .push(conversations.iter().map(|c| c.chat_id.clone()).collect());

        if conversations
            .iter()
            .any(|c| self.fail_chat_ids.contains(&c.chat_id))
        {
            return Err(scripted_failure());
        }
        Ok(conversations
            .iter()
            .map(|c| ConversationSummary {
                chat_id: c.chat_id.clone(),
                summary: "ok".to_string(),
                metadata: Default::default(),
            })
            .collect())
    }
}

/// Cluster model that emits one cluster per batch, covering the batch's
/// chat ids, and fails any batch containing a designated chat id.
pub struct OneClusterPerBatchModel {
    calls: Mutex<Vec<Vec<String>>>,
    fail_chat_ids: HashSet<String>,
}

impl OneClusterPerBatchModel {
    pub fn new() -> Self {
        Self::failing_on(&[])
    }

    pub fn failing_on(chat_ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_chat_ids: chat_ids.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl ClusterModel for OneClusterPerBatchModel {
    fn checkpoint_filename(&self) -> &str {
        "clusters.jsonl"
    }

    async fn cluster_summaries(
        &self,
        summaries: &[ConversationSummary],
    ) -> chorus_models::Result<Vec<Cluster>> {
        self.calls
            .lock()
            .unwrap()
            .push(summaries.iter().map(|s| s.chat_id.clone()).collect());

        if summaries
            .iter()
            .any(|s| self.fail_chat_ids.contains(&s.chat_id))
        {
            return Err(scripted_failure());
        }
        Ok(vec![Cluster::new(
            "c",
            "d",
            summaries.iter().map(|s| s.chat_id.clone()).collect(),
        )])
    }
}

/// Meta-cluster model that either fails everything or re-emits its input
/// under one new parent.
pub struct ScriptedMetaClusterModel {
    calls: Mutex<usize>,
    fail_always: bool,
}

impl ScriptedMetaClusterModel {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
            fail_always: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(0),
            fail_always: true,
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl MetaClusterModel for ScriptedMetaClusterModel {
    fn checkpoint_filename(&self) -> &str {
        "meta_clusters.jsonl"
    }

    async fn reduce_clusters(&self, clusters: &[Cluster]) -> chorus_models::Result<Vec<Cluster>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail_always {
            return Err(scripted_failure());
        }

        let parent = Cluster::new(
            "parent",
            "covers the batch",
            clusters
                .iter()
                .flat_map(|c| c.chat_ids.iter().cloned())
                .collect(),
        );
        let mut reduced: Vec<Cluster> = clusters
            .iter()
            .map(|c| {
                let mut child = c.clone();
                child.parent_id = Some(parent.id.clone());
                child
            })
            .collect();
        reduced.push(parent);
        Ok(reduced)
    }
}

/// Projection model placing every cluster at a fixed coordinate
pub struct GridProjectionModel;

impl DimensionalityModel for GridProjectionModel {
    fn checkpoint_filename(&self) -> &str {
        "dimensionality.jsonl"
    }

    async fn project(
        &self,
        clusters: &[Cluster],
    ) -> chorus_models::Result<Vec<ProjectedCluster>> {
        Ok(clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| ProjectedCluster {
                cluster: cluster.clone(),
                x_coord: index as f32,
                y_coord: 0.0,
                level: 0,
            })
            .collect())
    }
}
