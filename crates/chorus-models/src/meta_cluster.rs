//! Meta-clustering: fold base clusters into a shallower hierarchy by
//! grouping them and naming a parent for each group

use crate::error::Result;
use crate::kmeans::kmeans;
use crate::openai::OpenAiClient;
use crate::prompts;
use crate::traits::{EmbeddingModel, MetaClusterModel};
use chorus_core::{Cluster, GeneratedCluster};
use std::collections::BTreeMap;
use tracing::info;

const DEFAULT_MAX_CLUSTERS: usize = 10;
const KMEANS_MAX_ITERATIONS: usize = 100;

pub struct OpenAiMetaClusterModel<E> {
    client: OpenAiClient,
    embedding: E,
    max_clusters: usize,
}

impl<E: EmbeddingModel> OpenAiMetaClusterModel<E> {
    pub fn new(client: OpenAiClient, embedding: E) -> Self {
        Self {
            client,
            embedding,
            max_clusters: DEFAULT_MAX_CLUSTERS,
        }
    }

    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters.max(1);
        self
    }
}

impl<E: EmbeddingModel> MetaClusterModel for OpenAiMetaClusterModel<E> {
    fn checkpoint_filename(&self) -> &str {
        "meta_clusters.jsonl"
    }

    /// Returns the input clusters re-emitted with `parent_id` set, followed
    /// by the newly created parents. Batches already at or below the target
    /// width come back unchanged.
    async fn reduce_clusters(&self, clusters: &[Cluster]) -> Result<Vec<Cluster>> {
        if clusters.len() <= self.max_clusters {
            return Ok(clusters.to_vec());
        }

        let texts: Vec<String> = clusters
            .iter()
            .map(|c| format!("{}: {}", c.name, c.description))
            .collect();
        let embeddings = self.embedding.embed(&texts).await?;
        let assignments = kmeans(&embeddings, self.max_clusters, KMEANS_MAX_ITERATIONS);

        let mut groups: BTreeMap<usize, Vec<&Cluster>> = BTreeMap::new();
        for (cluster, group) in clusters.iter().zip(assignments) {
            groups.entry(group).or_default().push(cluster);
        }

        let mut reduced = Vec::with_capacity(clusters.len() + groups.len());
        let mut parents = Vec::with_capacity(groups.len());
        for members in groups.into_values() {
            let generated: GeneratedCluster = self
                .client
                .chat_json(prompts::META_CLUSTER_SYSTEM, &prompts::meta_cluster_prompt(&members))
                .await?;

            let chat_ids = members
                .iter()
                .flat_map(|c| c.chat_ids.iter().cloned())
                .collect();
            let parent = Cluster::new(generated.name, generated.summary, chat_ids);

            for member in members {
                let mut child = member.clone();
                child.parent_id = Some(parent.id.clone());
                reduced.push(child);
            }
            parents.push(parent);
        }

        info!(
            "reduced {} clusters under {} parents",
            clusters.len(),
            parents.len()
        );
        reduced.extend(parents);
        Ok(reduced)
    }
}
