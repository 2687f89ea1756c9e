//! Base clustering: embed summaries, group with k-means, name each group
//! with the chat model

use crate::error::Result;
use crate::kmeans::kmeans;
use crate::openai::OpenAiClient;
use crate::prompts;
use crate::traits::{ClusterModel, EmbeddingModel};
use chorus_core::{Cluster, ConversationSummary, GeneratedCluster};
use std::collections::BTreeMap;
use tracing::{debug, info};

const DEFAULT_SUMMARIES_PER_CLUSTER: usize = 10;
const KMEANS_MAX_ITERATIONS: usize = 100;

pub struct KmeansClusterModel<E> {
    client: OpenAiClient,
    embedding: E,
    summaries_per_cluster: usize,
}

impl<E: EmbeddingModel> KmeansClusterModel<E> {
    pub fn new(client: OpenAiClient, embedding: E) -> Self {
        Self {
            client,
            embedding,
            summaries_per_cluster: DEFAULT_SUMMARIES_PER_CLUSTER,
        }
    }

    /// Target number of summaries per base cluster; the batch is split into
    /// roughly `len / n` groups.
    pub fn with_summaries_per_cluster(mut self, summaries_per_cluster: usize) -> Self {
        self.summaries_per_cluster = summaries_per_cluster.max(1);
        self
    }
}

impl<E: EmbeddingModel> ClusterModel for KmeansClusterModel<E> {
    fn checkpoint_filename(&self) -> &str {
        "clusters.jsonl"
    }

    async fn cluster_summaries(&self, summaries: &[ConversationSummary]) -> Result<Vec<Cluster>> {
        if summaries.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = summaries.iter().map(|s| s.summary.clone()).collect();
        let embeddings = self.embedding.embed(&texts).await?;

        let k = summaries.len().div_ceil(self.summaries_per_cluster).max(1);
        let assignments = kmeans(&embeddings, k, KMEANS_MAX_ITERATIONS);
        debug!("grouped {} summaries into {k} candidate clusters", summaries.len());

        let mut groups: BTreeMap<usize, Vec<&ConversationSummary>> = BTreeMap::new();
        for (summary, cluster) in summaries.iter().zip(assignments) {
            groups.entry(cluster).or_default().push(summary);
        }

        let mut clusters = Vec::with_capacity(groups.len());
        for members in groups.into_values() {
            let generated: GeneratedCluster = self
                .client
                .chat_json(prompts::CLUSTER_SYSTEM, &prompts::cluster_naming_prompt(&members))
                .await?;

            let chat_ids = members.iter().map(|s| s.chat_id.clone()).collect();
            clusters.push(Cluster::new(generated.name, generated.summary, chat_ids));
        }

        info!("produced {} base clusters from {} summaries", clusters.len(), summaries.len());
        Ok(clusters)
    }
}
