//! Embedding backends: remote OpenAI and local fastembed

use crate::error::{ModelError, Result};
use crate::invoker::{BatchOutcome, BoundedInvoker, RetryPolicy};
use crate::openai::OpenAiClient;
use crate::traits::EmbeddingModel;
use chorus_core::partition_batches;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

pub const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

const DEFAULT_MODEL_BATCH_SIZE: usize = 50;
const DEFAULT_CONCURRENT_JOBS: usize = 5;

/// Remote embedding model: batches texts through the bounded invoker so a
/// large corpus does not exceed the provider's rate limits.
pub struct OpenAiEmbeddingModel {
    client: OpenAiClient,
    model_name: String,
    model_batch_size: usize,
    n_concurrent_jobs: usize,
    sleep_seconds: f64,
}

impl OpenAiEmbeddingModel {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            model_name: OPENAI_EMBEDDING_MODEL.to_string(),
            model_batch_size: DEFAULT_MODEL_BATCH_SIZE,
            n_concurrent_jobs: DEFAULT_CONCURRENT_JOBS,
            sleep_seconds: 0.0,
        }
    }

    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    pub fn with_batch_size(mut self, model_batch_size: usize) -> Self {
        self.model_batch_size = model_batch_size.max(1);
        self
    }

    pub fn with_concurrency(mut self, n_concurrent_jobs: usize) -> Self {
        self.n_concurrent_jobs = n_concurrent_jobs.max(1);
        self
    }

    /// Inter-group pacing between embedding dispatches
    pub fn with_sleep_seconds(mut self, sleep_seconds: f64) -> Self {
        self.sleep_seconds = sleep_seconds.max(0.0);
        self
    }

    fn invoker(&self) -> BoundedInvoker {
        BoundedInvoker::new(
            self.n_concurrent_jobs,
            RetryPolicy::default(),
            Duration::from_secs_f64(self.sleep_seconds),
        )
    }
}

impl EmbeddingModel for OpenAiEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total = texts.len();
        let batches = partition_batches(texts.to_vec(), self.model_batch_size);
        debug!(
            "embedding {total} texts in {} batches of up to {}",
            batches.len(),
            self.model_batch_size
        );

        let mut outcomes: Vec<BatchOutcome<Vec<f32>>> = Vec::with_capacity(batches.len());
        let mut embedded = 0usize;
        self.invoker()
            .run_batches(
                batches,
                |batch| async move { self.client.embeddings(&self.model_name, &batch).await },
                |group| {
                    for outcome in &group {
                        if let Ok(vectors) = &outcome.result {
                            embedded += vectors.len();
                        }
                    }
                    info!("embedded {embedded}/{total} texts");
                    outcomes.extend(group);
                    Ok::<(), ModelError>(())
                },
            )
            .await?;

        // Any failed batch fails the whole embed call; the caller's batch is
        // the retry unit, not individual texts.
        outcomes.sort_by_key(|outcome| outcome.index);
        let mut embeddings = Vec::with_capacity(total);
        for outcome in outcomes {
            embeddings.extend(outcome.result?);
        }
        Ok(embeddings)
    }
}

/// Local embedding model backed by fastembed; useful for offline runs and
/// tests that should not touch the network.
pub struct FastembedEmbeddingModel {
    inner: Mutex<fastembed::TextEmbedding>,
}

impl FastembedEmbeddingModel {
    pub fn new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|err| ModelError::Embedding(err.to_string()))?;
        Ok(Self {
            inner: Mutex::new(model),
        })
    }
}

impl EmbeddingModel for FastembedEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut model = self
            .inner
            .lock()
            .map_err(|_| ModelError::Embedding("embedding model lock poisoned".to_string()))?;
        model
            .embed(texts.to_vec(), None)
            .map_err(|err| ModelError::Embedding(err.to_string()))
    }
}
