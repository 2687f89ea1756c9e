//! The stage runner: batch, filter, invoke, persist, resume.

use crate::error::PipelineError;
use chorus_core::{
    partition_batches, BatchItem, BatchKey, Cluster, ClusteringError, Conversation,
    ConversationSummary, FailureRecord, MetaClusteringError, ProjectedCluster,
    SummarisationError,
};
use chorus_models::{
    BatchOutcome, BoundedInvoker, ClusterModel, DimensionalityModel, MetaClusterModel,
    ModelError, RetryPolicy, SummaryModel,
};
use chorus_store::{error_checkpoint_name, CheckpointManager};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Knobs shared by every batched stage
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Items per model invocation
    pub batch_size: usize,
    /// Inter-group pacing delay, to respect external rate limits
    pub sleep_seconds: f64,
    /// Concurrency cap for in-flight model calls
    pub n_concurrent_jobs: usize,
    /// Retry ceiling and inter-attempt delay for one batch invocation
    pub retry: RetryPolicy,
    /// Batch keys to exclude up front, in addition to the error checkpoint
    pub processed_keys: Option<HashSet<BatchKey>>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            sleep_seconds: 0.0,
            n_concurrent_jobs: 5,
            retry: RetryPolicy::default(),
            processed_keys: None,
        }
    }
}

impl StageOptions {
    fn pacing(&self) -> Duration {
        if self.sleep_seconds > 0.0 {
            Duration::from_secs_f64(self.sleep_seconds)
        } else {
            Duration::ZERO
        }
    }
}

/// Summarise conversations, resuming from the model's checkpoint.
///
/// Conversations already covered by checkpointed summaries are not re-sent;
/// batches whose key appears in the error checkpoint are skipped outright.
pub async fn summarise_conversations<M: SummaryModel>(
    conversations: Vec<Conversation>,
    model: &M,
    options: &StageOptions,
    checkpoints: Option<&CheckpointManager>,
    on_batch_complete: Option<&mut dyn FnMut(&[ConversationSummary], &[SummarisationError])>,
) -> Result<Vec<ConversationSummary>, PipelineError> {
    run_batched_stage(
        "summarise",
        conversations,
        model.checkpoint_filename(),
        options,
        checkpoints,
        |summary: &ConversationSummary| vec![summary.chat_id.clone()],
        |batch| async move { model.summarise(&batch).await },
        on_batch_complete,
    )
    .await
}

/// Aggregate summaries into base clusters, resuming from the model's
/// checkpoint. A summary is considered processed once any checkpointed
/// cluster references its chat id.
pub async fn generate_base_clusters_from_conversation_summaries<M: ClusterModel>(
    summaries: Vec<ConversationSummary>,
    model: &M,
    options: &StageOptions,
    checkpoints: Option<&CheckpointManager>,
    on_batch_complete: Option<&mut dyn FnMut(&[Cluster], &[ClusteringError])>,
) -> Result<Vec<Cluster>, PipelineError> {
    run_batched_stage(
        "cluster",
        summaries,
        model.checkpoint_filename(),
        options,
        checkpoints,
        |cluster: &Cluster| cluster.chat_ids.clone(),
        |batch| async move { model.cluster_summaries(&batch).await },
        on_batch_complete,
    )
    .await
}

/// Reduce base clusters into a shallower hierarchy, resuming from the
/// model's checkpoint.
pub async fn reduce_clusters_from_base_clusters<M: MetaClusterModel>(
    clusters: Vec<Cluster>,
    model: &M,
    options: &StageOptions,
    checkpoints: Option<&CheckpointManager>,
    on_batch_complete: Option<&mut dyn FnMut(&[Cluster], &[MetaClusteringError])>,
) -> Result<Vec<Cluster>, PipelineError> {
    run_batched_stage(
        "meta-cluster",
        clusters,
        model.checkpoint_filename(),
        options,
        checkpoints,
        |cluster: &Cluster| vec![cluster.id.clone()],
        |batch| async move { model.reduce_clusters(&batch).await },
        on_batch_complete,
    )
    .await
}

/// Project the cluster hierarchy to 2D. Terminal stage: all-or-nothing, no
/// batching and no error log; an existing checkpoint is returned as-is.
pub async fn reduce_dimensionality_from_clusters<M: DimensionalityModel>(
    clusters: Vec<Cluster>,
    model: &M,
    checkpoints: Option<&CheckpointManager>,
) -> Result<Vec<ProjectedCluster>, PipelineError> {
    if let Some(manager) = checkpoints {
        let prior: Vec<ProjectedCluster> = manager.load_checkpoint(model.checkpoint_filename())?;
        if !prior.is_empty() {
            info!("dimensionality: {} projected clusters already checkpointed", prior.len());
            return Ok(prior);
        }
    }

    let projected = model.project(&clusters).await?;
    if let Some(manager) = checkpoints {
        manager.append_checkpoint(model.checkpoint_filename(), &projected)?;
    }
    Ok(projected)
}

/// Shared stage machinery.
///
/// `covered_ids` maps a checkpointed result back to the input identifiers it
/// accounts for, so a resumed run can drop inputs that are already done.
#[allow(clippy::too_many_arguments)]
async fn run_batched_stage<I, T, E, C, F, Fut>(
    stage: &str,
    items: Vec<I>,
    filename: &str,
    options: &StageOptions,
    checkpoints: Option<&CheckpointManager>,
    covered_ids: C,
    op: F,
    mut on_batch_complete: Option<&mut dyn FnMut(&[T], &[E])>,
) -> Result<Vec<T>, PipelineError>
where
    I: BatchItem + Clone,
    T: Serialize + DeserializeOwned,
    E: FailureRecord,
    C: Fn(&T) -> Vec<String>,
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ModelError>>,
{
    let error_filename = error_checkpoint_name(filename);

    let prior: Vec<T> = match checkpoints {
        Some(manager) => manager.load_checkpoint(filename)?,
        None => Vec::new(),
    };
    let prior_errors: Vec<E> = match checkpoints {
        Some(manager) => manager.load_checkpoint(&error_filename)?,
        None => Vec::new(),
    };

    // The negative cache: batches with these keys are never re-invoked.
    // Clearing the error checkpoint externally is the only way back in.
    let mut failed_keys: HashSet<BatchKey> = prior_errors
        .iter()
        .map(|record| BatchKey::from_ids(record.failed_ids().iter().cloned()))
        .collect();
    if let Some(processed) = &options.processed_keys {
        failed_keys.extend(processed.iter().cloned());
    }

    let total_items = items.len();
    let done: HashSet<String> = prior.iter().flat_map(&covered_ids).collect();
    let pending: Vec<I> = items
        .into_iter()
        .filter(|item| !done.contains(item.item_id()))
        .collect();
    if pending.len() < total_items {
        info!(
            "{stage}: {} of {total_items} items already checkpointed",
            total_items - pending.len()
        );
    }

    let mut keys = Vec::new();
    let mut to_run = Vec::new();
    let mut skipped = 0usize;
    for batch in partition_batches(pending, options.batch_size) {
        let key = BatchKey::from_items(&batch);
        if failed_keys.contains(&key) {
            skipped += 1;
            continue;
        }
        keys.push(key);
        to_run.push(batch);
    }
    if skipped > 0 {
        info!("{stage}: skipping {skipped} previously failed batches");
    }

    if to_run.is_empty() {
        return Ok(prior);
    }

    let invoker = BoundedInvoker::new(
        options.n_concurrent_jobs,
        options.retry.clone(),
        options.pacing(),
    );

    let total_batches = to_run.len();
    let mut completed = 0usize;
    let mut new_results: Vec<T> = Vec::new();
    let mut new_failures = 0usize;

    invoker
        .run_batches(to_run, op, |group: Vec<BatchOutcome<T>>| {
            let mut per_batch: Vec<(Vec<T>, Vec<E>)> = Vec::with_capacity(group.len());
            for outcome in group {
                completed += 1;
                match outcome.result {
                    Ok(results) => per_batch.push((results, Vec::new())),
                    Err(err) => {
                        warn!("{stage}: batch [{}] failed: {err}", keys[outcome.index]);
                        let record =
                            E::from_failure(keys[outcome.index].ids().to_vec(), err.to_string());
                        per_batch.push((Vec::new(), vec![record]));
                    }
                }
            }

            // Nothing from this group is written until every batch in it
            // has resolved; a killed process loses at most one group.
            if let Some(manager) = checkpoints {
                let results: Vec<&T> = per_batch.iter().flat_map(|(r, _)| r).collect();
                let errors: Vec<&E> = per_batch.iter().flat_map(|(_, e)| e).collect();
                manager.append_checkpoint(filename, &results)?;
                manager.append_checkpoint(&error_filename, &errors)?;
            }

            info!("{stage}: {completed}/{total_batches} batches");
            if let Some(callback) = on_batch_complete.as_deref_mut() {
                for (results, errors) in &per_batch {
                    callback(results.as_slice(), errors.as_slice());
                }
            }

            for (results, errors) in per_batch {
                new_results.extend(results);
                new_failures += errors.len();
            }
            Ok::<(), PipelineError>(())
        })
        .await?;

    info!(
        "{stage}: finished with {} new results, {new_failures} new failures",
        new_results.len()
    );

    let mut all = prior;
    all.extend(new_results);
    Ok(all)
}
