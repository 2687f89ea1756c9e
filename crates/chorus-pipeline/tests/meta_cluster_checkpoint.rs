mod common;

use chorus_core::{build_cluster_tree, FailureRecord, MetaClusteringError};
use chorus_models::RetryPolicy;
use chorus_pipeline::{reduce_clusters_from_base_clusters, StageOptions};
use chorus_store::CheckpointManager;
use common::{cluster, ScriptedMetaClusterModel};
use std::time::Duration;

fn options() -> StageOptions {
    StageOptions {
        retry: RetryPolicy {
            max_attempts: 1,
            delay: Duration::ZERO,
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn test_meta_cluster_failure_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CheckpointManager::new(dir.path(), true).unwrap();

    let model = ScriptedMetaClusterModel::failing();
    let results = reduce_clusters_from_base_clusters(
        vec![cluster("a", &["1"])],
        &model,
        &options(),
        Some(&manager),
        None,
    )
    .await
    .unwrap();

    assert!(results.is_empty());
    let errors: Vec<MetaClusteringError> = manager
        .load_checkpoint("meta_clusters_errors.jsonl")
        .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].failed_ids(), ["a".to_string()]);
    assert!(errors[0].message().contains("scripted failure"));
}

#[tokio::test]
async fn test_reduction_forms_a_tree() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CheckpointManager::new(dir.path(), true).unwrap();

    let model = ScriptedMetaClusterModel::new();
    let results = reduce_clusters_from_base_clusters(
        vec![cluster("a", &["1"]), cluster("b", &["2"])],
        &model,
        &options(),
        Some(&manager),
        None,
    )
    .await
    .unwrap();

    // Two children re-emitted under one new parent.
    assert_eq!(results.len(), 3);
    let roots = build_cluster_tree(&results).unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].children.len(), 2);
}

#[tokio::test]
async fn test_rerun_returns_checkpoint_without_invoking() {
    let dir = tempfile::tempdir().unwrap();
    let manager = CheckpointManager::new(dir.path(), true).unwrap();

    let first = ScriptedMetaClusterModel::new();
    let inputs = vec![cluster("a", &["1"]), cluster("b", &["2"])];
    let first_results = reduce_clusters_from_base_clusters(
        inputs.clone(),
        &first,
        &options(),
        Some(&manager),
        None,
    )
    .await
    .unwrap();

    let second = ScriptedMetaClusterModel::new();
    let second_results =
        reduce_clusters_from_base_clusters(inputs, &second, &options(), Some(&manager), None)
            .await
            .unwrap();

    assert_eq!(second.call_count(), 0);
    assert_eq!(second_results.len(), first_results.len());
}
