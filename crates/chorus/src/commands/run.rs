use crate::cli::RunArgs;
use anyhow::Context;
use chorus_core::Conversation;
use chorus_models::{
    EmbeddingModel, FastembedEmbeddingModel, KmeansClusterModel, OpenAiClient, OpenAiConfig,
    OpenAiEmbeddingModel, OpenAiMetaClusterModel, OpenAiSummaryModel, SpectralProjectionModel,
};
use chorus_pipeline::{
    generate_base_clusters_from_conversation_summaries, reduce_clusters_from_base_clusters,
    reduce_dimensionality_from_clusters, summarise_conversations, StageOptions,
};
use chorus_store::CheckpointManager;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::info;

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let conversations = load_conversations(&args.input, args.limit)?;
    info!(
        "loaded {} conversations from {}",
        conversations.len(),
        args.input
    );

    let mut config = OpenAiConfig::from_env()?;
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    let client = OpenAiClient::new(config);

    let checkpoints = CheckpointManager::new(&args.checkpoint_dir, !args.no_checkpoints)?;
    let options = StageOptions {
        batch_size: args.batch_size,
        sleep_seconds: args.sleep_seconds,
        n_concurrent_jobs: args.concurrency,
        ..Default::default()
    };

    if args.local_embeddings {
        let embedding = FastembedEmbeddingModel::new()?;
        run_stages(conversations, client, embedding, &checkpoints, &options, &args).await
    } else {
        let embedding =
            OpenAiEmbeddingModel::new(client.clone()).with_sleep_seconds(args.sleep_seconds);
        run_stages(conversations, client, embedding, &checkpoints, &options, &args).await
    }
}

async fn run_stages<E: EmbeddingModel>(
    conversations: Vec<Conversation>,
    client: OpenAiClient,
    embedding: E,
    checkpoints: &CheckpointManager,
    options: &StageOptions,
    args: &RunArgs,
) -> anyhow::Result<()> {
    let summary_model = OpenAiSummaryModel::new(client.clone());
    let summaries =
        summarise_conversations(conversations, &summary_model, options, Some(checkpoints), None)
            .await?;
    info!("stage complete: {} summaries", summaries.len());

    let cluster_model = KmeansClusterModel::new(client.clone(), &embedding);
    let clusters = generate_base_clusters_from_conversation_summaries(
        summaries,
        &cluster_model,
        options,
        Some(checkpoints),
        None,
    )
    .await?;
    info!("stage complete: {} base clusters", clusters.len());

    let meta_model =
        OpenAiMetaClusterModel::new(client, &embedding).with_max_clusters(args.max_clusters);
    let reduced = reduce_clusters_from_base_clusters(
        clusters,
        &meta_model,
        options,
        Some(checkpoints),
        None,
    )
    .await?;
    info!("stage complete: {} clusters in hierarchy", reduced.len());

    let projection_model = SpectralProjectionModel::new(&embedding);
    let projected =
        reduce_dimensionality_from_clusters(reduced, &projection_model, Some(checkpoints)).await?;

    let roots = projected
        .iter()
        .filter(|p| p.cluster.parent_id.is_none())
        .count();
    println!(
        "{} projected clusters ({} roots) under {}",
        projected.len(),
        roots,
        args.checkpoint_dir
    );
    Ok(())
}

fn load_conversations(path: &str, limit: Option<usize>) -> anyhow::Result<Vec<Conversation>> {
    let file = File::open(path).with_context(|| format!("opening {path}"))?;
    let reader = BufReader::new(file);

    let mut conversations = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let conversation: Conversation = serde_json::from_str(&line)
            .with_context(|| format!("parsing {path} line {}", index + 1))?;
        conversations.push(conversation);
        if limit.is_some_and(|n| conversations.len() >= n) {
            break;
        }
    }
    Ok(conversations)
}
