use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chorus")]
#[command(version)]
#[command(about = "Cluster conversational records into a navigable hierarchy")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline over a conversations JSONL file
    Run(RunArgs),

    /// Show per-stage record and failure counts
    Status {
        /// Checkpoint directory
        #[arg(short, long, default_value = "./checkpoints")]
        checkpoint_dir: String,
    },

    /// Print the cluster hierarchy from the latest checkpoint
    Tree {
        /// Checkpoint directory
        #[arg(short, long, default_value = "./checkpoints")]
        checkpoint_dir: String,
    },

    /// Print version information
    Version,
}

#[derive(Args)]
pub struct RunArgs {
    /// Conversations JSONL file, one conversation per line
    #[arg(short, long)]
    pub input: String,

    /// Checkpoint directory
    #[arg(short, long, default_value = "./checkpoints")]
    pub checkpoint_dir: String,

    /// Run fully in memory without persisting checkpoints
    #[arg(long)]
    pub no_checkpoints: bool,

    /// Items per model invocation
    #[arg(long, default_value_t = 100)]
    pub batch_size: usize,

    /// Concurrency cap for in-flight model calls
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Pacing delay between dispatch groups, in seconds
    #[arg(long, default_value_t = 0.0)]
    pub sleep_seconds: f64,

    /// Maximum number of root clusters after meta-clustering
    #[arg(long, default_value_t = 10)]
    pub max_clusters: usize,

    /// Chat model name (defaults to CHORUS_MODEL, then gpt-4o-mini)
    #[arg(long)]
    pub model: Option<String>,

    /// Embed locally with fastembed instead of the embeddings API
    #[arg(long)]
    pub local_embeddings: bool,

    /// Only process the first N conversations
    #[arg(long)]
    pub limit: Option<usize>,
}
