use chorus_core::{build_cluster_tree, Cluster, ClusterTreeNode};
use chorus_store::CheckpointManager;
use std::fmt::Write;

pub fn run(checkpoint_dir: &str) -> anyhow::Result<()> {
    let checkpoints = CheckpointManager::new(checkpoint_dir, true)?;

    let mut clusters: Vec<Cluster> = checkpoints.load_checkpoint("meta_clusters.jsonl")?;
    if clusters.is_empty() {
        clusters = checkpoints.load_checkpoint("clusters.jsonl")?;
    }
    if clusters.is_empty() {
        println!("no clusters checkpointed under {checkpoint_dir}");
        return Ok(());
    }

    let roots = build_cluster_tree(&clusters)?;
    print!("{}", render(&roots));
    Ok(())
}

fn render(roots: &[ClusterTreeNode]) -> String {
    let mut out = String::new();
    for root in roots {
        render_node(&mut out, root, 0);
    }
    out
}

fn render_node(out: &mut String, node: &ClusterTreeNode, depth: usize) {
    let _ = writeln!(
        out,
        "{}{} ({} conversations)",
        "  ".repeat(depth),
        node.name,
        node.count
    );
    for child in &node.children {
        render_node(out, child, depth + 1);
    }
}
