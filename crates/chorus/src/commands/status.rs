use chorus_store::error_checkpoint_name;
use std::io::{BufRead, BufReader};
use std::path::Path;

const STAGES: [(&str, &str); 4] = [
    ("summaries", "summaries.jsonl"),
    ("clusters", "clusters.jsonl"),
    ("meta-clusters", "meta_clusters.jsonl"),
    ("dimensionality", "dimensionality.jsonl"),
];

pub fn run(checkpoint_dir: &str) -> anyhow::Result<()> {
    let root = Path::new(checkpoint_dir);
    if !root.exists() {
        println!("no checkpoints under {checkpoint_dir}");
        return Ok(());
    }

    for (stage, filename) in STAGES {
        let records = count_records(&root.join(filename))?;
        let failures = count_records(&root.join(error_checkpoint_name(filename)))?;
        println!("{stage:>14}: {records} records, {failures} failed batches");
    }
    Ok(())
}

fn count_records(path: &Path) -> anyhow::Result<usize> {
    if !path.exists() {
        return Ok(0);
    }

    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut count = 0usize;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}
