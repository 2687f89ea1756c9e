//! JSONL checkpoint files: one record per line, one file per stage, plus a
//! sibling error file derived from the stage filename.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt checkpoint {file} at line {line}: {source}")]
    CorruptCheckpoint {
        file: String,
        line: usize,
        source: serde_json::Error,
    },
}

/// Derive the companion error-log filename from a stage's result filename:
/// `"clusters.jsonl"` becomes `"clusters_errors.jsonl"`; a name without the
/// extension gets `"_errors.jsonl"` appended verbatim.
pub fn error_checkpoint_name(filename: &str) -> String {
    match filename.strip_suffix(".jsonl") {
        Some(stem) => format!("{stem}_errors.jsonl"),
        None => format!("{filename}_errors.jsonl"),
    }
}

/// Durable store for stage outputs and per-batch failures.
///
/// Records are only ever appended; reprocessing produces new records, never
/// edits of old ones. When disabled, loads return empty and appends are
/// no-ops so the pipeline runs fully in-memory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    root: PathBuf,
    enabled: bool,
}

impl CheckpointManager {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Result<Self, StoreError> {
        let root = root.into();
        if enabled {
            std::fs::create_dir_all(&root)?;
            info!("checkpoints enabled at {}", root.display());
        }
        Ok(Self { root, enabled })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    /// Load every record previously persisted under `filename`.
    ///
    /// Returns an empty vec when the file does not exist or checkpointing is
    /// disabled. A line that cannot be parsed as `T` is fatal for the stage.
    pub fn load_checkpoint<T: DeserializeOwned>(
        &self,
        filename: &str,
    ) -> Result<Vec<T>, StoreError> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let path = self.path_for(filename);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record =
                serde_json::from_str(&line).map_err(|source| StoreError::CorruptCheckpoint {
                    file: filename.to_string(),
                    line: index + 1,
                    source,
                })?;
            records.push(record);
        }

        debug!("loaded {} records from {}", records.len(), filename);
        Ok(records)
    }

    /// Append `records` to `filename` in one pass. Never rewrites prior
    /// lines; a no-op when disabled or when there is nothing to write.
    pub fn append_checkpoint<T: Serialize>(
        &self,
        filename: &str,
        records: &[T],
    ) -> Result<(), StoreError> {
        if !self.enabled || records.is_empty() {
            return Ok(());
        }

        let path = self.path_for(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(writer, "{json}")?;
        }
        writer.flush()?;

        debug!("appended {} records to {}", records.len(), filename);
        Ok(())
    }
}
