//! 2D projection of the cluster hierarchy.
//!
//! Embeds each cluster's name and description and projects onto the two
//! principal components via power iteration. Deterministic by construction;
//! cartographic quality is out of scope.

use crate::error::{ModelError, Result};
use crate::traits::{DimensionalityModel, EmbeddingModel};
use chorus_core::{cluster_levels, Cluster, ProjectedCluster};
use tracing::info;

const POWER_ITERATIONS: usize = 50;

pub struct SpectralProjectionModel<E> {
    embedding: E,
}

impl<E: EmbeddingModel> SpectralProjectionModel<E> {
    pub fn new(embedding: E) -> Self {
        Self { embedding }
    }
}

impl<E: EmbeddingModel> DimensionalityModel for SpectralProjectionModel<E> {
    fn checkpoint_filename(&self) -> &str {
        "dimensionality.jsonl"
    }

    async fn project(&self, clusters: &[Cluster]) -> Result<Vec<ProjectedCluster>> {
        if clusters.is_empty() {
            return Ok(Vec::new());
        }

        let levels =
            cluster_levels(clusters).map_err(|err| ModelError::Projection(err.to_string()))?;

        let texts: Vec<String> = clusters
            .iter()
            .map(|c| format!("{}: {}", c.name, c.description))
            .collect();
        let embeddings = self.embedding.embed(&texts).await?;

        let centered = center(&embeddings);
        let first = principal_direction(&centered, None);
        let second = principal_direction(&centered, Some(&first));

        let projected = clusters
            .iter()
            .zip(&centered)
            .map(|(cluster, row)| ProjectedCluster {
                cluster: cluster.clone(),
                x_coord: dot(row, &first),
                y_coord: dot(row, &second),
                level: levels.get(&cluster.id).copied().unwrap_or(0),
            })
            .collect();

        info!("projected {} clusters to 2D", clusters.len());
        Ok(projected)
    }
}

fn center(rows: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dims = rows.first().map(Vec::len).unwrap_or(0);
    let mut mean = vec![0.0f32; dims];
    for row in rows {
        for (acc, component) in mean.iter_mut().zip(row) {
            *acc += component;
        }
    }
    for component in mean.iter_mut() {
        *component /= rows.len() as f32;
    }

    rows.iter()
        .map(|row| row.iter().zip(&mean).map(|(x, m)| x - m).collect())
        .collect()
}

/// Dominant eigenvector of the covariance of `rows`, optionally after
/// deflating a previously found direction. Starts from a fixed seed vector
/// so repeated runs agree.
fn principal_direction(rows: &[Vec<f32>], deflate: Option<&[f32]>) -> Vec<f32> {
    let dims = rows.first().map(Vec::len).unwrap_or(0);
    if dims == 0 {
        return Vec::new();
    }

    let rows: Vec<Vec<f32>> = match deflate {
        Some(direction) => rows
            .iter()
            .map(|row| {
                let along = dot(row, direction);
                row.iter()
                    .zip(direction)
                    .map(|(x, d)| x - along * d)
                    .collect()
            })
            .collect(),
        None => rows.to_vec(),
    };

    let mut direction = vec![1.0f32 / (dims as f32).sqrt(); dims];
    for _ in 0..POWER_ITERATIONS {
        let mut next = vec![0.0f32; dims];
        for row in &rows {
            let along = dot(row, &direction);
            for (acc, component) in next.iter_mut().zip(row) {
                *acc += along * component;
            }
        }

        let norm = dot(&next, &next).sqrt();
        if norm < f32::EPSILON {
            // Degenerate spread (e.g. a single cluster); keep the seed axis.
            break;
        }
        for component in next.iter_mut() {
            *component /= norm;
        }
        direction = next;
    }
    direction
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
