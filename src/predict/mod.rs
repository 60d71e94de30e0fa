//! Contract with the external dependency-prediction engines.
//!
//! No model ships with this crate. A model wraps itself in
//! [`DependencyPredictor`] and receives exactly what the preparation
//! pipeline produced for its path.

use crate::data::writer::write_labeled;
use crate::data::NormalizedExpressionMatrix;
use crate::pipeline::{ModelPath, PreparedInput};
use crate::reference::FingerprintMatrix;
use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Header of the dependency-gene column in exported predictions
pub const DEPENDENCY_COLUMN: &str = "DepOI";

/// A trained dependency model
pub trait DependencyPredictor: Send + Sync {
    fn name(&self) -> &str;

    /// Path whose prepared matrices this model accepts
    fn model_path(&self) -> ModelPath;

    fn predict(
        &self,
        matrix: &NormalizedExpressionMatrix,
        fingerprint: Option<&FingerprintMatrix>,
    ) -> Result<DependencyPredictions>;
}

/// Predicted score for one dependency gene in one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyScore {
    pub sample: String,
    pub dependency_gene: String,
    pub score: f64,
}

/// Dependency gene x sample score table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyPredictions {
    dependency_genes: Vec<String>,
    samples: Vec<String>,
    scores: Vec<Vec<f64>>,
}

impl DependencyPredictions {
    pub fn new(dependency_genes: Vec<String>, samples: Vec<String>, scores: Vec<Vec<f64>>) -> Result<Self> {
        ensure!(
            scores.len() == dependency_genes.len(),
            "{} score rows for {} dependency genes",
            scores.len(),
            dependency_genes.len()
        );
        if let Some((i, row)) = scores.iter().enumerate().find(|(_, r)| r.len() != samples.len()) {
            bail!(
                "dependency gene '{}' has {} scores for {} samples",
                dependency_genes[i],
                row.len(),
                samples.len()
            );
        }
        Ok(Self {
            dependency_genes,
            samples,
            scores,
        })
    }

    pub fn dependency_genes(&self) -> &[String] {
        &self.dependency_genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn scores(&self) -> &[Vec<f64>] {
        &self.scores
    }

    pub fn get(&self, dependency_gene: &str, sample: &str) -> Option<f64> {
        let row = self.dependency_genes.iter().position(|g| g == dependency_gene)?;
        let col = self.samples.iter().position(|s| s == sample)?;
        Some(self.scores[row][col])
    }

    /// Scores for one sample, in dependency-gene order
    pub fn sample_scores(&self, sample: &str) -> Vec<DependencyScore> {
        let Some(col) = self.samples.iter().position(|s| s == sample) else {
            return Vec::new();
        };
        self.dependency_genes
            .iter()
            .zip(&self.scores)
            .map(|(gene, row)| DependencyScore {
                sample: sample.to_string(),
                dependency_gene: gene.clone(),
                score: row[col],
            })
            .collect()
    }

    /// Export to CSV format
    pub fn to_csv(&self) -> Result<String> {
        let mut out = Vec::new();
        write_labeled(
            &mut out,
            b',',
            DEPENDENCY_COLUMN,
            &self.samples,
            &self.dependency_genes,
            &self.scores,
        )?;
        Ok(String::from_utf8(out)?)
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_csv()?)
            .with_context(|| format!("Failed to write predictions to {:?}", path))
    }

    pub fn summary(&self) -> PredictionSummary {
        PredictionSummary::from_predictions(self)
    }
}

/// Prediction summary statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictionSummary {
    pub total_scores: usize,
    pub num_dependency_genes: usize,
    pub num_samples: usize,
    pub mean_score: f64,
    pub min_score: f64,
    pub max_score: f64,
}

impl PredictionSummary {
    pub fn from_predictions(predictions: &DependencyPredictions) -> Self {
        let all: Vec<f64> = predictions.scores.iter().flatten().copied().collect();
        if all.is_empty() {
            return Self {
                num_dependency_genes: predictions.dependency_genes.len(),
                num_samples: predictions.samples.len(),
                ..Self::default()
            };
        }
        Self {
            total_scores: all.len(),
            num_dependency_genes: predictions.dependency_genes.len(),
            num_samples: predictions.samples.len(),
            mean_score: all.iter().sum::<f64>() / all.len() as f64,
            min_score: all.iter().copied().fold(f64::INFINITY, f64::min),
            max_score: all.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    pub fn print(&self) {
        println!("\n=== Prediction Summary ===");
        println!("Total scores: {}", self.total_scores);
        println!("Dependency genes: {}", self.num_dependency_genes);
        println!("Number of samples: {}", self.num_samples);
        println!("Average score: {:.4}", self.mean_score);
        println!("Score range: [{:.4}, {:.4}]", self.min_score, self.max_score);
        println!("==========================\n");
    }
}

/// Hand a prepared input to a model. The fingerprint is passed only on the
/// neural-network path.
pub fn predict_prepared(
    predictor: &dyn DependencyPredictor,
    prepared: &PreparedInput,
) -> Result<DependencyPredictions> {
    ensure!(
        predictor.model_path() == prepared.model_path,
        "model '{}' expects {} input but the matrix was prepared for {}",
        predictor.name(),
        predictor.model_path(),
        prepared.model_path
    );

    let fingerprint = if prepared.model_path.uses_fingerprint() {
        let fingerprint = prepared
            .fingerprint
            .as_ref()
            .context("neural-network input is missing its fingerprint matrix")?;
        Some(fingerprint)
    } else {
        None
    };

    let predictions = predictor
        .predict(&prepared.matrix, fingerprint)
        .with_context(|| format!("Model '{}' failed", predictor.name()))?;

    ensure!(
        predictions.samples() == prepared.matrix.samples(),
        "model '{}' returned scores for samples {:?}, expected {:?}",
        predictor.name(),
        predictions.samples(),
        prepared.matrix.samples()
    );

    info!(
        "Model '{}' scored {} dependency genes across {} samples",
        predictor.name(),
        predictions.dependency_genes().len(),
        predictions.samples().len()
    );
    Ok(predictions)
}
