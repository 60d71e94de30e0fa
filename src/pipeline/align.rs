//! Reference Aligner: left join of the reference universe against the
//! resolved upload.
//!
//! Every reference row appears exactly once, in reference order. Upload rows
//! whose key is outside the universe are dropped; reference genes absent
//! from the upload stay missing until imputation.

use crate::data::UploadedExpressionMatrix;
use crate::error::{PrepError, Result};
use crate::pipeline::config::DedupExemptions;
use crate::reference::ReferenceUniverse;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Reference-ordered matrix that may still contain missing cells
#[derive(Debug, Clone)]
pub struct AlignedMatrix {
    genes: Vec<String>,
    samples: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl AlignedMatrix {
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn cells(&self) -> &[Vec<Option<f64>>] {
        &self.cells
    }

    pub fn n_missing(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_none()).count()
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>, Vec<Vec<Option<f64>>>) {
        (self.genes, self.samples, self.cells)
    }
}

/// Counts over one alignment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlignmentSummary {
    pub reference_rows: usize,
    /// Reference rows filled from the upload
    pub matched_rows: usize,
    /// Reference rows with no upload counterpart
    pub missing_rows: usize,
    /// Upload rows removed as duplicates of an earlier key
    pub duplicate_rows: usize,
    /// Upload keys outside the universe, first occurrence order
    pub dropped_genes: Vec<String>,
}

pub struct ReferenceAligner<'a> {
    universe: &'a ReferenceUniverse,
    exemptions: &'a DedupExemptions,
}

impl<'a> ReferenceAligner<'a> {
    pub fn new(universe: &'a ReferenceUniverse, exemptions: &'a DedupExemptions) -> Self {
        Self {
            universe,
            exemptions,
        }
    }

    /// Align upload rows keyed by `keys` (one key per upload row, after
    /// resolution) onto the universe.
    pub fn align(
        &self,
        upload: &UploadedExpressionMatrix,
        keys: &[String],
    ) -> Result<(AlignedMatrix, AlignmentSummary)> {
        if keys.len() != upload.n_genes() {
            return Err(PrepError::Malformed(format!(
                "{} keys supplied for {} upload rows",
                keys.len(),
                upload.n_genes()
            )));
        }

        let reference: HashSet<&str> = self.universe.gene_ids().collect();
        let mut summary = AlignmentSummary {
            reference_rows: self.universe.len(),
            ..AlignmentSummary::default()
        };

        // Deduplicate on key, first occurrence wins; exempt keys keep every row.
        let mut rows_by_key: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut dropped = HashSet::new();
        for (i, key) in keys.iter().enumerate() {
            let rows = rows_by_key.entry(key.as_str()).or_default();
            if !rows.is_empty() && !self.exemptions.contains(key) {
                summary.duplicate_rows += 1;
                continue;
            }
            rows.push(i);
            if !reference.contains(key.as_str()) && dropped.insert(key.as_str()) {
                summary.dropped_genes.push(key.clone());
            }
        }
        if summary.duplicate_rows > 0 {
            debug!("Removed {} duplicate upload rows", summary.duplicate_rows);
        }

        let mut occurrence: HashMap<&str, usize> = HashMap::new();
        let mut cells = Vec::with_capacity(self.universe.len());
        for gene in self.universe.gene_ids() {
            let nth = occurrence.entry(gene).or_default();
            let source = rows_by_key.get(gene).and_then(|rows| {
                if self.exemptions.contains(gene) {
                    rows.get(*nth).or(rows.first())
                } else {
                    rows.first()
                }
            });
            *nth += 1;

            match source {
                Some(&row) => {
                    cells.push(self.coerce_row(upload, row)?);
                    summary.matched_rows += 1;
                }
                None => {
                    cells.push(vec![None; upload.n_samples()]);
                    summary.missing_rows += 1;
                }
            }
        }

        info!(
            "Aligned onto {} reference genes: matched={}, missing={}, dropped={}",
            summary.reference_rows,
            summary.matched_rows,
            summary.missing_rows,
            summary.dropped_genes.len()
        );

        let aligned = AlignedMatrix {
            genes: self.universe.gene_ids().map(str::to_string).collect(),
            samples: upload.samples().to_vec(),
            cells,
        };
        Ok((aligned, summary))
    }

    fn coerce_row(&self, upload: &UploadedExpressionMatrix, row: usize) -> Result<Vec<Option<f64>>> {
        upload
            .row(row)
            .iter()
            .zip(upload.samples())
            .map(|(cell, sample)| {
                cell.coerce().map_err(|value| PrepError::InputFormat {
                    gene: upload.genes()[row].clone(),
                    sample: sample.clone(),
                    value,
                })
            })
            .collect()
    }
}
