use crate::data::{is_missing_marker, normalize_identifier, loader::Table, GENE_COLUMN};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Central-tendency statistic carried by a reference universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatisticKind {
    Mean,
    Median,
}

impl StatisticKind {
    /// Header of the statistic column in reference files
    pub fn column_name(&self) -> &'static str {
        match self {
            StatisticKind::Mean => "Mean",
            StatisticKind::Median => "Median",
        }
    }
}

impl std::fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column_name().to_lowercase())
    }
}

/// A reference gene and its precomputed statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGene {
    pub gene: String,
    /// `None` when the reference file has no value for this gene
    pub statistic: Option<f64>,
}

/// Fixed, ordered gene list a model expects as its feature vector
#[derive(Debug, Clone)]
pub struct ReferenceUniverse {
    kind: StatisticKind,
    genes: Vec<ReferenceGene>,
}

impl ReferenceUniverse {
    pub fn new(kind: StatisticKind, genes: Vec<ReferenceGene>) -> Self {
        let genes = genes
            .into_iter()
            .map(|g| ReferenceGene {
                gene: normalize_identifier(&g.gene),
                statistic: g.statistic.filter(|v| v.is_finite()),
            })
            .collect();
        Self { kind, genes }
    }

    /// Convenience constructor from `(gene, statistic)` pairs
    pub fn from_pairs(kind: StatisticKind, pairs: &[(&str, f64)]) -> Self {
        Self::new(
            kind,
            pairs
                .iter()
                .map(|&(gene, statistic)| ReferenceGene {
                    gene: gene.to_string(),
                    statistic: Some(statistic),
                })
                .collect(),
        )
    }

    /// Build from a table with a `Gene` column and a `Mean`/`Median` column.
    /// Unknown columns (such as a stored row index) are ignored.
    pub fn from_table(table: &Table, kind: StatisticKind) -> Result<Self> {
        let gene_idx = table.require_column(GENE_COLUMN, "reference universe")?;
        let stat_idx = table.require_column(kind.column_name(), "reference universe")?;

        let mut genes = Vec::with_capacity(table.records.len());
        for (line, record) in table.records.iter().enumerate() {
            let gene = record.get(gene_idx).unwrap_or("").trim();
            if gene.is_empty() {
                return Err(PrepError::Malformed(format!(
                    "reference universe row {} has an empty gene identifier",
                    line + 2
                )));
            }
            let raw = record.get(stat_idx).unwrap_or("");
            let statistic = if is_missing_marker(raw) {
                None
            } else {
                Some(raw.trim().parse::<f64>().map_err(|_| PrepError::DataIntegrity {
                    gene: gene.to_string(),
                    detail: format!("{} statistic '{}' is not numeric", kind, raw),
                })?)
            };
            genes.push(ReferenceGene {
                gene: gene.to_string(),
                statistic,
            });
        }

        let universe = Self::new(kind, genes);
        let missing = universe.genes.iter().filter(|g| g.statistic.is_none()).count();
        if missing > 0 {
            warn!("Reference universe has {} genes without a {} statistic", missing, kind);
        }
        info!("Reference universe loaded: {} genes ({})", universe.len(), kind);
        Ok(universe)
    }

    pub fn kind(&self) -> StatisticKind {
        self.kind
    }

    pub fn genes(&self) -> &[ReferenceGene] {
        &self.genes
    }

    pub fn gene_ids(&self) -> impl Iterator<Item = &str> {
        self.genes.iter().map(|g| g.gene.as_str())
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Identifiers occurring more than once, with their counts
    pub fn repeated_genes(&self) -> HashMap<&str, usize> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for gene in self.gene_ids() {
            *counts.entry(gene).or_default() += 1;
        }
        counts.retain(|_, n| *n > 1);
        counts
    }
}
