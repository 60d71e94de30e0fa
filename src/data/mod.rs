pub mod loader;
pub mod writer;

use crate::error::{PrepError, Result};
use std::collections::HashSet;

/// Header of the gene-key column in every table this crate writes
pub const GENE_COLUMN: &str = "Gene";

/// Prefix carried by every Ensembl gene identifier
pub const ENSEMBL_PREFIX: &str = "ENSG";

/// Cell contents treated as "no value" (compared after upper-casing)
pub const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NAN", "NONE", "NULL"];

/// Check whether a raw cell is one of the missing-value markers
pub fn is_missing_marker(raw: &str) -> bool {
    let upper = raw.trim().to_uppercase();
    MISSING_MARKERS.contains(&upper.as_str())
}

/// Case-fold a raw gene identifier the way every lookup table is keyed
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// A single uploaded expression cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Numeric value
    Value(f64),
    /// Empty or NA marker
    Missing,
    /// Text that did not parse as a number at load time
    Text(String),
}

impl Cell {
    /// Parse a raw text cell
    pub fn parse(raw: &str) -> Self {
        if is_missing_marker(raw) {
            return Cell::Missing;
        }
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Missing,
            Ok(v) => Cell::Value(v),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    /// Coerce to a numeric value; `Ok(None)` for missing cells, `Err` with the
    /// offending text when coercion is impossible.
    pub fn coerce(&self) -> std::result::Result<Option<f64>, String> {
        match self {
            Cell::Value(v) if v.is_finite() => Ok(Some(*v)),
            Cell::Value(v) => Err(v.to_string()),
            Cell::Missing => Ok(None),
            Cell::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| text.clone()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Cell::Missing
        } else {
            Cell::Value(value)
        }
    }
}

/// User-submitted expression matrix: rows keyed by raw gene identifier,
/// one column per sample. Identifiers are case-folded on insertion and may
/// repeat.
#[derive(Debug, Clone, Default)]
pub struct UploadedExpressionMatrix {
    genes: Vec<String>,
    samples: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl UploadedExpressionMatrix {
    /// Create an empty matrix with the given sample columns
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            genes: Vec::new(),
            samples,
            rows: Vec::new(),
        }
    }

    /// Build from numeric rows, mostly useful for callers that already hold
    /// parsed values
    pub fn from_values<S: AsRef<str>>(samples: &[S], rows: &[(&str, Vec<f64>)]) -> Result<Self> {
        let mut matrix = Self::new(samples.iter().map(|s| s.as_ref().to_string()).collect());
        for (gene, values) in rows {
            matrix.push_row(gene, values.iter().map(|&v| Cell::from(v)).collect())?;
        }
        Ok(matrix)
    }

    /// Append a row; the identifier is trimmed and upper-cased
    pub fn push_row(&mut self, gene: &str, cells: Vec<Cell>) -> Result<()> {
        if cells.len() != self.samples.len() {
            return Err(PrepError::Malformed(format!(
                "row '{}' has {} values but the matrix has {} samples",
                gene,
                cells.len(),
                self.samples.len()
            )));
        }
        self.genes.push(normalize_identifier(gene));
        self.rows.push(cells);
        Ok(())
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn row(&self, index: usize) -> &[Cell] {
        &self.rows[index]
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Identifiers with duplicates removed, first occurrence order kept
    pub fn unique_genes(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.genes
            .iter()
            .filter(|g| seen.insert(g.as_str()))
            .cloned()
            .collect()
    }
}

/// Reference-ordered, fully imputed expression matrix handed to a model
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedExpressionMatrix {
    genes: Vec<String>,
    samples: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl NormalizedExpressionMatrix {
    pub(crate) fn from_parts(genes: Vec<String>, samples: Vec<String>, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(genes.len(), values.len());
        Self {
            genes,
            samples,
            values,
        }
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Row-major values, one row per reference gene
    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.values
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Value for the first row keyed by `gene` in `sample`
    pub fn get(&self, gene: &str, sample: &str) -> Option<f64> {
        let row = self.genes.iter().position(|g| g == gene)?;
        let col = self.samples.iter().position(|s| s == sample)?;
        Some(self.values[row][col])
    }

    /// All values of one sample column, in reference order
    pub fn column(&self, sample: &str) -> Option<Vec<f64>> {
        let col = self.samples.iter().position(|s| s == sample)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }

    /// Whether any cell is NaN or infinite
    pub fn has_non_finite(&self) -> bool {
        self.values.iter().flatten().any(|v| !v.is_finite())
    }
}
