//! Per-request configuration.
//!
//! The calling layer submits three raw strings (`isLogTransformed`,
//! `expressionUnit`, `geneSetSelector`); [`PreprocessConfig::from_raw`]
//! validates them into typed options.

use crate::error::{PrepError, Result};
use crate::reference::StatisticKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Selector value returning the full default fingerprint
pub const DEFAULT_GENE_SET: &str = "default-gene-set";

/// Identifiers kept out of upload deduplication by default
pub const DEFAULT_DEDUP_EXEMPTIONS: &[&str] = &["1-MAR"];

/// Downstream model a matrix is prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelPath {
    /// Multi-input deep-learning model (expression + fingerprint)
    NeuralNetwork,
    /// Per-gene linear-regression ensemble
    ElasticNet,
}

impl ModelPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelPath::NeuralNetwork => "neural-network",
            ModelPath::ElasticNet => "elastic-net",
        }
    }

    /// Statistic the path's universe carries for imputation
    pub fn statistic_kind(&self) -> StatisticKind {
        match self {
            ModelPath::NeuralNetwork => StatisticKind::Mean,
            ModelPath::ElasticNet => StatisticKind::Median,
        }
    }

    /// Whether the path pairs the matrix with a fingerprint
    pub fn uses_fingerprint(&self) -> bool {
        matches!(self, ModelPath::NeuralNetwork)
    }
}

impl FromStr for ModelPath {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "neural-network" | "deepdep" | "nn" => Ok(ModelPath::NeuralNetwork),
            "elastic-net" | "elasticnet" | "en" => Ok(ModelPath::ElasticNet),
            other => Err(PrepError::config(format!("unknown model path '{}'", other))),
        }
    }
}

impl std::fmt::Display for ModelPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the uploaded values are already log-transformed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogState {
    Log,
    NotLog,
}

impl FromStr for LogState {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "log" => Ok(LogState::Log),
            "not-log" => Ok(LogState::NotLog),
            other => Err(PrepError::config(format!(
                "isLogTransformed must be 'log' or 'not-log', got '{}'",
                other
            ))),
        }
    }
}

/// Unit of the uploaded expression values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpressionUnit {
    Fpkm,
    Tpm,
}

impl FromStr for ExpressionUnit {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "FPKM" => Ok(ExpressionUnit::Fpkm),
            "TPM" => Ok(ExpressionUnit::Tpm),
            other => Err(PrepError::config(format!(
                "expressionUnit must be 'FPKM' or 'TPM', got '{}'",
                other
            ))),
        }
    }
}

/// Fingerprint scope for the neural-network path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GeneSetSelector {
    Default,
    Named(String),
}

impl FromStr for GeneSetSelector {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" => Err(PrepError::config("geneSetSelector must not be empty")),
            DEFAULT_GENE_SET => Ok(GeneSetSelector::Default),
            name => Ok(GeneSetSelector::Named(name.to_string())),
        }
    }
}

impl std::fmt::Display for GeneSetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneSetSelector::Default => write!(f, "{}", DEFAULT_GENE_SET),
            GeneSetSelector::Named(name) => write!(f, "{}", name),
        }
    }
}

/// Request configuration exactly as a calling layer submits it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPreprocessConfig {
    pub is_log_transformed: String,
    pub expression_unit: String,
    #[serde(default = "default_gene_set")]
    pub gene_set_selector: String,
}

fn default_gene_set() -> String {
    DEFAULT_GENE_SET.to_string()
}

impl RawPreprocessConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Values already log-transformed, in TPM, default fingerprint
impl Default for RawPreprocessConfig {
    fn default() -> Self {
        Self {
            is_log_transformed: "log".to_string(),
            expression_unit: "TPM".to_string(),
            gene_set_selector: default_gene_set(),
        }
    }
}

/// Validated request configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreprocessConfig {
    pub is_log_transformed: LogState,
    pub expression_unit: ExpressionUnit,
    pub gene_set: GeneSetSelector,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            is_log_transformed: LogState::Log,
            expression_unit: ExpressionUnit::Tpm,
            gene_set: GeneSetSelector::Default,
        }
    }
}

impl PreprocessConfig {
    /// Validate raw request strings
    pub fn from_raw(raw: &RawPreprocessConfig) -> Result<Self> {
        Ok(Self {
            is_log_transformed: raw.is_log_transformed.parse()?,
            expression_unit: raw.expression_unit.parse()?,
            gene_set: raw.gene_set_selector.parse()?,
        })
    }

    /// Read a raw request config from a JSON file and validate it
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_raw(&RawPreprocessConfig::from_json_file(path)?)
    }

    /// Raw values not yet log-transformed, in FPKM
    pub fn raw_fpkm() -> Self {
        Self {
            is_log_transformed: LogState::NotLog,
            expression_unit: ExpressionUnit::Fpkm,
            gene_set: GeneSetSelector::Default,
        }
    }

    pub fn with_gene_set(mut self, gene_set: GeneSetSelector) -> Self {
        self.gene_set = gene_set;
        self
    }
}

/// Identifiers exempt from upload deduplication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupExemptions(Vec<String>);

impl DedupExemptions {
    pub fn new<S: AsRef<str>>(ids: &[S]) -> Self {
        Self(ids.iter().map(|s| crate::data::normalize_identifier(s.as_ref())).collect())
    }

    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.0.iter().any(|g| g == gene)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

impl Default for DedupExemptions {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_EXEMPTIONS)
    }
}
