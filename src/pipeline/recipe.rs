//! Ordered preparation steps per model path.

use crate::error::{PrepError, Result};
use crate::pipeline::config::ModelPath;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    ResolveIdentifiers,
    Align,
    Impute,
    /// Applied only when the upload is FPKM
    RescaleToTpm,
    /// Applied only when the upload is not yet log-transformed
    LogTransform,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::ResolveIdentifiers => "resolve-identifiers",
            Step::Align => "align",
            Step::Impute => "impute",
            Step::RescaleToTpm => "rescale-to-tpm",
            Step::LogTransform => "log-transform",
        }
    }

    fn is_normalizer(&self) -> bool {
        matches!(self, Step::RescaleToTpm | Step::LogTransform)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated step sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    steps: Vec<Step>,
}

impl Recipe {
    /// Validate a custom sequence. Align and impute are mandatory; resolution
    /// may be skipped, but must precede alignment when present. Normalizers
    /// run after imputation, at most once each.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].contains(step) {
                return Err(PrepError::config(format!("step '{}' appears twice", step)));
            }
        }

        let position = |wanted: Step| steps.iter().position(|s| *s == wanted);
        let align = position(Step::Align)
            .ok_or_else(|| PrepError::config("a recipe must align onto the reference"))?;
        let impute = position(Step::Impute)
            .ok_or_else(|| PrepError::config("a recipe must impute missing values"))?;

        if let Some(resolve) = position(Step::ResolveIdentifiers) {
            if resolve > align {
                return Err(PrepError::config("identifiers must be resolved before alignment"));
            }
        }
        if impute < align {
            return Err(PrepError::config("alignment must precede imputation"));
        }
        if let Some(step) = steps[..impute].iter().find(|s| s.is_normalizer()) {
            return Err(PrepError::config(format!(
                "'{}' must run after imputation",
                step
            )));
        }

        Ok(Self { steps })
    }

    /// resolve, align, impute, rescale, log
    pub fn neural_network() -> Self {
        Self {
            steps: vec![
                Step::ResolveIdentifiers,
                Step::Align,
                Step::Impute,
                Step::RescaleToTpm,
                Step::LogTransform,
            ],
        }
    }

    /// resolve, align, impute, log, rescale
    pub fn elastic_net() -> Self {
        Self {
            steps: vec![
                Step::ResolveIdentifiers,
                Step::Align,
                Step::Impute,
                Step::LogTransform,
                Step::RescaleToTpm,
            ],
        }
    }

    pub fn for_path(path: ModelPath) -> Self {
        match path {
            ModelPath::NeuralNetwork => Self::neural_network(),
            ModelPath::ElasticNet => Self::elastic_net(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn contains(&self, step: Step) -> bool {
        self.steps.contains(&step)
    }
}
