//! Error taxonomy for the preparation pipeline.
//!
//! Library code returns [`PrepError`]; the binary wraps it in `anyhow` for
//! context. Ambiguous alias resolution is deliberately absent here: it is a
//! degraded-but-acceptable outcome that is counted and logged, never raised.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    /// Unrecognized flag value, unknown gene set, empty gene-set intersection,
    /// invalid recipe or a reference table the requested path needs is absent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reference data is corrupt or incomplete.
    #[error("Data integrity error for gene '{gene}': {detail}")]
    DataIntegrity { gene: String, detail: String },

    /// A cell could not be coerced to a number (or cannot be normalized).
    #[error("Input format error at gene '{gene}', sample '{sample}': {value}")]
    InputFormat {
        gene: String,
        sample: String,
        value: String,
    },

    /// Structural problem with an input file or table.
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PrepError {
    pub fn config(msg: impl Into<String>) -> Self {
        PrepError::Configuration(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error stems from caller-supplied configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, PrepError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_gene_and_sample() {
        let err = PrepError::InputFormat {
            gene: "TP53".to_string(),
            sample: "S1".to_string(),
            value: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TP53"));
        assert!(msg.contains("S1"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_is_configuration() {
        assert!(PrepError::config("bad flag").is_configuration());
        assert!(!PrepError::Malformed("x".into()).is_configuration());
    }
}
