//! # geneprep: Expression Preparation for Dependency Models
//!
//! geneprep turns a user-uploaded gene expression matrix into the exact input
//! a pre-trained gene dependency model expects: identifiers resolved onto a
//! fixed reference universe, missing genes imputed from reference statistics,
//! and values rescaled/log-transformed into the model's training units.
//!
//! ## Features
//!
//! - Identifier namespace detection (gene symbols, Ensembl IDs, or both)
//! - Alias resolution with explicit first-match / unique-match strictness
//! - Reference-ordered left join with configurable duplicate exemptions
//! - Mean (neural network) or median (elastic net) imputation
//! - FPKM to TPM rescaling and `log2(x + 1)` in per-model order
//! - Gene-set scoped fingerprint selection for the neural-network path
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use geneprep::data::loader::MatrixLoader;
//! use geneprep::pipeline::{ModelPath, Pipeline, PreprocessConfig, RawPreprocessConfig};
//! use geneprep::reference::{ReferencePaths, ReferenceTables};
//!
//! // Load the shared reference tables once
//! let paths = ReferencePaths::from_file("references.json").unwrap();
//! let tables = ReferenceTables::load(&paths).unwrap();
//!
//! // Validate the request configuration
//! let raw = RawPreprocessConfig {
//!     is_log_transformed: "not-log".into(),
//!     expression_unit: "FPKM".into(),
//!     gene_set_selector: "default-gene-set".into(),
//! };
//! let config = PreprocessConfig::from_raw(&raw).unwrap();
//!
//! // Prepare one upload
//! let upload = MatrixLoader::new().load("upload.csv").unwrap();
//! let prepared = Pipeline::new(&tables, ModelPath::NeuralNetwork)
//!     .run(&upload, &config)
//!     .unwrap();
//! prepared.report.print();
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod predict;
pub mod reference;
pub mod resolve;
pub mod utils;

/// Re-export commonly used types
pub use data::loader::MatrixLoader;
pub use data::{NormalizedExpressionMatrix, UploadedExpressionMatrix};
pub use error::{PrepError, Result};
pub use pipeline::{ModelPath, Pipeline, PreparationReport, PreparedInput, PreprocessConfig};
pub use predict::{DependencyPredictions, DependencyPredictor};
pub use reference::{FingerprintMatrix, ReferenceTables};
pub use resolve::{AliasResolver, IdentifierKind, ResolutionPolicy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - expression preparation for gene dependency models",
        NAME, VERSION
    )
}
