use crate::pipeline::config::RawPreprocessConfig;
use crate::pipeline::ModelPath;
use crate::resolve::{ResolutionPolicy, Strictness};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// geneprep: expression matrix preparation for dependency models
#[derive(Parser, Debug)]
#[command(name = "geneprep")]
#[command(about = "Prepare uploaded expression matrices for gene dependency models")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve, align, impute and normalize an uploaded matrix
    Prepare(PrepareArgs),

    /// Report the identifier namespace of an uploaded matrix
    Classify(ClassifyArgs),
}

/// Alias matching strategy selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolutionMode {
    /// Symbol-only uploads first-match, everything else unique-match
    Legacy,
    FirstMatch,
    UniqueMatch,
}

impl ResolutionMode {
    pub fn policy(&self) -> ResolutionPolicy {
        match self {
            ResolutionMode::Legacy => ResolutionPolicy::legacy(),
            ResolutionMode::FirstMatch => ResolutionPolicy::uniform(Strictness::FirstMatch),
            ResolutionMode::UniqueMatch => ResolutionPolicy::uniform(Strictness::UniqueMatch),
        }
    }
}

/// Preparation arguments
#[derive(Parser, Debug)]
pub struct PrepareArgs {
    /// Uploaded expression matrix (CSV, TSV or gzipped); first column holds gene ids
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// JSON file naming the reference tables
    #[arg(short, long, required = true)]
    pub references: PathBuf,

    /// Target model (deepdep / neural-network, elastic-net)
    #[arg(short, long, default_value = "deepdep")]
    pub model: ModelPath,

    /// Whether values are already log-transformed (log, not-log)
    #[arg(long)]
    pub log: Option<String>,

    /// Unit of the uploaded values (FPKM, TPM)
    #[arg(long)]
    pub unit: Option<String>,

    /// Gene set scoping the fingerprint (neural-network path)
    #[arg(long)]
    pub gene_set: Option<String>,

    /// Request config JSON (isLogTransformed, expressionUnit, geneSetSelector);
    /// flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Alias resolution strategy
    #[arg(long, value_enum, default_value = "legacy")]
    pub resolution: ResolutionMode,

    /// Identifiers kept out of deduplication (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "1-MAR")]
    pub keep_duplicates: Vec<String>,

    /// Output file for the normalized matrix
    #[arg(short, long, default_value = "prepared.csv")]
    pub output: PathBuf,

    /// Output file for the fingerprint matrix
    #[arg(long)]
    pub fingerprint_out: Option<PathBuf>,

    /// Output file for the JSON preparation report
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl PrepareArgs {
    /// Merge the optional config file with command-line flags
    pub fn raw_config(&self, file: Option<RawPreprocessConfig>) -> RawPreprocessConfig {
        let mut raw = file.unwrap_or_default();
        if let Some(log) = &self.log {
            raw.is_log_transformed = log.clone();
        }
        if let Some(unit) = &self.unit {
            raw.expression_unit = unit.clone();
        }
        if let Some(gene_set) = &self.gene_set {
            raw.gene_set_selector = gene_set.clone();
        }
        raw
    }
}

/// Classification arguments
#[derive(Parser, Debug)]
pub struct ClassifyArgs {
    /// Uploaded expression matrix
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Print the Ensembl identifiers of a mixed upload
    #[arg(long)]
    pub list_ensembl: bool,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity; `RUST_LOG` wins when set
pub fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
