//! Preparation pipeline: turns an uploaded expression matrix into the
//! reference-ordered, imputed and normalized matrix a dependency model
//! consumes, plus the fingerprint matrix on the neural-network path.

pub mod align;
pub mod config;
pub mod fingerprint;
pub mod impute;
pub mod normalize;
pub mod recipe;

pub use align::{AlignedMatrix, AlignmentSummary, ReferenceAligner};
pub use config::{
    DedupExemptions, ExpressionUnit, GeneSetSelector, LogState, ModelPath, PreprocessConfig,
    RawPreprocessConfig,
};
pub use fingerprint::select_fingerprint;
pub use impute::{impute, ImputationSummary};
pub use recipe::{Recipe, Step};

use crate::data::{NormalizedExpressionMatrix, UploadedExpressionMatrix};
use crate::error::{PrepError, Result};
use crate::reference::{FingerprintMatrix, ReferenceTables};
use crate::resolve::{classify, AliasResolver, IdentifierKind, Resolution, ResolutionPolicy, ResolutionSummary};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Whether a step changed the data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step: Step,
    pub applied: bool,
}

/// Traceability record for one preparation request
#[derive(Debug, Clone, Serialize)]
pub struct PreparationReport {
    pub model_path: ModelPath,
    pub config: PreprocessConfig,
    pub identifier_kind: IdentifierKind,
    pub resolution: ResolutionSummary,
    /// Raw identifiers left unresolved or ambiguous
    pub unresolved: Vec<String>,
    pub alignment: AlignmentSummary,
    pub imputation: Option<ImputationSummary>,
    pub steps: Vec<StepOutcome>,
    pub fingerprint_columns: Option<usize>,
}

impl PreparationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| PrepError::io(path, e))
    }

    pub fn print(&self) {
        println!("\n=== Preparation Report ===");
        println!("Model path: {}", self.model_path);
        println!("Identifier kind: {}", self.identifier_kind);
        println!(
            "Resolution: direct={}, alias={}, ambiguous={}, unresolved={}",
            self.resolution.direct,
            self.resolution.by_alias,
            self.resolution.ambiguous,
            self.resolution.unresolved
        );
        println!(
            "Reference rows: {} (matched {}, missing {})",
            self.alignment.reference_rows, self.alignment.matched_rows, self.alignment.missing_rows
        );
        println!("Dropped upload genes: {}", self.alignment.dropped_genes.len());
        if let Some(imputation) = &self.imputation {
            println!(
                "Imputed cells: {} ({} statistic, {} genes)",
                imputation.imputed_cells,
                imputation.kind,
                imputation.genes.len()
            );
        }
        let applied: Vec<&str> = self
            .steps
            .iter()
            .filter(|s| s.applied)
            .map(|s| s.step.as_str())
            .collect();
        println!("Steps applied: {}", applied.join(" -> "));
        if let Some(columns) = self.fingerprint_columns {
            println!("Fingerprint columns: {}", columns);
        }
        println!("==========================\n");
    }
}

/// Everything handed to the prediction engine
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub model_path: ModelPath,
    pub matrix: NormalizedExpressionMatrix,
    /// Present on the neural-network path only
    pub fingerprint: Option<FingerprintMatrix>,
    pub report: PreparationReport,
}

enum Stage {
    Raw,
    Aligned(AlignedMatrix),
    Normalized(NormalizedExpressionMatrix),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Raw => "raw",
            Stage::Aligned(_) => "aligned",
            Stage::Normalized(_) => "normalized",
        }
    }
}

fn out_of_order(step: Step, stage: &Stage) -> PrepError {
    PrepError::Malformed(format!("step '{}' cannot run on a {} matrix", step, stage.name()))
}

/// One preparation recipe bound to the shared reference tables.
///
/// The pipeline borrows the tables immutably, so one [`ReferenceTables`] can
/// serve any number of pipelines on any number of threads.
pub struct Pipeline<'a> {
    tables: &'a ReferenceTables,
    path: ModelPath,
    recipe: Recipe,
    policy: ResolutionPolicy,
    exemptions: DedupExemptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(tables: &'a ReferenceTables, path: ModelPath) -> Self {
        Self {
            tables,
            path,
            recipe: Recipe::for_path(path),
            policy: ResolutionPolicy::default(),
            exemptions: DedupExemptions::default(),
        }
    }

    pub fn with_recipe(mut self, recipe: Recipe) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_exemptions(mut self, exemptions: DedupExemptions) -> Self {
        self.exemptions = exemptions;
        self
    }

    pub fn model_path(&self) -> ModelPath {
        self.path
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// Run the recipe over one upload
    pub fn run(
        &self,
        upload: &UploadedExpressionMatrix,
        config: &PreprocessConfig,
    ) -> Result<PreparedInput> {
        // Configuration problems surface before any matrix work.
        let universe = self.tables.universe(self.path)?;
        let fingerprint = if self.path.uses_fingerprint() {
            Some(select_fingerprint(self.tables, &config.gene_set)?)
        } else {
            if config.gene_set != GeneSetSelector::Default {
                debug!("Gene set '{}' ignored on the {} path", config.gene_set, self.path);
            }
            None
        };

        info!(
            "Preparing {} genes x {} samples for the {} model",
            upload.n_genes(),
            upload.n_samples(),
            self.path
        );

        let mut keys: Vec<String> = upload.genes().to_vec();
        let mut identifier_kind = classify(&upload.unique_genes());
        let mut resolution = ResolutionSummary::default();
        let mut unresolved = Vec::new();
        let mut alignment = AlignmentSummary::default();
        let mut imputation = None;
        let mut steps = Vec::with_capacity(self.recipe.steps().len());
        let mut stage = Stage::Raw;

        for &step in self.recipe.steps() {
            let applied = match step {
                Step::ResolveIdentifiers => {
                    if !matches!(stage, Stage::Raw) {
                        return Err(out_of_order(step, &stage));
                    }
                    let resolver = AliasResolver::new(self.tables.alias_table())
                        .with_reference(universe)
                        .with_policy(self.policy);
                    let (kind, resolutions) = resolver.resolve(&keys);
                    identifier_kind = kind;
                    resolution = ResolutionSummary::from_resolutions(&resolutions);
                    unresolved = resolutions
                        .iter()
                        .filter(|r| !r.is_resolved())
                        .map(|r| r.raw().to_string())
                        .collect();
                    keys = resolutions.iter().map(Resolution::key).map(str::to_string).collect();
                    true
                }
                Step::Align => {
                    if !matches!(stage, Stage::Raw) {
                        return Err(out_of_order(step, &stage));
                    }
                    let (aligned, summary) =
                        ReferenceAligner::new(universe, &self.exemptions).align(upload, &keys)?;
                    alignment = summary;
                    stage = Stage::Aligned(aligned);
                    true
                }
                Step::Impute => match stage {
                    Stage::Aligned(aligned) => {
                        let (matrix, summary) = impute(aligned, universe)?;
                        imputation = Some(summary);
                        stage = Stage::Normalized(matrix);
                        true
                    }
                    other => return Err(out_of_order(step, &other)),
                },
                Step::RescaleToTpm => match &mut stage {
                    Stage::Normalized(matrix) => normalize::apply_unit(matrix, config.expression_unit)?,
                    other => return Err(out_of_order(step, other)),
                },
                Step::LogTransform => match &mut stage {
                    Stage::Normalized(matrix) => {
                        normalize::apply_log_state(matrix, config.is_log_transformed)?
                    }
                    other => return Err(out_of_order(step, other)),
                },
            };
            steps.push(StepOutcome { step, applied });
        }

        let matrix = match stage {
            Stage::Normalized(matrix) => matrix,
            other => {
                return Err(PrepError::Malformed(format!(
                    "recipe finished on a {} matrix",
                    other.name()
                )))
            }
        };

        let report = PreparationReport {
            model_path: self.path,
            config: config.clone(),
            identifier_kind,
            resolution,
            unresolved,
            alignment,
            imputation,
            steps,
            fingerprint_columns: fingerprint.as_ref().map(FingerprintMatrix::n_columns),
        };

        info!(
            "Prepared {} x {} matrix for the {} model",
            matrix.n_genes(),
            matrix.n_samples(),
            self.path
        );

        Ok(PreparedInput {
            model_path: self.path,
            matrix,
            fingerprint,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{AliasRow, AliasTable, ReferenceUniverse, StatisticKind};

    fn tables() -> ReferenceTables {
        let aliases = AliasTable::from_rows(vec![
            AliasRow::new("TP53", &["ENSG00000141510"], &["P53"]),
            AliasRow::new("BRCA1", &["ENSG00000012048"], &[]),
            AliasRow::new("EGFR", &["ENSG00000146648"], &["ERBB1"]),
        ]);
        let fingerprint = FingerprintMatrix::new(
            vec!["SET_A".into()],
            vec!["TP53".into(), "EGFR".into()],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        ReferenceTables::builder(aliases)
            .neural_network_universe(ReferenceUniverse::from_pairs(
                StatisticKind::Mean,
                &[("TP53", 0.5), ("BRCA1", 0.5), ("EGFR", 4.2)],
            ))
            .elastic_net_universe(ReferenceUniverse::from_pairs(
                StatisticKind::Median,
                &[("EGFR", 3.0), ("TP53", 1.0)],
            ))
            .fingerprint(fingerprint)
            .build()
            .unwrap()
    }

    fn upload() -> UploadedExpressionMatrix {
        UploadedExpressionMatrix::from_values(
            &["S1"],
            &[("P53", vec![1.0]), ("BRCA1", vec![2.0]), ("FAKEGENE1", vec![3.0])],
        )
        .unwrap()
    }

    #[test]
    fn test_neural_network_run() {
        let tables = tables();
        let prepared = Pipeline::new(&tables, ModelPath::NeuralNetwork)
            .run(&upload(), &PreprocessConfig::default())
            .unwrap();

        assert_eq!(prepared.matrix.genes(), &["TP53", "BRCA1", "EGFR"]);
        assert_eq!(prepared.matrix.values(), &[vec![1.0], vec![2.0], vec![4.2]]);
        assert!(prepared.fingerprint.is_some());

        let report = &prepared.report;
        assert_eq!(report.identifier_kind, IdentifierKind::SymbolOnly);
        assert_eq!(report.resolution.by_alias, 1);
        assert_eq!(report.unresolved, vec!["FAKEGENE1".to_string()]);
        assert_eq!(report.alignment.dropped_genes, vec!["FAKEGENE1".to_string()]);
        assert_eq!(report.fingerprint_columns, Some(2));
        // log and TPM input: normalizers are skipped
        assert!(report.steps[3..].iter().all(|s| !s.applied));
    }

    #[test]
    fn test_elastic_net_has_no_fingerprint() {
        let tables = tables();
        let config = PreprocessConfig::default()
            .with_gene_set(GeneSetSelector::Named("HALLMARK_APOPTOSIS".into()));
        let prepared = Pipeline::new(&tables, ModelPath::ElasticNet)
            .run(&upload(), &config)
            .unwrap();
        assert!(prepared.fingerprint.is_none());
        assert_eq!(prepared.matrix.genes(), &["EGFR", "TP53"]);
        assert_eq!(prepared.matrix.values(), &[vec![3.0], vec![1.0]]);
    }

    #[test]
    fn test_unknown_gene_set_fails_before_matrix_work() {
        let tables = tables();
        let mut bad = UploadedExpressionMatrix::new(vec!["S1".into()]);
        bad.push_row("TP53", vec![crate::data::Cell::Text("oops".into())])
            .unwrap();
        let config = PreprocessConfig::default()
            .with_gene_set(GeneSetSelector::Named("HALLMARK_APOPTOSIS".into()));

        let err = Pipeline::new(&tables, ModelPath::NeuralNetwork)
            .run(&bad, &config)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_normalizers_follow_recipe_order() {
        let tables = tables();
        let upload = UploadedExpressionMatrix::from_values(
            &["S1"],
            &[("TP53", vec![1.0]), ("BRCA1", vec![1.0]), ("EGFR", vec![2.0])],
        )
        .unwrap();
        let config = PreprocessConfig::raw_fpkm();

        let nn = Pipeline::new(&tables, ModelPath::NeuralNetwork)
            .run(&upload, &config)
            .unwrap();
        // rescale then log: log2(250000 + 1)
        let expected = (250_000.0f64 + 1.0).log2();
        assert!((nn.matrix.values()[0][0] - expected).abs() < 1e-9);

        let en = Pipeline::new(&tables, ModelPath::ElasticNet)
            .run(&upload, &config)
            .unwrap();
        // log then rescale: column sums to one million
        let total: f64 = en.matrix.column("S1").unwrap().iter().sum();
        assert!((total - 1e6).abs() < 1e-6);
        assert!(en.report.steps.iter().all(|s| s.applied));
    }

    #[test]
    fn test_custom_recipe_without_resolution() {
        let tables = tables();
        let recipe = Recipe::new(vec![Step::Align, Step::Impute]).unwrap();
        let prepared = Pipeline::new(&tables, ModelPath::NeuralNetwork)
            .with_recipe(recipe)
            .run(&upload(), &PreprocessConfig::default())
            .unwrap();
        // P53 is not resolved, so TP53 is imputed
        assert_eq!(prepared.matrix.get("TP53", "S1"), Some(0.5));
        assert_eq!(prepared.report.resolution.total(), 0);
    }

    #[test]
    fn test_report_serializes() {
        let tables = tables();
        let prepared = Pipeline::new(&tables, ModelPath::NeuralNetwork)
            .run(&upload(), &PreprocessConfig::default())
            .unwrap();
        let json = prepared.report.to_json().unwrap();
        assert!(json.contains("\"identifier_kind\": \"SYMBOL_ONLY\""));
        assert!(json.contains("\"model_path\": \"neural-network\""));
    }
}
