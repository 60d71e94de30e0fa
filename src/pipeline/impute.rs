//! Missing Value Imputer: fills every missing aligned cell with the
//! reference gene's precomputed statistic.

use crate::data::NormalizedExpressionMatrix;
use crate::error::{PrepError, Result};
use crate::pipeline::align::AlignedMatrix;
use crate::reference::{ReferenceUniverse, StatisticKind};
use serde::Serialize;
use tracing::info;

/// One reference gene that received imputed values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputedGene {
    pub gene: String,
    pub statistic: f64,
    pub kind: StatisticKind,
    /// Number of sample cells filled for this gene
    pub cells: usize,
}

/// Traceability record for one imputation pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImputationSummary {
    pub kind: StatisticKind,
    pub imputed_cells: usize,
    /// Genes with every sample imputed
    pub imputed_rows: usize,
    pub genes: Vec<ImputedGene>,
}

/// Fill missing cells. Fails if any reference gene lacks a statistic, even
/// when that gene happens to need no filling in this request.
pub fn impute(
    aligned: AlignedMatrix,
    universe: &ReferenceUniverse,
) -> Result<(NormalizedExpressionMatrix, ImputationSummary)> {
    if aligned.genes().len() != universe.len() {
        return Err(PrepError::Malformed(format!(
            "aligned matrix has {} rows but the universe has {}",
            aligned.genes().len(),
            universe.len()
        )));
    }

    let statistics = universe
        .genes()
        .iter()
        .map(|g| {
            g.statistic.ok_or_else(|| PrepError::DataIntegrity {
                gene: g.gene.clone(),
                detail: format!("no precomputed {} statistic", universe.kind()),
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let (genes, samples, cells) = aligned.into_parts();
    let mut summary = ImputationSummary {
        kind: universe.kind(),
        imputed_cells: 0,
        imputed_rows: 0,
        genes: Vec::new(),
    };

    let values: Vec<Vec<f64>> = cells
        .into_iter()
        .zip(&genes)
        .zip(&statistics)
        .map(|((row, gene), &statistic)| {
            let missing = row.iter().filter(|c| c.is_none()).count();
            if missing > 0 {
                summary.imputed_cells += missing;
                if missing == row.len() {
                    summary.imputed_rows += 1;
                }
                summary.genes.push(ImputedGene {
                    gene: gene.clone(),
                    statistic,
                    kind: universe.kind(),
                    cells: missing,
                });
            }
            row.into_iter()
                .map(|c| c.unwrap_or(statistic))
                .collect::<Vec<f64>>()
        })
        .collect();

    info!(
        "Imputed {} cells across {} genes using reference {}",
        summary.imputed_cells,
        summary.genes.len(),
        summary.kind
    );

    Ok((NormalizedExpressionMatrix::from_parts(genes, samples, values), summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UploadedExpressionMatrix;
    use crate::pipeline::align::ReferenceAligner;
    use crate::pipeline::config::DedupExemptions;
    use crate::reference::ReferenceGene;

    fn align(universe: &ReferenceUniverse, upload: &UploadedExpressionMatrix) -> AlignedMatrix {
        let exemptions = DedupExemptions::default();
        ReferenceAligner::new(universe, &exemptions)
            .align(upload, upload.genes())
            .unwrap()
            .0
    }

    #[test]
    fn test_fills_missing_with_statistic() {
        let universe = ReferenceUniverse::from_pairs(
            StatisticKind::Mean,
            &[("TP53", 9.0), ("BRCA1", 9.0), ("EGFR", 4.2)],
        );
        let upload = UploadedExpressionMatrix::from_values(
            &["S1", "S2"],
            &[("TP53", vec![1.0, f64::NAN]), ("BRCA1", vec![2.0, 3.0])],
        )
        .unwrap();

        let (matrix, summary) = impute(align(&universe, &upload), &universe).unwrap();

        assert_eq!(matrix.values(), &[vec![1.0, 9.0], vec![2.0, 3.0], vec![4.2, 4.2]]);
        assert_eq!(summary.imputed_cells, 3);
        assert_eq!(summary.imputed_rows, 1);
        assert_eq!(summary.genes.len(), 2);
        assert_eq!(summary.genes[1].gene, "EGFR");
        assert_eq!(summary.genes[1].statistic, 4.2);
        assert_eq!(summary.genes[1].kind, StatisticKind::Mean);
    }

    #[test]
    fn test_missing_statistic_is_fatal() {
        let universe = ReferenceUniverse::new(
            StatisticKind::Median,
            vec![
                ReferenceGene {
                    gene: "TP53".into(),
                    statistic: Some(1.0),
                },
                ReferenceGene {
                    gene: "EGFR".into(),
                    statistic: None,
                },
            ],
        );
        let upload = UploadedExpressionMatrix::from_values(&["S1"], &[("TP53", vec![1.0])]).unwrap();

        let err = impute(align(&universe, &upload), &universe).unwrap_err();
        match err {
            PrepError::DataIntegrity { gene, detail } => {
                assert_eq!(gene, "EGFR");
                assert!(detail.contains("median"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_missing_cells_remain() {
        let universe = ReferenceUniverse::from_pairs(
            StatisticKind::Median,
            &[("A", 1.0), ("B", 2.0), ("C", 3.0)],
        );
        let upload = UploadedExpressionMatrix::new(vec!["S1".into(), "S2".into(), "S3".into()]);
        let (matrix, summary) = impute(align(&universe, &upload), &universe).unwrap();
        assert!(!matrix.has_non_finite());
        assert_eq!(matrix.n_genes(), 3);
        assert_eq!(summary.imputed_cells, 9);
    }
}
