//! Unit/Scale Normalizer.

use crate::data::NormalizedExpressionMatrix;
use crate::error::{PrepError, Result};
use crate::pipeline::config::{ExpressionUnit, LogState};
use tracing::{debug, info};

const PER_MILLION: f64 = 1e6;

/// Rescale every sample column to sum to one million (FPKM → TPM)
pub fn rescale_to_tpm(matrix: &mut NormalizedExpressionMatrix) -> Result<()> {
    let n_samples = matrix.n_samples();
    let mut totals = vec![0.0f64; n_samples];
    for row in matrix.values() {
        for (total, value) in totals.iter_mut().zip(row) {
            *total += value;
        }
    }

    for (total, sample) in totals.iter().zip(matrix.samples()) {
        if *total == 0.0 || !total.is_finite() {
            return Err(PrepError::InputFormat {
                gene: "(column total)".to_string(),
                sample: sample.clone(),
                value: format!("cannot rescale a column summing to {}", total),
            });
        }
    }

    for row in matrix.values_mut() {
        for (value, total) in row.iter_mut().zip(&totals) {
            *value = *value * PER_MILLION / total;
        }
    }

    info!("Rescaled {} sample columns to TPM", n_samples);
    Ok(())
}

/// Apply `log2(x + 1)` to every cell
pub fn log2_transform(matrix: &mut NormalizedExpressionMatrix) -> Result<()> {
    let genes = matrix.genes().to_vec();
    let samples = matrix.samples().to_vec();
    for (row, gene) in matrix.values_mut().iter_mut().zip(&genes) {
        for (value, sample) in row.iter_mut().zip(&samples) {
            if *value <= -1.0 {
                return Err(PrepError::InputFormat {
                    gene: gene.clone(),
                    sample: sample.clone(),
                    value: format!("{} has no log2(x + 1)", value),
                });
            }
            *value = (*value + 1.0).log2();
        }
    }
    info!("Applied log2(x + 1) to {} genes", genes.len());
    Ok(())
}

/// Rescale only for FPKM input; returns whether the matrix changed
pub fn apply_unit(matrix: &mut NormalizedExpressionMatrix, unit: ExpressionUnit) -> Result<bool> {
    match unit {
        ExpressionUnit::Fpkm => rescale_to_tpm(matrix).map(|_| true),
        ExpressionUnit::Tpm => {
            debug!("Values already in TPM; no rescaling");
            Ok(false)
        }
    }
}

/// Log-transform only values not yet on log scale; returns whether the
/// matrix changed
pub fn apply_log_state(matrix: &mut NormalizedExpressionMatrix, state: LogState) -> Result<bool> {
    match state {
        LogState::NotLog => log2_transform(matrix).map(|_| true),
        LogState::Log => {
            debug!("Values already log-transformed; no transform");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: Vec<Vec<f64>>) -> NormalizedExpressionMatrix {
        let genes = (0..values.len()).map(|i| format!("G{}", i)).collect();
        let samples = (0..values.first().map_or(0, |r| r.len()))
            .map(|i| format!("S{}", i))
            .collect();
        NormalizedExpressionMatrix::from_parts(genes, samples, values)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-2
    }

    #[test]
    fn test_rescale_to_tpm() {
        let mut m = matrix(vec![vec![10.0], vec![20.0], vec![30.0]]);
        rescale_to_tpm(&mut m).unwrap();
        let col = m.column("S0").unwrap();
        assert!(close(col[0], 166_666.67));
        assert!(close(col[1], 333_333.33));
        assert!(close(col[2], 500_000.0));
    }

    #[test]
    fn test_rescale_is_per_column() {
        let mut m = matrix(vec![vec![1.0, 5.0], vec![3.0, 5.0]]);
        rescale_to_tpm(&mut m).unwrap();
        assert_eq!(m.values(), &[vec![250_000.0, 500_000.0], vec![750_000.0, 500_000.0]]);
    }

    #[test]
    fn test_rescale_zero_column_fails() {
        let mut m = matrix(vec![vec![0.0, 1.0]]);
        let err = rescale_to_tpm(&mut m).unwrap_err();
        assert!(matches!(err, PrepError::InputFormat { ref sample, .. } if sample == "S0"));
    }

    #[test]
    fn test_log2_transform() {
        let mut m = matrix(vec![vec![15.0, 0.0]]);
        log2_transform(&mut m).unwrap();
        assert_eq!(m.values(), &[vec![4.0, 0.0]]);
    }

    #[test]
    fn test_log2_rejects_values_at_or_below_minus_one() {
        let mut m = matrix(vec![vec![1.0], vec![-1.0]]);
        let err = log2_transform(&mut m).unwrap_err();
        assert!(matches!(err, PrepError::InputFormat { ref gene, .. } if gene == "G1"));
    }

    #[test]
    fn test_log_state_is_idempotent_once_logged() {
        let mut m = matrix(vec![vec![15.0], vec![3.0]]);
        assert!(apply_log_state(&mut m, LogState::NotLog).unwrap());
        let logged = m.clone();
        assert!(!apply_log_state(&mut m, LogState::Log).unwrap());
        assert_eq!(m, logged);
    }

    #[test]
    fn test_tpm_unit_is_noop() {
        let mut m = matrix(vec![vec![2.0]]);
        assert!(!apply_unit(&mut m, ExpressionUnit::Tpm).unwrap());
        assert_eq!(m.values(), &[vec![2.0]]);
    }
}
