//! Delimited output for prepared matrices.
//!
//! Every table is written with its row-key column first, then one column per
//! sample (or gene-set member). The delimiter and compression follow the
//! output file extension, mirroring the loader.

use super::loader::FileFormat;
use super::{NormalizedExpressionMatrix, GENE_COLUMN};
use crate::error::{PrepError, Result};
use crate::reference::{FingerprintMatrix, FINGERPRINT_KEY_COLUMN};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write a keyed numeric table
pub fn write_labeled<W: Write>(
    writer: W,
    delimiter: u8,
    key_header: &str,
    columns: &[String],
    keys: &[String],
    values: &[Vec<f64>],
) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    let header = std::iter::once(key_header).chain(columns.iter().map(String::as_str));
    csv.write_record(header)?;
    for (key, row) in keys.iter().zip(values) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(key.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush().map_err(|e| PrepError::io("<writer>", e))?;
    Ok(())
}

fn save_labeled(
    path: &Path,
    key_header: &str,
    columns: &[String],
    keys: &[String],
    values: &[Vec<f64>],
) -> Result<()> {
    let format = FileFormat::from_path(path)?;
    let file = File::create(path).map_err(|e| PrepError::io(path, e))?;
    if format.is_gzipped() {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_labeled(&mut encoder, format.delimiter(), key_header, columns, keys, values)?;
        encoder.finish().map_err(|e| PrepError::io(path, e))?;
    } else {
        let mut buffered = BufWriter::new(file);
        write_labeled(&mut buffered, format.delimiter(), key_header, columns, keys, values)?;
        buffered.flush().map_err(|e| PrepError::io(path, e))?;
    }
    Ok(())
}

/// Save a normalized matrix, genes as rows
pub fn save_matrix<P: AsRef<Path>>(path: P, matrix: &NormalizedExpressionMatrix) -> Result<()> {
    let path = path.as_ref();
    save_labeled(path, GENE_COLUMN, matrix.samples(), matrix.genes(), matrix.values())?;
    info!(
        "Wrote {} x {} matrix to {:?}",
        matrix.n_genes(),
        matrix.n_samples(),
        path
    );
    Ok(())
}

/// Save a fingerprint matrix, gene sets as rows
pub fn save_fingerprint<P: AsRef<Path>>(path: P, fingerprint: &FingerprintMatrix) -> Result<()> {
    let path = path.as_ref();
    save_labeled(
        path,
        FINGERPRINT_KEY_COLUMN,
        fingerprint.columns(),
        fingerprint.keys(),
        fingerprint.values(),
    )?;
    info!(
        "Wrote {} x {} fingerprint to {:?}",
        fingerprint.n_rows(),
        fingerprint.n_columns(),
        path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{read_table, MatrixLoader};

    fn matrix() -> NormalizedExpressionMatrix {
        NormalizedExpressionMatrix::from_parts(
            vec!["TP53".into(), "EGFR".into()],
            vec!["S1".into(), "S2".into()],
            vec![vec![1.5, 2.0], vec![4.2, 0.0]],
        )
    }

    #[test]
    fn test_write_labeled_layout() {
        let m = matrix();
        let mut out = Vec::new();
        write_labeled(&mut out, b',', GENE_COLUMN, m.samples(), m.genes(), m.values()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Gene,S1,S2\nTP53,1.5,2\nEGFR,4.2,0\n");
    }

    #[test]
    fn test_saved_matrix_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["out.tsv", "out.csv.gz"] {
            let path = dir.path().join(name);
            save_matrix(&path, &matrix()).unwrap();
            let upload = MatrixLoader::new().load(&path).unwrap();
            assert_eq!(upload.genes(), &["TP53", "EGFR"]);
            assert_eq!(upload.samples(), &["S1", "S2"]);
        }
    }

    #[test]
    fn test_save_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fp.csv");
        let fp = FingerprintMatrix::new(
            vec!["SET_A".into()],
            vec!["TP53".into(), "BAX".into()],
            vec![vec![1.0, 0.0]],
        )
        .unwrap();
        save_fingerprint(&path, &fp).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["GeneSet", "TP53", "BAX"]);
        assert_eq!(FingerprintMatrix::from_table(&table).unwrap(), fp);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_matrix(dir.path().join("out.xlsx"), &matrix()).unwrap_err();
        assert!(matches!(err, PrepError::Malformed(_)));
    }
}
