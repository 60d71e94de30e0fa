//! Gene-set catalogs and the fingerprint (gene-set membership) matrix.

use crate::data::{is_missing_marker, loader::Table};
use crate::error::{PrepError, Result};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Key column of fingerprint tables
pub const FINGERPRINT_KEY_COLUMN: &str = "GeneSet";

/// Stored row-index columns dropped when loading
const INDEX_COLUMNS: &[&str] = &["index", ""];

/// Named gene sets, one set per column of the source table
#[derive(Debug, Clone, Default)]
pub struct GeneSetCatalog {
    name: String,
    sets: HashMap<String, Vec<String>>,
}

impl GeneSetCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sets: HashMap::new(),
        }
    }

    /// Add or replace a set
    pub fn insert<S: AsRef<str>>(&mut self, set: &str, members: &[S]) {
        self.sets.insert(
            set.to_string(),
            members.iter().map(|m| m.as_ref().trim().to_string()).collect(),
        );
    }

    /// Build from a wide table: headers are set names, cells are members,
    /// shorter sets padded with empty/NA cells
    pub fn from_table(name: &str, table: &Table) -> Self {
        let mut catalog = Self::new(name);
        for (col, header) in table.headers.iter().enumerate() {
            if INDEX_COLUMNS.contains(&header.as_str()) {
                continue;
            }
            let members: Vec<String> = table
                .records
                .iter()
                .filter_map(|r| r.get(col))
                .map(str::trim)
                .filter(|m| !is_missing_marker(m))
                .map(str::to_string)
                .collect();
            catalog.sets.insert(header.clone(), members);
        }
        info!("Gene-set catalog '{}' loaded: {} sets", name, catalog.sets.len());
        catalog
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members of a named set
    pub fn get(&self, set: &str) -> Option<&[String]> {
        self.sets.get(set).map(|m| m.as_slice())
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Binary gene-set membership matrix paired with the expression matrix on
/// the neural-network path. Rows are keyed by the gene-set key column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintMatrix {
    keys: Vec<String>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl FingerprintMatrix {
    pub fn new(keys: Vec<String>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if keys.len() != values.len() {
            return Err(PrepError::Malformed(format!(
                "fingerprint has {} keys but {} rows",
                keys.len(),
                values.len()
            )));
        }
        if let Some((key, _)) = keys
            .iter()
            .zip(&values)
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(PrepError::Malformed(format!(
                "fingerprint row '{}' does not have {} columns",
                key,
                columns.len()
            )));
        }
        Ok(Self {
            keys,
            columns,
            values,
        })
    }

    /// Build from a table with a `GeneSet` key column
    pub fn from_table(table: &Table) -> Result<Self> {
        let key_idx = table.require_column(FINGERPRINT_KEY_COLUMN, "fingerprint table")?;
        let value_cols: Vec<usize> = (0..table.headers.len())
            .filter(|&i| i != key_idx && !INDEX_COLUMNS.contains(&table.headers[i].as_str()))
            .collect();
        let columns = value_cols.iter().map(|&i| table.headers[i].clone()).collect();

        let mut keys = Vec::with_capacity(table.records.len());
        let mut values = Vec::with_capacity(table.records.len());
        for record in &table.records {
            let key = record.get(key_idx).unwrap_or("").trim().to_string();
            let row = value_cols
                .iter()
                .map(|&i| {
                    let raw = record.get(i).unwrap_or("").trim();
                    raw.parse::<f64>().map_err(|_| {
                        PrepError::Malformed(format!(
                            "fingerprint value '{}' for '{}' / '{}' is not numeric",
                            raw, key, table.headers[i]
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            keys.push(key);
            values.push(row);
        }

        let matrix = Self::new(keys, columns, values)?;
        info!(
            "Fingerprint table loaded: {} rows x {} columns",
            matrix.n_rows(),
            matrix.n_columns()
        );
        Ok(matrix)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.keys.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Restrict to the named columns, in the order given. Unknown names are
    /// skipped.
    pub fn select_columns<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let positions: Vec<usize> = names
            .iter()
            .filter_map(|n| self.columns.iter().position(|c| c == n.as_ref()))
            .collect();
        Self {
            keys: self.keys.clone(),
            columns: positions.iter().map(|&i| self.columns[i].clone()).collect(),
            values: self
                .values
                .iter()
                .map(|row| positions.iter().map(|&i| row[i]).collect())
                .collect(),
        }
    }
}
