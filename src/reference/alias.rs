//! Alias table: canonical gene → alternate names.
//!
//! Two lookup structures are built once from the table:
//! - a flattened alias index (alias → first canonical row, scanning alias
//!   columns one at a time), used by the first-match strategy;
//! - a value index (any cell value → every row containing it), used by the
//!   unique-match strategy.

use crate::data::{is_missing_marker, normalize_identifier, loader::Table};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Header layout of an alias table file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasTableSchema {
    /// Column holding the canonical gene identifier
    pub gene_column: String,
    /// Columns whose header starts with this prefix are alias columns;
    /// every other column is an annotation column
    pub alias_column_prefix: String,
}

impl Default for AliasTableSchema {
    fn default() -> Self {
        Self {
            gene_column: "Gene".to_string(),
            alias_column_prefix: "gene_alias".to_string(),
        }
    }
}

/// One canonical gene with its alternate identifiers
#[derive(Debug, Clone, PartialEq)]
pub struct AliasRow {
    pub canonical: String,
    /// Annotation values such as Ensembl IDs; only the unique-match search
    /// looks at them
    pub annotations: Vec<String>,
    /// Alias cells in column order, `None` where the column is empty
    pub aliases: Vec<Option<String>>,
}

impl AliasRow {
    pub fn new(canonical: &str, annotations: &[&str], aliases: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            annotations: annotations.iter().map(|s| s.to_string()).collect(),
            aliases: aliases
                .iter()
                .map(|s| (!is_missing_marker(s)).then(|| s.to_string()))
                .collect(),
        }
    }

    fn values(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str())
            .chain(self.annotations.iter().map(|s| s.as_str()))
            .chain(self.aliases.iter().flatten().map(|s| s.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    rows: Vec<AliasRow>,
    canonical: HashSet<String>,
    alias_index: HashMap<String, usize>,
    ambiguous_aliases: HashSet<String>,
    value_index: HashMap<String, Vec<usize>>,
}

impl AliasTable {
    /// Build the table and its indices; every value is case-folded
    pub fn from_rows(rows: Vec<AliasRow>) -> Self {
        let rows: Vec<AliasRow> = rows
            .into_iter()
            .map(|row| AliasRow {
                canonical: normalize_identifier(&row.canonical),
                annotations: row
                    .annotations
                    .iter()
                    .filter(|a| !is_missing_marker(a))
                    .map(|a| normalize_identifier(a))
                    .collect(),
                aliases: row
                    .aliases
                    .iter()
                    .map(|a| {
                        a.as_deref()
                            .filter(|a| !is_missing_marker(a))
                            .map(normalize_identifier)
                    })
                    .collect(),
            })
            .collect();

        let canonical = rows.iter().map(|r| r.canonical.clone()).collect();

        let n_alias_columns = rows.iter().map(|r| r.aliases.len()).max().unwrap_or(0);
        let mut alias_index: HashMap<String, usize> = HashMap::new();
        let mut ambiguous_aliases = HashSet::new();
        for col in 0..n_alias_columns {
            for (i, row) in rows.iter().enumerate() {
                let Some(Some(alias)) = row.aliases.get(col) else {
                    continue;
                };
                match alias_index.entry(alias.clone()) {
                    Entry::Vacant(e) => {
                        e.insert(i);
                    }
                    Entry::Occupied(e) => {
                        if rows[*e.get()].canonical != row.canonical {
                            ambiguous_aliases.insert(alias.clone());
                        }
                    }
                }
            }
        }

        let mut value_index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            for value in row.values() {
                let hits = value_index.entry(value.to_string()).or_default();
                if hits.last() != Some(&i) {
                    hits.push(i);
                }
            }
        }

        info!(
            "Alias table built: {} genes, {} aliases ({} ambiguous)",
            rows.len(),
            alias_index.len(),
            ambiguous_aliases.len()
        );

        Self {
            rows,
            canonical,
            alias_index,
            ambiguous_aliases,
            value_index,
        }
    }

    /// Build from a delimited table using named columns
    pub fn from_table(table: &Table, schema: &AliasTableSchema) -> Result<Self> {
        let gene_idx = table.require_column(&schema.gene_column, "alias table")?;
        let alias_cols: Vec<usize> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.starts_with(&schema.alias_column_prefix))
            .map(|(i, _)| i)
            .collect();
        let annotation_cols: Vec<usize> = (0..table.headers.len())
            .filter(|i| *i != gene_idx && !alias_cols.contains(i))
            .collect();
        debug!(
            "Alias table columns: {} alias, {} annotation",
            alias_cols.len(),
            annotation_cols.len()
        );

        let mut rows = Vec::with_capacity(table.records.len());
        for record in &table.records {
            let canonical = record.get(gene_idx).unwrap_or("").trim();
            if is_missing_marker(canonical) {
                continue;
            }
            let annotations = annotation_cols
                .iter()
                .filter_map(|&i| record.get(i))
                .flat_map(split_multi_value)
                .collect();
            let aliases = alias_cols
                .iter()
                .map(|&i| record.get(i).map(|s| s.trim().to_string()))
                .collect();
            rows.push(AliasRow {
                canonical: canonical.to_string(),
                annotations,
                aliases,
            });
        }

        if rows.is_empty() {
            return Err(PrepError::Malformed("alias table has no gene rows".into()));
        }
        Ok(Self::from_rows(rows))
    }

    /// Whether `id` is a canonical identifier of this table
    pub fn is_canonical(&self, id: &str) -> bool {
        self.canonical.contains(id)
    }

    /// First-match lookup in the flattened alias index
    pub fn first_match(&self, alias: &str) -> Option<&str> {
        self.alias_index
            .get(alias)
            .map(|&i| self.rows[i].canonical.as_str())
    }

    /// Whether the flattened index silently dropped another mapping for `alias`
    pub fn is_ambiguous_alias(&self, alias: &str) -> bool {
        self.ambiguous_aliases.contains(alias)
    }

    /// Canonical identifiers of every row containing `value` in any column
    pub fn candidate_rows(&self, value: &str) -> Vec<&str> {
        self.value_index
            .get(value)
            .map(|rows| rows.iter().map(|&i| self.rows[i].canonical.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> &[AliasRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// Annotation cells may list several IDs ("ENSG01, ENSG02").
fn split_multi_value(cell: &str) -> Vec<String> {
    cell.split(&[',', '|', ';'][..])
        .map(str::trim)
        .filter(|s| !is_missing_marker(s))
        .map(str::to_string)
        .collect()
}
