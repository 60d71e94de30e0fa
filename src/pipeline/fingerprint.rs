//! Fingerprint Selector for the neural-network path.

use crate::error::{PrepError, Result};
use crate::pipeline::config::GeneSetSelector;
use crate::reference::{FingerprintMatrix, ReferenceTables};
use tracing::info;

/// Where a named gene set was found
#[derive(Debug, Clone, PartialEq)]
pub struct GeneSetLookup<'a> {
    pub catalog: &'a str,
    pub members: &'a [String],
}

/// Look a set up in the Hallmark catalog, then in C2CP
pub fn lookup_gene_set<'a>(tables: &'a ReferenceTables, name: &str) -> Result<GeneSetLookup<'a>> {
    [tables.hallmark(), tables.c2cp()]
        .into_iter()
        .find_map(|catalog| {
            catalog.get(name).map(|members| GeneSetLookup {
                catalog: catalog.name(),
                members,
            })
        })
        .ok_or_else(|| {
            PrepError::config(format!(
                "gene set '{}' not found in the {} or {} catalogs",
                name,
                tables.hallmark().name(),
                tables.c2cp().name()
            ))
        })
}

/// Check that a selector can be satisfied without building the matrix
pub fn validate_selector(tables: &ReferenceTables, selector: &GeneSetSelector) -> Result<()> {
    select_fingerprint(tables, selector).map(|_| ())
}

/// Build the fingerprint matrix paired with the expression matrix
pub fn select_fingerprint(
    tables: &ReferenceTables,
    selector: &GeneSetSelector,
) -> Result<FingerprintMatrix> {
    match selector {
        GeneSetSelector::Default => tables
            .default_fingerprint()
            .cloned()
            .ok_or_else(|| PrepError::config("no default fingerprint table configured")),
        GeneSetSelector::Named(name) => {
            let found = lookup_gene_set(tables, name)?;
            let fingerprint = tables
                .fingerprint()
                .ok_or_else(|| PrepError::config("no fingerprint table configured"))?;

            let members: Vec<&str> = found
                .members
                .iter()
                .map(String::as_str)
                .filter(|m| fingerprint.has_column(m))
                .collect();
            if members.is_empty() {
                return Err(PrepError::config(format!(
                    "gene set '{}' has no valid genes in the fingerprint table",
                    name
                )));
            }

            info!(
                "Gene set {} ({}): {} of {} members in fingerprint",
                name,
                found.catalog,
                members.len(),
                found.members.len()
            );
            Ok(fingerprint.select_columns(&members))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{
        AliasRow, AliasTable, GeneSetCatalog, ReferenceUniverse, StatisticKind,
    };

    fn tables() -> ReferenceTables {
        let aliases = AliasTable::from_rows(vec![AliasRow::new("TP53", &[], &[])]);
        let fingerprint = FingerprintMatrix::new(
            vec!["SET_A".into(), "SET_B".into()],
            vec!["TP53".into(), "BAX".into(), "MYC".into()],
            vec![vec![1.0, 0.0, 1.0], vec![0.0, 1.0, 0.0]],
        )
        .unwrap();
        let mut hallmark = GeneSetCatalog::new("hallmark");
        hallmark.insert("HALLMARK_P53_PATHWAY", &["TP53", "BAX", "CDKN1A"]);
        hallmark.insert("HALLMARK_EMPTY", &["NOTINFINGERPRINT"]);
        let mut c2cp = GeneSetCatalog::new("c2cp");
        c2cp.insert("REACTOME_MYC", &["MYC"]);
        c2cp.insert("HALLMARK_P53_PATHWAY", &["MYC"]);

        ReferenceTables::builder(aliases)
            .neural_network_universe(ReferenceUniverse::from_pairs(
                StatisticKind::Mean,
                &[("TP53", 1.0)],
            ))
            .fingerprint(fingerprint)
            .hallmark(hallmark)
            .c2cp(c2cp)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_returns_full_table() {
        let tables = tables();
        let fp = select_fingerprint(&tables, &GeneSetSelector::Default).unwrap();
        assert_eq!(fp.n_columns(), 3);
        assert_eq!(fp.keys(), &["SET_A", "SET_B"]);
    }

    #[test]
    fn test_named_set_intersects_columns() {
        let tables = tables();
        let fp =
            select_fingerprint(&tables, &GeneSetSelector::Named("HALLMARK_P53_PATHWAY".into()))
                .unwrap();
        // hallmark is searched first
        assert_eq!(fp.columns(), &["TP53", "BAX"]);
        assert_eq!(fp.values(), &[vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(fp.n_rows(), 2);
    }

    #[test]
    fn test_falls_back_to_c2cp() {
        let tables = tables();
        let found = lookup_gene_set(&tables, "REACTOME_MYC").unwrap();
        assert_eq!(found.catalog, "c2cp");
        let fp =
            select_fingerprint(&tables, &GeneSetSelector::Named("REACTOME_MYC".into())).unwrap();
        assert_eq!(fp.columns(), &["MYC"]);
    }

    #[test]
    fn test_unknown_set_is_configuration_error() {
        let tables = tables();
        let err = validate_selector(&tables, &GeneSetSelector::Named("HALLMARK_APOPTOSIS".into()))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("HALLMARK_APOPTOSIS"));
    }

    #[test]
    fn test_empty_intersection_is_configuration_error() {
        let tables = tables();
        let err = select_fingerprint(&tables, &GeneSetSelector::Named("HALLMARK_EMPTY".into()))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
