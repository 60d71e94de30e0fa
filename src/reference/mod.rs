//! Static reference data shared by every preparation request.
//!
//! [`ReferenceTables`] is built once (from files via [`ReferenceTables::load`]
//! or programmatically via [`ReferenceTablesBuilder`]) and is read-only
//! afterwards. Share it as `&ReferenceTables` or `Arc<ReferenceTables>`.

pub mod alias;
pub mod gene_sets;
pub mod universe;

pub use alias::{AliasRow, AliasTable, AliasTableSchema};
pub use gene_sets::{FingerprintMatrix, GeneSetCatalog, FINGERPRINT_KEY_COLUMN};
pub use universe::{ReferenceGene, ReferenceUniverse, StatisticKind};

use crate::data::loader::read_table;
use crate::error::{PrepError, Result};
use crate::pipeline::config::ModelPath;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Locations of the reference files, typically read from a JSON file.
/// Relative paths are resolved against the JSON file's directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencePaths {
    pub alias_table: PathBuf,
    #[serde(default)]
    pub alias_schema: AliasTableSchema,
    /// Gene universe with per-gene means (neural-network path)
    pub neural_network_universe: Option<PathBuf>,
    /// Gene universe with per-gene medians (elastic-net path)
    pub elastic_net_universe: Option<PathBuf>,
    /// Fingerprint returned for the default gene set
    pub default_fingerprint: Option<PathBuf>,
    /// Fingerprint restricted for named gene sets
    pub fingerprint: Option<PathBuf>,
    pub hallmark_catalog: Option<PathBuf>,
    pub c2cp_catalog: Option<PathBuf>,
}

impl ReferencePaths {
    /// Read from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PrepError::io(path, e))?;
        let paths: Self = serde_json::from_str(&text)?;
        Ok(match path.parent() {
            Some(base) => paths.resolved_against(base),
            None => paths,
        })
    }

    fn resolved_against(self, base: &Path) -> Self {
        let join = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
        Self {
            alias_table: join(self.alias_table),
            alias_schema: self.alias_schema,
            neural_network_universe: self.neural_network_universe.map(join),
            elastic_net_universe: self.elastic_net_universe.map(join),
            default_fingerprint: self.default_fingerprint.map(join),
            fingerprint: self.fingerprint.map(join),
            hallmark_catalog: self.hallmark_catalog.map(join),
            c2cp_catalog: self.c2cp_catalog.map(join),
        }
    }
}

/// Immutable reference data: alias table, universes, fingerprints, catalogs
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    alias_table: AliasTable,
    neural_network_universe: Option<ReferenceUniverse>,
    elastic_net_universe: Option<ReferenceUniverse>,
    default_fingerprint: Option<FingerprintMatrix>,
    fingerprint: Option<FingerprintMatrix>,
    hallmark: GeneSetCatalog,
    c2cp: GeneSetCatalog,
}

impl ReferenceTables {
    pub fn builder(alias_table: AliasTable) -> ReferenceTablesBuilder {
        ReferenceTablesBuilder::new(alias_table)
    }

    /// Load every configured file once
    pub fn load(paths: &ReferencePaths) -> Result<Self> {
        info!("Loading reference tables");
        let alias_table = AliasTable::from_table(&read_table(&paths.alias_table)?, &paths.alias_schema)?;
        let mut builder = Self::builder(alias_table);

        if let Some(p) = &paths.neural_network_universe {
            builder = builder.neural_network_universe(ReferenceUniverse::from_table(
                &read_table(p)?,
                StatisticKind::Mean,
            )?);
        }
        if let Some(p) = &paths.elastic_net_universe {
            builder = builder.elastic_net_universe(ReferenceUniverse::from_table(
                &read_table(p)?,
                StatisticKind::Median,
            )?);
        }
        if let Some(p) = &paths.default_fingerprint {
            builder = builder.default_fingerprint(FingerprintMatrix::from_table(&read_table(p)?)?);
        }
        if let Some(p) = &paths.fingerprint {
            builder = builder.fingerprint(FingerprintMatrix::from_table(&read_table(p)?)?);
        }
        if let Some(p) = &paths.hallmark_catalog {
            builder = builder.hallmark(GeneSetCatalog::from_table("hallmark", &read_table(p)?));
        }
        if let Some(p) = &paths.c2cp_catalog {
            builder = builder.c2cp(GeneSetCatalog::from_table("c2cp", &read_table(p)?));
        }

        builder.build()
    }

    pub fn alias_table(&self) -> &AliasTable {
        &self.alias_table
    }

    /// Universe consumed by the given model path
    pub fn universe(&self, path: ModelPath) -> Result<&ReferenceUniverse> {
        let universe = match path {
            ModelPath::NeuralNetwork => self.neural_network_universe.as_ref(),
            ModelPath::ElasticNet => self.elastic_net_universe.as_ref(),
        };
        universe.ok_or_else(|| {
            PrepError::config(format!("no reference universe loaded for the {} path", path))
        })
    }

    /// Fingerprint returned for the default gene set
    pub fn default_fingerprint(&self) -> Option<&FingerprintMatrix> {
        self.default_fingerprint.as_ref().or(self.fingerprint.as_ref())
    }

    /// Fingerprint restricted for named gene sets
    pub fn fingerprint(&self) -> Option<&FingerprintMatrix> {
        self.fingerprint.as_ref().or(self.default_fingerprint.as_ref())
    }

    pub fn hallmark(&self) -> &GeneSetCatalog {
        &self.hallmark
    }

    pub fn c2cp(&self) -> &GeneSetCatalog {
        &self.c2cp
    }
}

/// One-time construction of [`ReferenceTables`]
pub struct ReferenceTablesBuilder {
    alias_table: AliasTable,
    neural_network_universe: Option<ReferenceUniverse>,
    elastic_net_universe: Option<ReferenceUniverse>,
    default_fingerprint: Option<FingerprintMatrix>,
    fingerprint: Option<FingerprintMatrix>,
    hallmark: GeneSetCatalog,
    c2cp: GeneSetCatalog,
}

impl ReferenceTablesBuilder {
    pub fn new(alias_table: AliasTable) -> Self {
        Self {
            alias_table,
            neural_network_universe: None,
            elastic_net_universe: None,
            default_fingerprint: None,
            fingerprint: None,
            hallmark: GeneSetCatalog::new("hallmark"),
            c2cp: GeneSetCatalog::new("c2cp"),
        }
    }

    pub fn neural_network_universe(mut self, universe: ReferenceUniverse) -> Self {
        self.neural_network_universe = Some(universe);
        self
    }

    pub fn elastic_net_universe(mut self, universe: ReferenceUniverse) -> Self {
        self.elastic_net_universe = Some(universe);
        self
    }

    pub fn default_fingerprint(mut self, fingerprint: FingerprintMatrix) -> Self {
        self.default_fingerprint = Some(fingerprint);
        self
    }

    pub fn fingerprint(mut self, fingerprint: FingerprintMatrix) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn hallmark(mut self, catalog: GeneSetCatalog) -> Self {
        self.hallmark = catalog;
        self
    }

    pub fn c2cp(mut self, catalog: GeneSetCatalog) -> Self {
        self.c2cp = catalog;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> Result<ReferenceTables> {
        for (path, universe) in [
            (ModelPath::NeuralNetwork, &self.neural_network_universe),
            (ModelPath::ElasticNet, &self.elastic_net_universe),
        ] {
            let Some(universe) = universe else { continue };
            if universe.kind() != path.statistic_kind() {
                return Err(PrepError::config(format!(
                    "the {} universe must carry {} statistics, got {}",
                    path,
                    path.statistic_kind(),
                    universe.kind()
                )));
            }
            if universe.is_empty() {
                return Err(PrepError::config(format!("the {} universe is empty", path)));
            }
            for (gene, count) in universe.repeated_genes() {
                warn!("{} universe lists '{}' {} times", path, gene, count);
            }
        }

        if self.neural_network_universe.is_none() && self.elastic_net_universe.is_none() {
            warn!("No reference universe configured; every preparation request will fail");
        }

        Ok(ReferenceTables {
            alias_table: self.alias_table,
            neural_network_universe: self.neural_network_universe,
            elastic_net_universe: self.elastic_net_universe,
            default_fingerprint: self.default_fingerprint,
            fingerprint: self.fingerprint,
            hallmark: self.hallmark,
            c2cp: self.c2cp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_build_rejects_wrong_statistic_kind() {
        let result = ReferenceTables::builder(AliasTable::default())
            .neural_network_universe(ReferenceUniverse::from_pairs(
                StatisticKind::Median,
                &[("TP53", 1.0)],
            ))
            .build();
        assert!(matches!(result, Err(PrepError::Configuration(_))));
    }

    #[test]
    fn test_missing_universe_is_configuration_error() {
        let tables = ReferenceTables::builder(AliasTable::default())
            .elastic_net_universe(ReferenceUniverse::from_pairs(
                StatisticKind::Median,
                &[("TP53", 1.0)],
            ))
            .build()
            .unwrap();
        assert!(tables.universe(ModelPath::ElasticNet).is_ok());
        assert!(tables.universe(ModelPath::NeuralNetwork).unwrap_err().is_configuration());
    }

    #[test]
    fn test_single_fingerprint_serves_both_roles() {
        let fp = FingerprintMatrix::new(vec!["SET".into()], vec!["TP53".into()], vec![vec![1.0]])
            .unwrap();
        let tables = ReferenceTables::builder(AliasTable::default())
            .fingerprint(fp.clone())
            .build()
            .unwrap();
        assert_eq!(tables.default_fingerprint(), Some(&fp));
        assert_eq!(tables.fingerprint(), Some(&fp));
    }

    #[test]
    fn test_load_from_paths_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("alias.csv"),
            "Gene,Ensembl_ID,gene_alias1\nTP53,ENSG00000141510,P53\n",
        )
        .unwrap();
        fs::write(dir.path().join("means.csv"), "Gene,Mean\nTP53,2.0\nEGFR,4.2\n").unwrap();
        fs::write(dir.path().join("fp.csv"), "GeneSet,TP53\nSET_A,1\n").unwrap();
        fs::write(dir.path().join("hallmark.csv"), "HALLMARK_P53_PATHWAY\nTP53\n").unwrap();
        fs::write(
            dir.path().join("refs.json"),
            r#"{
                "alias_table": "alias.csv",
                "neural_network_universe": "means.csv",
                "fingerprint": "fp.csv",
                "hallmark_catalog": "hallmark.csv"
            }"#,
        )
        .unwrap();

        let paths = ReferencePaths::from_file(dir.path().join("refs.json")).unwrap();
        let tables = ReferenceTables::load(&paths).unwrap();

        assert_eq!(tables.alias_table().first_match("P53"), Some("TP53"));
        assert_eq!(tables.universe(ModelPath::NeuralNetwork).unwrap().len(), 2);
        assert!(tables.default_fingerprint().is_some());
        assert!(tables.hallmark().get("HALLMARK_P53_PATHWAY").is_some());
        assert!(tables.c2cp().is_empty());
    }
}
