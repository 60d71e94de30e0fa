//! Identifier classification and alias resolution.
//!
//! Every raw identifier maps to exactly one [`Resolution`]. Identifiers that
//! cannot be resolved are carried through unchanged; they fail to match the
//! reference universe during alignment and the gene is imputed instead.
//!
//! Two strategies exist and the choice is explicit ([`ResolutionPolicy`]):
//! - [`Strictness::FirstMatch`]: look the identifier up in the flattened alias
//!   index, first mapping wins;
//! - [`Strictness::UniqueMatch`]: search every column of the alias table and
//!   accept only when exactly one row contains the identifier.

pub mod classify;

pub use classify::{classify, is_ensembl, IdentifierKind};

use crate::reference::{AliasTable, ReferenceUniverse};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Alias matching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strictness {
    FirstMatch,
    UniqueMatch,
}

/// Strategy per identifier partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Symbols when no identifier is an Ensembl ID
    pub symbol_only: Strictness,
    /// Symbols in a mixed upload
    pub mixed_symbols: Strictness,
    /// Ensembl IDs, whether the upload is Ensembl-only or mixed
    pub ensembl: Strictness,
}

impl ResolutionPolicy {
    /// Historical behaviour: symbol-only uploads use the flattened index,
    /// every other partition requires a unique row match
    pub fn legacy() -> Self {
        Self {
            symbol_only: Strictness::FirstMatch,
            mixed_symbols: Strictness::UniqueMatch,
            ensembl: Strictness::UniqueMatch,
        }
    }

    /// Same strategy everywhere
    pub fn uniform(strictness: Strictness) -> Self {
        Self {
            symbol_only: strictness,
            mixed_symbols: strictness,
            ensembl: strictness,
        }
    }

    /// Strategy for one identifier given the upload's kind
    pub fn for_identifier(&self, kind: IdentifierKind, id: &str) -> Strictness {
        match (kind, is_ensembl(id)) {
            (_, true) => self.ensembl,
            (IdentifierKind::Mixed, false) => self.mixed_symbols,
            (_, false) => self.symbol_only,
        }
    }
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::legacy()
    }
}

/// Outcome for a single raw identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Already a canonical identifier
    Direct(String),
    /// Mapped through the alias table. `shadowed` is set when the first-match
    /// index silently discarded another canonical target for this alias.
    Alias {
        raw: String,
        canonical: String,
        shadowed: bool,
    },
    /// Several alias-table rows contain the identifier
    Ambiguous { raw: String, candidates: Vec<String> },
    /// No match
    Unresolved(String),
}

impl Resolution {
    /// Key used to join against the reference universe
    pub fn key(&self) -> &str {
        match self {
            Resolution::Direct(id) | Resolution::Unresolved(id) => id,
            Resolution::Alias { canonical, .. } => canonical,
            Resolution::Ambiguous { raw, .. } => raw,
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            Resolution::Direct(id) | Resolution::Unresolved(id) => id,
            Resolution::Alias { raw, .. } | Resolution::Ambiguous { raw, .. } => raw,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Direct(_) | Resolution::Alias { .. })
    }
}

/// Counts over one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolutionSummary {
    pub direct: usize,
    pub by_alias: usize,
    /// First-match resolutions that shadowed another candidate
    pub shadowed_aliases: usize,
    pub ambiguous: usize,
    pub unresolved: usize,
}

impl ResolutionSummary {
    pub fn from_resolutions(resolutions: &[Resolution]) -> Self {
        let mut summary = Self::default();
        for r in resolutions {
            match r {
                Resolution::Direct(_) => summary.direct += 1,
                Resolution::Alias { shadowed, .. } => {
                    summary.by_alias += 1;
                    if *shadowed {
                        summary.shadowed_aliases += 1;
                    }
                }
                Resolution::Ambiguous { .. } => summary.ambiguous += 1,
                Resolution::Unresolved(_) => summary.unresolved += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.direct + self.by_alias + self.ambiguous + self.unresolved
    }
}

/// Maps raw identifiers onto canonical reference identifiers
pub struct AliasResolver<'a> {
    table: &'a AliasTable,
    reference: HashSet<&'a str>,
    policy: ResolutionPolicy,
}

impl<'a> AliasResolver<'a> {
    pub fn new(table: &'a AliasTable) -> Self {
        Self {
            table,
            reference: HashSet::new(),
            policy: ResolutionPolicy::default(),
        }
    }

    /// Treat the universe's genes as canonical too
    pub fn with_reference(mut self, universe: &'a ReferenceUniverse) -> Self {
        self.reference = universe.gene_ids().collect();
        self
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    fn is_canonical(&self, id: &str) -> bool {
        self.table.is_canonical(id) || self.reference.contains(id)
    }

    /// Resolve one identifier with an explicit strategy
    pub fn resolve_one(&self, id: &str, strictness: Strictness) -> Resolution {
        if self.is_canonical(id) {
            return Resolution::Direct(id.to_string());
        }
        match strictness {
            Strictness::FirstMatch => match self.table.first_match(id) {
                Some(canonical) => Resolution::Alias {
                    raw: id.to_string(),
                    canonical: canonical.to_string(),
                    shadowed: self.table.is_ambiguous_alias(id),
                },
                None => Resolution::Unresolved(id.to_string()),
            },
            Strictness::UniqueMatch => {
                let candidates = self.table.candidate_rows(id);
                match candidates.as_slice() {
                    [] => Resolution::Unresolved(id.to_string()),
                    [canonical] => Resolution::Alias {
                        raw: id.to_string(),
                        canonical: canonical.to_string(),
                        shadowed: false,
                    },
                    _ => Resolution::Ambiguous {
                        raw: id.to_string(),
                        candidates: candidates.iter().map(|c| c.to_string()).collect(),
                    },
                }
            }
        }
    }

    /// Resolve every identifier; output order and length match the input.
    /// The namespace kind is computed over the de-duplicated list.
    pub fn resolve(&self, ids: &[String]) -> (IdentifierKind, Vec<Resolution>) {
        let unique: Vec<&str> = {
            let mut seen = HashSet::new();
            ids.iter().map(|s| s.as_str()).filter(|s| seen.insert(*s)).collect()
        };
        let kind = classify(&unique);
        debug!("Identifier namespace: {}", kind);

        let resolutions: Vec<Resolution> = ids
            .iter()
            .map(|id| {
                let resolution = self.resolve_one(id, self.policy.for_identifier(kind, id));
                match &resolution {
                    Resolution::Alias {
                        raw,
                        canonical,
                        shadowed,
                    } => {
                        if *shadowed {
                            debug!("Alias '{}' has several targets; using '{}'", raw, canonical);
                        } else {
                            debug!("Resolved '{}' -> '{}'", raw, canonical);
                        }
                    }
                    Resolution::Ambiguous { raw, candidates } => {
                        debug!("'{}' matches {} alias rows: {:?}", raw, candidates.len(), candidates)
                    }
                    Resolution::Unresolved(raw) => debug!("'{}' is unresolved", raw),
                    Resolution::Direct(_) => {}
                }
                resolution
            })
            .collect();

        let summary = ResolutionSummary::from_resolutions(&resolutions);
        info!(
            "Resolved {} identifiers ({}): direct={}, alias={}, ambiguous={}, unresolved={}",
            summary.total(),
            kind,
            summary.direct,
            summary.by_alias,
            summary.ambiguous,
            summary.unresolved
        );
        if summary.ambiguous > 0 || summary.shadowed_aliases > 0 {
            warn!(
                "{} identifiers left unresolved as ambiguous, {} resolved by first match among several targets",
                summary.ambiguous, summary.shadowed_aliases
            );
        }

        (kind, resolutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{AliasRow, StatisticKind};

    fn table() -> AliasTable {
        AliasTable::from_rows(vec![
            AliasRow::new("TP53BP2", &["ENSG00000143514"], &["ASPP2", "TP53BP2-OLD"]),
            AliasRow::new("TP63", &["ENSG00000073282"], &["KET", "TP53BP2-OLD"]),
            AliasRow::new("KRAS", &["ENSG00000133703"], &["K-RAS"]),
            AliasRow::new("TP53", &["ENSG00000141510"], &["P53"]),
        ])
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_canonical_identifier_is_fixed_point() {
        let table = table();
        let resolver = AliasResolver::new(&table);
        for strictness in [Strictness::FirstMatch, Strictness::UniqueMatch] {
            assert_eq!(
                resolver.resolve_one("KRAS", strictness),
                Resolution::Direct("KRAS".to_string())
            );
        }
    }

    #[test]
    fn test_reference_genes_count_as_canonical() {
        let table = table();
        let universe = ReferenceUniverse::from_pairs(StatisticKind::Mean, &[("EGFR", 1.0)]);
        let resolver = AliasResolver::new(&table).with_reference(&universe);
        assert_eq!(
            resolver.resolve_one("EGFR", Strictness::UniqueMatch),
            Resolution::Direct("EGFR".to_string())
        );
    }

    #[test]
    fn test_first_match_keeps_one_mapping() {
        let table = table();
        let resolver = AliasResolver::new(&table);
        let r = resolver.resolve_one("TP53BP2-OLD", Strictness::FirstMatch);
        assert_eq!(r.key(), "TP53BP2");
        assert!(matches!(r, Resolution::Alias { shadowed: true, .. }));
    }

    #[test]
    fn test_unique_match_rejects_two_candidates() {
        let table = table();
        let resolver = AliasResolver::new(&table);
        let r = resolver.resolve_one("TP53BP2-OLD", Strictness::UniqueMatch);
        assert_eq!(
            r,
            Resolution::Ambiguous {
                raw: "TP53BP2-OLD".to_string(),
                candidates: vec!["TP53BP2".to_string(), "TP63".to_string()],
            }
        );
        assert_eq!(r.key(), "TP53BP2-OLD");
        assert!(!r.is_resolved());
    }

    #[test]
    fn test_unique_match_finds_ensembl_annotation() {
        let table = table();
        let resolver = AliasResolver::new(&table);
        let r = resolver.resolve_one("ENSG00000133703", Strictness::UniqueMatch);
        assert_eq!(r.key(), "KRAS");
        // the flattened index only holds alias columns
        let r = resolver.resolve_one("ENSG00000133703", Strictness::FirstMatch);
        assert_eq!(r, Resolution::Unresolved("ENSG00000133703".to_string()));
    }

    #[test]
    fn test_resolve_mixed_preserves_order_and_length() {
        let table = table();
        let resolver = AliasResolver::new(&table);
        let input = ids(&["P53", "ENSG00000133703", "FAKE", "P53", "ENSG00000000000"]);
        let (kind, resolutions) = resolver.resolve(&input);

        assert_eq!(kind, IdentifierKind::Mixed);
        assert_eq!(resolutions.len(), input.len());
        let keys: Vec<&str> = resolutions.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["TP53", "KRAS", "FAKE", "TP53", "ENSG00000000000"]);

        let summary = ResolutionSummary::from_resolutions(&resolutions);
        assert_eq!(summary.by_alias, 3);
        assert_eq!(summary.unresolved, 2);
    }

    #[test]
    fn test_legacy_policy_per_partition() {
        let table = table();
        let resolver = AliasResolver::new(&table);

        // symbol-only upload: first match wins
        let (_, r) = resolver.resolve(&ids(&["TP53BP2-OLD"]));
        assert_eq!(r[0].key(), "TP53BP2");

        // mixed upload: symbols need a unique row
        let (_, r) = resolver.resolve(&ids(&["TP53BP2-OLD", "ENSG00000141510"]));
        assert!(matches!(r[0], Resolution::Ambiguous { .. }));
        assert_eq!(r[1].key(), "TP53");
    }

    #[test]
    fn test_uniform_policy() {
        let table = table();
        let resolver = AliasResolver::new(&table)
            .with_policy(ResolutionPolicy::uniform(Strictness::UniqueMatch));
        let (kind, r) = resolver.resolve(&ids(&["TP53BP2-OLD"]));
        assert_eq!(kind, IdentifierKind::SymbolOnly);
        assert!(matches!(r[0], Resolution::Ambiguous { .. }));
    }
}
