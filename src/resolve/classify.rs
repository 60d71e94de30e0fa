use crate::data::ENSEMBL_PREFIX;
use serde::Serialize;

/// Namespace(s) present in an uploaded identifier list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierKind {
    SymbolOnly,
    EnsemblOnly,
    Mixed,
}

impl IdentifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierKind::SymbolOnly => "SYMBOL_ONLY",
            IdentifierKind::EnsemblOnly => "ENSEMBL_ONLY",
            IdentifierKind::Mixed => "MIXED",
        }
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn is_ensembl(id: &str) -> bool {
    id.starts_with(ENSEMBL_PREFIX)
}

/// Classify upper-cased identifiers. An empty list is symbol-only.
pub fn classify<S: AsRef<str>>(ids: &[S]) -> IdentifierKind {
    let ensembl = ids.iter().filter(|id| is_ensembl(id.as_ref())).count();
    if ensembl == 0 {
        IdentifierKind::SymbolOnly
    } else if ensembl == ids.len() {
        IdentifierKind::EnsemblOnly
    } else {
        IdentifierKind::Mixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(&["TP53", "BRCA1"]), IdentifierKind::SymbolOnly);
        assert_eq!(
            classify(&["ENSG00000141510", "ENSG00000012048"]),
            IdentifierKind::EnsemblOnly
        );
        assert_eq!(classify(&["TP53", "ENSG00000012048"]), IdentifierKind::Mixed);
    }

    #[test]
    fn test_empty_is_symbol_only() {
        let empty: [&str; 0] = [];
        assert_eq!(classify(&empty), IdentifierKind::SymbolOnly);
    }

    #[test]
    fn test_prefix_is_case_sensitive_after_folding() {
        // callers fold case first; a lower-case prefix is not recognized
        assert_eq!(classify(&["ensg00000141510"]), IdentifierKind::SymbolOnly);
    }
}
