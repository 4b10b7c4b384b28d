//! Source normalization: one canonical text per retrieved contract.

pub mod artifact;
pub mod flatten;
pub mod priority;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PriorityWeights;
use crate::errors::{ScanError, ScanResult};
use crate::models::{ContractSource, RawArtifact, UnavailableContract, UnavailableReason};

pub use artifact::{parse_source_code, ParsedSource};
pub use flatten::flatten_bundle;
pub use priority::{file_priority, select_main_file, FilePriority};

/// Raw corpus as handed over by retrieval: `None` marks an unavailable contract.
pub type RawCorpus = BTreeMap<String, Option<RawArtifact>>;

/// Canonical sources plus the contracts that could not be normalized.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCorpus {
    /// Number of contracts originally requested.
    pub requested: usize,
    pub sources: BTreeMap<String, ContractSource>,
    pub unavailable: Vec<UnavailableContract>,
}

impl NormalizedCorpus {
    pub fn available_count(&self) -> usize {
        self.sources.len()
    }

    /// Build directly from already-canonical sources.
    pub fn from_sources<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = ContractSource>,
    {
        let sources: BTreeMap<String, ContractSource> =
            sources.into_iter().map(|s| (s.id.clone(), s)).collect();
        Self {
            requested: sources.len(),
            sources,
            unavailable: Vec::new(),
        }
    }
}

fn from_bundle(
    id: &str,
    mut files: BTreeMap<String, String>,
    weights: &PriorityWeights,
) -> ScanResult<ContractSource> {
    let main = select_main_file(&files, weights)
        .map(str::to_string)
        .ok_or_else(|| ScanError::EmptySource(id.to_string()))?;
    let canonical = files
        .remove(&main)
        .ok_or_else(|| ScanError::EmptySource(id.to_string()))?;
    debug!(
        "Selected {} as main file for {} ({} auxiliary files)",
        main,
        id,
        files.len()
    );
    Ok(ContractSource {
        id: id.to_string(),
        canonical,
        main_file: Some(main),
        auxiliary: files,
    })
}

/// Turn one raw artifact into a [`ContractSource`].
pub fn normalize_artifact(
    id: &str,
    artifact: &RawArtifact,
    weights: &PriorityWeights,
) -> ScanResult<ContractSource> {
    let parsed = match artifact {
        RawArtifact::Text(text) => {
            if text.trim().is_empty() {
                return Err(ScanError::EmptySource(id.to_string()));
            }
            parse_source_code(text)?
        }
        RawArtifact::Bundle(files) => ParsedSource::Bundle(files.clone()),
        RawArtifact::Malformed(detail) => return Err(ScanError::MalformedBundle(detail.clone())),
    };

    match parsed {
        ParsedSource::Flat(text) => {
            if text.trim().is_empty() {
                return Err(ScanError::EmptySource(id.to_string()));
            }
            Ok(ContractSource::flat(id, text))
        }
        ParsedSource::Bundle(files) => from_bundle(id, files, weights),
    }
}

fn unavailable_reason(err: &ScanError) -> UnavailableReason {
    match err {
        ScanError::EmptySource(_) => UnavailableReason::EmptySource,
        ScanError::MalformedBundle(detail) => UnavailableReason::MalformedBundle(detail.clone()),
        other => UnavailableReason::MalformedBundle(other.to_string()),
    }
}

/// Normalize every entry of a raw corpus.  Failures are recorded, never raised.
pub fn normalize_corpus(corpus: &RawCorpus, weights: &PriorityWeights) -> NormalizedCorpus {
    let mut normalized = NormalizedCorpus {
        requested: corpus.len(),
        ..Default::default()
    };

    for (id, entry) in corpus {
        let Some(artifact) = entry else {
            normalized.unavailable.push(UnavailableContract {
                id: id.clone(),
                reason: UnavailableReason::NotRetrieved,
            });
            continue;
        };
        match normalize_artifact(id, artifact, weights) {
            Ok(source) => {
                normalized.sources.insert(id.clone(), source);
            }
            Err(e) => {
                warn!("Excluding contract {} from comparison: {}", id, e);
                normalized.unavailable.push(UnavailableContract {
                    id: id.clone(),
                    reason: unavailable_reason(&e),
                });
            }
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<RawArtifact> {
        Some(RawArtifact::Text(s.to_string()))
    }

    #[test]
    fn test_flat_text_is_canonical() {
        let w = PriorityWeights::default();
        let source = normalize_artifact("0xa", &RawArtifact::Text("contract A {}".into()), &w)
            .unwrap();
        assert_eq!(source.canonical, "contract A {}");
        assert!(!source.is_bundle());
        assert!(source.auxiliary.is_empty());
    }

    #[test]
    fn test_bundle_keeps_auxiliary_files() {
        let w = PriorityWeights::default();
        let mut files = BTreeMap::new();
        files.insert(
            "@openzeppelin/contracts/token/ERC721/ERC721.sol".to_string(),
            format!("contract ERC721 {{ {} }}", "x".repeat(2_000)),
        );
        files.insert("contracts/Drop.sol".to_string(), "contract Drop {}".to_string());
        let source = normalize_artifact("0xa", &RawArtifact::Bundle(files), &w).unwrap();
        assert_eq!(source.main_file.as_deref(), Some("contracts/Drop.sol"));
        assert_eq!(source.canonical, "contract Drop {}");
        assert_eq!(source.auxiliary.len(), 1);
    }

    #[test]
    fn test_etherscan_json_text_selects_main_file() {
        let w = PriorityWeights::default();
        let payload = r#"{{"language":"Solidity","sources":{"contracts/NFT.sol":{"content":"contract NFT {}"},"node_modules/x/Lib.sol":{"content":"contract Lib { uint256 a; uint256 b; }"}}}}"#;
        let source = normalize_artifact("0xa", &RawArtifact::Text(payload.into()), &w).unwrap();
        assert_eq!(source.main_file.as_deref(), Some("contracts/NFT.sol"));
    }

    #[test]
    fn test_corpus_records_failures_and_continues() {
        let w = PriorityWeights::default();
        let mut corpus: RawCorpus = BTreeMap::new();
        corpus.insert("0xa".into(), text("contract A {}"));
        corpus.insert("0xb".into(), None);
        corpus.insert("0xc".into(), text("   "));
        corpus.insert("0xd".into(), text("{\"sources\": "));
        corpus.insert("0xe".into(), text("contract E {}"));

        let normalized = normalize_corpus(&corpus, &w);
        assert_eq!(normalized.requested, 5);
        assert_eq!(normalized.available_count(), 2);
        let reasons: Vec<(&str, &str)> = normalized
            .unavailable
            .iter()
            .map(|u| (u.id.as_str(), u.reason.label()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("0xb", "not_retrieved"),
                ("0xc", "empty_source"),
                ("0xd", "malformed_bundle"),
            ]
        );
    }

    #[test]
    fn test_empty_corpus() {
        let normalized = normalize_corpus(&RawCorpus::new(), &PriorityWeights::default());
        assert_eq!(normalized.requested, 0);
        assert!(normalized.sources.is_empty());
        assert!(normalized.unavailable.is_empty());
    }
}
