//! Risk aggregation: tiers, clusters, summary statistics and the final
//! report document.
//!
//! Everything here is a pure function of the pair table; the similarity
//! engine is never consulted again once pairs are scored.

pub mod clusters;
pub mod crossref;
pub mod summary;
pub mod tiers;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, RiskThresholds};
use crate::errors::ScanResult;
use crate::models::{CloneCluster, SimilarityPair, UnavailableContract};
use crate::normalizer::NormalizedCorpus;
use crate::orchestrator::PairTable;

pub use clusters::{build_clusters, UnionFind};
pub use crossref::{cross_reference, shared_findings, CrossReference, FindingsIndex, SeverityCounts};
pub use summary::{summarize, top_k, ContractAggregate, Metric, RankedPair, SimilaritySummary};
pub use tiers::{bucket_of, distribution, RiskTier};

/// Settings that shaped the report, echoed so readers know the thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub clone_threshold: f64,
    pub flag_partial_matches: bool,
    pub thresholds: RiskThresholds,
    pub top_k: usize,
    pub large_text_threshold: usize,
    pub sample_chars: usize,
    pub sample_discount: f64,
}

impl From<&AnalysisConfig> for ReportSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            clone_threshold: config.clone_threshold,
            flag_partial_matches: config.flag_partial_matches,
            thresholds: config.thresholds.clone(),
            top_k: config.top_k,
            large_text_threshold: config.similarity.large_text_threshold,
            sample_chars: config.similarity.sample_chars,
            sample_discount: config.similarity.sample_discount,
        }
    }
}

/// Which contracts took part and which were left out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusAccounting {
    pub requested: usize,
    pub compared: usize,
    pub excluded_count: usize,
    pub excluded_by_reason: BTreeMap<String, usize>,
    pub excluded: Vec<UnavailableContract>,
}

impl CorpusAccounting {
    pub fn new(requested: usize, compared: usize, mut excluded: Vec<UnavailableContract>) -> Self {
        excluded.sort();
        let mut excluded_by_reason: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &excluded {
            *excluded_by_reason
                .entry(entry.reason.label().to_string())
                .or_default() += 1;
        }
        Self {
            requested,
            compared,
            excluded_count: excluded.len(),
            excluded_by_reason,
            excluded,
        }
    }
}

/// The complete output of one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    pub settings: ReportSettings,
    pub corpus: CorpusAccounting,
    /// Pair key -> scores, in enumeration order.
    pub pairs: IndexMap<String, SimilarityPair>,
    pub high_risk: Vec<RankedPair>,
    pub clusters: Vec<CloneCluster>,
    pub summary: SimilaritySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<CrossReference>,
}

/// Pairs at or above the clone threshold, highest first.
pub fn high_risk_pairs(
    pairs: &[SimilarityPair],
    clone_threshold: f64,
    flag_partial_matches: bool,
) -> Vec<RankedPair> {
    let mut flagged: Vec<RankedPair> = pairs
        .iter()
        .filter(|p| {
            p.full_similarity >= clone_threshold
                || (flag_partial_matches && p.partial_similarity >= clone_threshold)
        })
        .map(RankedPair::from)
        .collect();
    flagged.sort_by(|a, b| {
        b.max_similarity()
            .total_cmp(&a.max_similarity())
            .then_with(|| a.pair_key.cmp(&b.pair_key))
    });
    flagged
}

/// Aggregate a scored pair table into a report.
pub fn build_report(
    table: &PairTable,
    corpus: &NormalizedCorpus,
    config: &AnalysisConfig,
) -> SimilarityReport {
    let mut excluded = corpus.unavailable.clone();
    excluded.extend(table.skipped.iter().cloned());

    let pairs: IndexMap<String, SimilarityPair> =
        table.pairs.iter().map(|p| (p.key(), p.clone())).collect();

    SimilarityReport {
        settings: ReportSettings::from(config),
        corpus: CorpusAccounting::new(corpus.requested, table.compared.len(), excluded),
        pairs,
        high_risk: high_risk_pairs(
            &table.pairs,
            config.clone_threshold,
            config.flag_partial_matches,
        ),
        clusters: build_clusters(&table.pairs, config.clone_threshold),
        summary: summarize(
            &table.pairs,
            &table.compared,
            &config.thresholds,
            config.clone_threshold,
            config.top_k,
        ),
        vulnerabilities: None,
    }
}

impl SimilarityReport {
    pub fn pair(&self, a: &str, b: &str) -> Option<&SimilarityPair> {
        self.pairs.get(&crate::models::pair_key(a, b))
    }

    pub fn pair_list(&self) -> Vec<SimilarityPair> {
        self.pairs.values().cloned().collect()
    }

    /// Tier of a pair's full similarity, recomputed from the stored score.
    pub fn full_tier(&self, pair: &SimilarityPair) -> RiskTier {
        RiskTier::classify(pair.full_similarity, &self.settings.thresholds)
    }

    pub fn cluster_of(&self, id: &str) -> Option<&CloneCluster> {
        self.clusters.iter().find(|c| c.contains(id))
    }

    /// Fill in the vulnerability cross-reference for the high-risk pairs.
    pub fn attach_findings(&mut self, findings: &FindingsIndex) {
        self.vulnerabilities = Some(cross_reference(&self.high_risk, findings));
    }

    pub fn to_json(&self) -> ScanResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> ScanResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> ScanResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
