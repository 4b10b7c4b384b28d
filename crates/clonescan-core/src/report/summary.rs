//! Summary statistics over a scored pair table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RiskThresholds;
use crate::models::SimilarityPair;
use crate::report::tiers::{distribution, tier_counts, BucketCount, RiskTier};

/// Which score a statistic is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Full,
    Partial,
}

impl Metric {
    pub fn of(&self, pair: &SimilarityPair) -> f64 {
        match self {
            Metric::Full => pair.full_similarity,
            Metric::Partial => pair.partial_similarity,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub distribution: BTreeMap<u32, BucketCount>,
    pub tiers: BTreeMap<RiskTier, usize>,
}

impl MetricSummary {
    fn compute(pairs: &[SimilarityPair], metric: Metric, thresholds: &RiskThresholds) -> Self {
        let scores: Vec<f64> = pairs.iter().map(|p| metric.of(p)).collect();
        let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
        for &s in &scores {
            min = min.min(s);
            max = max.max(s);
            sum += s;
        }
        if scores.is_empty() {
            min = 0.0;
            max = 0.0;
        }
        Self {
            average: mean(sum, scores.len()),
            min,
            max,
            distribution: distribution(scores.iter().copied()),
            tiers: tier_counts(scores.iter().copied(), thresholds),
        }
    }
}

/// A pair as listed in a top-K table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedPair {
    pub pair_key: String,
    pub contract_a: String,
    pub contract_b: String,
    pub full_similarity: f64,
    pub partial_similarity: f64,
}

impl RankedPair {
    pub fn max_similarity(&self) -> f64 {
        self.full_similarity.max(self.partial_similarity)
    }
}

impl From<&SimilarityPair> for RankedPair {
    fn from(pair: &SimilarityPair) -> Self {
        Self {
            pair_key: pair.key(),
            contract_a: pair.contract_a.clone(),
            contract_b: pair.contract_b.clone(),
            full_similarity: pair.full_similarity,
            partial_similarity: pair.partial_similarity,
        }
    }
}

/// Highest `k` pairs by `metric`; ties broken by pair key.
pub fn top_k(pairs: &[SimilarityPair], metric: Metric, k: usize) -> Vec<RankedPair> {
    let mut ranked: Vec<(f64, String, &SimilarityPair)> =
        pairs.iter().map(|p| (metric.of(p), p.key(), p)).collect();
    ranked.sort_by(|x, y| y.0.total_cmp(&x.0).then_with(|| x.1.cmp(&y.1)));
    ranked.into_iter().take(k).map(|(_, _, p)| p.into()).collect()
}

/// How one contract relates to the rest of the compared corpus.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractAggregate {
    pub comparisons: usize,
    pub avg_full_similarity: f64,
    pub max_full_similarity: f64,
    pub avg_partial_similarity: f64,
    pub max_partial_similarity: f64,
    /// Peers whose full similarity reaches the clone threshold.
    pub peers_at_threshold: usize,
}

/// Aggregate for every compared contract, including ones with no pairs.
pub fn per_contract(
    compared: &[String],
    pairs: &[SimilarityPair],
    clone_threshold: f64,
) -> BTreeMap<String, ContractAggregate> {
    let mut sums: BTreeMap<String, (ContractAggregate, f64, f64)> = compared
        .iter()
        .map(|id| (id.clone(), (ContractAggregate::default(), 0.0, 0.0)))
        .collect();

    for pair in pairs {
        for id in [&pair.contract_a, &pair.contract_b] {
            let Some((agg, full_sum, partial_sum)) = sums.get_mut(id) else {
                continue;
            };
            agg.comparisons += 1;
            *full_sum += pair.full_similarity;
            *partial_sum += pair.partial_similarity;
            agg.max_full_similarity = agg.max_full_similarity.max(pair.full_similarity);
            agg.max_partial_similarity = agg.max_partial_similarity.max(pair.partial_similarity);
            if pair.full_similarity >= clone_threshold {
                agg.peers_at_threshold += 1;
            }
        }
    }

    sums.into_iter()
        .map(|(id, (mut agg, full_sum, partial_sum))| {
            agg.avg_full_similarity = mean(full_sum, agg.comparisons);
            agg.avg_partial_similarity = mean(partial_sum, agg.comparisons);
            (id, agg)
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilaritySummary {
    pub total_pairs: usize,
    pub sampled_pairs: usize,
    pub full: MetricSummary,
    pub partial: MetricSummary,
    pub top_full: Vec<RankedPair>,
    pub top_partial: Vec<RankedPair>,
    pub per_contract: BTreeMap<String, ContractAggregate>,
}

pub fn summarize(
    pairs: &[SimilarityPair],
    compared: &[String],
    thresholds: &RiskThresholds,
    clone_threshold: f64,
    k: usize,
) -> SimilaritySummary {
    SimilaritySummary {
        total_pairs: pairs.len(),
        sampled_pairs: pairs.iter().filter(|p| p.sampled).count(),
        full: MetricSummary::compute(pairs, Metric::Full, thresholds),
        partial: MetricSummary::compute(pairs, Metric::Partial, thresholds),
        top_full: top_k(pairs, Metric::Full, k),
        top_partial: top_k(pairs, Metric::Partial, k),
        per_contract: per_contract(compared, pairs, clone_threshold),
    }
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComparisonMethod;

    fn pair(a: &str, b: &str, full: f64, partial: f64) -> SimilarityPair {
        SimilarityPair {
            contract_a: a.to_string(),
            contract_b: b.to_string(),
            full_similarity: full,
            partial_similarity: partial,
            method: ComparisonMethod::Complete,
            sampled: false,
        }
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_top_k_orders_by_score_then_key() {
        let pairs = vec![
            pair("a", "c", 0.5, 0.9),
            pair("a", "b", 0.9, 0.1),
            pair("b", "c", 0.9, 0.2),
        ];
        let top = top_k(&pairs, Metric::Full, 2);
        let keys: Vec<&str> = top.iter().map(|p| p.pair_key.as_str()).collect();
        assert_eq!(keys, vec!["a_b", "b_c"]);
        let top = top_k(&pairs, Metric::Partial, 1);
        assert_eq!(top[0].pair_key, "a_c");
    }

    #[test]
    fn test_per_contract_aggregates() {
        let pairs = vec![
            pair("a", "b", 1.0, 0.5),
            pair("a", "c", 0.5, 0.0),
            pair("b", "c", 0.2, 1.0),
        ];
        let agg = per_contract(&ids(&["a", "b", "c", "d"]), &pairs, 0.95);
        assert_eq!(agg["a"].comparisons, 2);
        assert!((agg["a"].avg_full_similarity - 0.75).abs() < 1e-12);
        assert_eq!(agg["a"].max_full_similarity, 1.0);
        assert_eq!(agg["a"].peers_at_threshold, 1);
        assert_eq!(agg["c"].max_partial_similarity, 1.0);
        assert_eq!(agg["d"], ContractAggregate::default());
    }

    #[test]
    fn test_summary_over_empty_table() {
        let summary = summarize(&[], &[], &RiskThresholds::default(), 0.95, 20);
        assert_eq!(summary.total_pairs, 0);
        assert_eq!(summary.full.average, 0.0);
        assert_eq!(summary.full.max, 0.0);
        assert!(summary.top_full.is_empty());
        assert_eq!(summary.full.distribution.len(), 11);
    }

    #[test]
    fn test_summary_metrics() {
        let pairs = vec![pair("a", "b", 1.0, 1.0), pair("a", "c", 0.4, 0.0)];
        let summary = summarize(&pairs, &ids(&["a", "b", "c"]), &RiskThresholds::default(), 0.95, 1);
        assert!((summary.full.average - 0.7).abs() < 1e-12);
        assert_eq!(summary.full.min, 0.4);
        assert_eq!(summary.full.tiers[&RiskTier::Critical], 1);
        assert_eq!(summary.full.tiers[&RiskTier::Low], 1);
        assert_eq!(summary.top_full.len(), 1);
        assert_eq!(summary.partial.distribution[&100].count, 1);
    }
}
