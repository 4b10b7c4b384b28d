//! Risk tiers and 10% distribution buckets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::RiskThresholds;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Critical,
    High,
    Moderate,
    Low,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Critical,
        RiskTier::High,
        RiskTier::Moderate,
        RiskTier::Low,
    ];

    pub fn classify(score: f64, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.critical {
            RiskTier::Critical
        } else if score >= thresholds.high {
            RiskTier::High
        } else if score >= thresholds.moderate {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Critical => "critical",
            RiskTier::High => "high",
            RiskTier::Moderate => "moderate",
            RiskTier::Low => "low",
        }
    }
}

/// Lower bound, in percent, of the 10% bucket holding `score`.
///
/// `0.0..0.1 -> 0`, ..., `0.9..1.0 -> 90`, `1.0 -> 100`.
pub fn bucket_of(score: f64) -> u32 {
    let percent = (score.clamp(0.0, 1.0) * 100.0).floor() as u32;
    (percent / 10 * 10).min(100)
}

/// Every bucket label, including empty ones, so reports always have the same shape.
pub const BUCKETS: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub count: usize,
    pub percentage: f64,
}

/// Count and share of scores per 10% bucket.
pub fn distribution<I>(scores: I) -> BTreeMap<u32, BucketCount>
where
    I: IntoIterator<Item = f64>,
{
    let mut out: BTreeMap<u32, BucketCount> =
        BUCKETS.iter().map(|b| (*b, BucketCount::default())).collect();
    let mut total = 0usize;
    for score in scores {
        total += 1;
        out.entry(bucket_of(score)).or_default().count += 1;
    }
    if total > 0 {
        for bucket in out.values_mut() {
            bucket.percentage = percentage(bucket.count, total);
        }
    }
    out
}

/// Number of scores per tier, in tier order.
pub fn tier_counts<I>(scores: I, thresholds: &RiskThresholds) -> BTreeMap<RiskTier, usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut out: BTreeMap<RiskTier, usize> = RiskTier::ALL.iter().map(|t| (*t, 0)).collect();
    for score in scores {
        *out.entry(RiskTier::classify(score, thresholds)).or_default() += 1;
    }
    out
}

/// `part / total * 100`, rounded to two decimals.
pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}
