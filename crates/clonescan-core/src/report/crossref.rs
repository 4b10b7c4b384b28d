//! Cross-reference of high-risk clone pairs with static-analysis findings.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{Finding, Severity};
use crate::report::summary::RankedPair;

/// Scanner output per contract.  A contract missing from the map was not
/// analyzed successfully.
pub type FindingsIndex = BTreeMap<String, Vec<Finding>>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
    pub optimization: usize,
    pub unknown: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            counts.total += 1;
            match finding.severity {
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Informational => counts.informational += 1,
                Severity::Optimization => counts.optimization += 1,
                Severity::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedFinding {
    pub category: String,
    /// Severity of the first matching finding of the first contract.
    pub severity: Severity,
}

/// Finding categories present in both lists, most severe first.
pub fn shared_findings(first: &[Finding], second: &[Finding]) -> Vec<SharedFinding> {
    if first.is_empty() || second.is_empty() {
        return vec![];
    }
    let other: BTreeSet<&str> = second.iter().map(|f| f.category.as_str()).collect();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut shared: Vec<SharedFinding> = first
        .iter()
        .filter(|f| other.contains(f.category.as_str()) && seen.insert(f.category.as_str()))
        .map(|f| SharedFinding {
            category: f.category.clone(),
            severity: f.severity,
        })
        .collect();
    shared.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.category.cmp(&b.category)));
    shared
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloneVulnerabilityMatch {
    pub pair_key: String,
    pub contract_a: String,
    pub contract_b: String,
    pub similarity: f64,
    pub findings_a: SeverityCounts,
    pub findings_b: SeverityCounts,
    pub shared: Vec<SharedFinding>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub pairs_considered: usize,
    pub pairs_both_analyzed: usize,
    pub pairs_with_shared_findings: usize,
    pub matches: Vec<CloneVulnerabilityMatch>,
}

/// Shared findings for every high-risk pair whose members were both analyzed.
pub fn cross_reference(high_risk: &[RankedPair], findings: &FindingsIndex) -> CrossReference {
    let mut out = CrossReference {
        pairs_considered: high_risk.len(),
        ..Default::default()
    };
    for pair in high_risk {
        let (Some(a), Some(b)) = (findings.get(&pair.contract_a), findings.get(&pair.contract_b))
        else {
            continue;
        };
        out.pairs_both_analyzed += 1;
        let shared = shared_findings(a, b);
        if shared.is_empty() {
            continue;
        }
        out.pairs_with_shared_findings += 1;
        out.matches.push(CloneVulnerabilityMatch {
            pair_key: pair.pair_key.clone(),
            contract_a: pair.contract_a.clone(),
            contract_b: pair.contract_b.clone(),
            similarity: pair.max_similarity(),
            findings_a: SeverityCounts::from_findings(a),
            findings_b: SeverityCounts::from_findings(b),
            shared,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(a: &str, b: &str, full: f64) -> RankedPair {
        RankedPair {
            pair_key: format!("{a}_{b}"),
            contract_a: a.to_string(),
            contract_b: b.to_string(),
            full_similarity: full,
            partial_similarity: 0.0,
        }
    }

    #[test]
    fn test_shared_findings_sorted_by_severity_then_category() {
        let a = vec![
            Finding::new(Severity::Low, "timestamp"),
            Finding::new(Severity::High, "reentrancy-eth"),
            Finding::new(Severity::High, "arbitrary-send-eth"),
            Finding::new(Severity::Informational, "naming-convention"),
            Finding::new(Severity::Medium, "unused-return"),
        ];
        let b = vec![
            Finding::new(Severity::Low, "naming-convention"),
            Finding::new(Severity::High, "reentrancy-eth"),
            Finding::new(Severity::Low, "timestamp"),
            Finding::new(Severity::High, "arbitrary-send-eth"),
        ];
        let shared = shared_findings(&a, &b);
        let got: Vec<(&str, Severity)> =
            shared.iter().map(|s| (s.category.as_str(), s.severity)).collect();
        assert_eq!(
            got,
            vec![
                ("arbitrary-send-eth", Severity::High),
                ("reentrancy-eth", Severity::High),
                ("timestamp", Severity::Low),
                ("naming-convention", Severity::Informational),
            ]
        );
    }

    #[test]
    fn test_cross_reference_counts() {
        let mut findings = FindingsIndex::new();
        findings.insert(
            "0xa".into(),
            vec![Finding::new(Severity::High, "reentrancy-eth")],
        );
        findings.insert(
            "0xb".into(),
            vec![
                Finding::new(Severity::High, "reentrancy-eth"),
                Finding::new(Severity::Low, "timestamp"),
            ],
        );
        findings.insert("0xc".into(), vec![]);

        let pairs = vec![
            ranked("0xa", "0xb", 0.99),
            ranked("0xa", "0xc", 0.97),
            ranked("0xa", "0xd", 0.96),
        ];
        let xref = cross_reference(&pairs, &findings);
        assert_eq!(xref.pairs_considered, 3);
        assert_eq!(xref.pairs_both_analyzed, 2);
        assert_eq!(xref.pairs_with_shared_findings, 1);
        let only = &xref.matches[0];
        assert_eq!(only.pair_key, "0xa_0xb");
        assert_eq!(only.findings_b.total, 2);
        assert_eq!(only.findings_b.low, 1);
        assert_eq!(only.shared.len(), 1);
    }
}
