//! Shared typed models used across the normalizer, engine, orchestrator and
//! report layers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Contract identifiers
// ---------------------------------------------------------------------------

/// Length of a `0x`-prefixed 20-byte hex address.
pub const ADDRESS_LEN: usize = 42;

/// Whether `id` looks like a contract address (`0x` followed by 40 hex chars).
pub fn is_contract_address(id: &str) -> bool {
    id.len() == ADDRESS_LEN
        && (id.starts_with("0x") || id.starts_with("0X"))
        && id[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Key under which a pair is stored: both ids joined by `_`, smaller first.
///
/// `\` and `_` inside an id are backslash-escaped so that distinct pairs
/// never share a key. Address ids contain neither and keep the plain form.
pub fn pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut key = String::with_capacity(lo.len() + hi.len() + 1);
    push_key_part(&mut key, lo);
    key.push('_');
    push_key_part(&mut key, hi);
    key
}

fn push_key_part(key: &mut String, id: &str) {
    for c in id.chars() {
        if c == '\\' || c == '_' {
            key.push('\\');
        }
        key.push(c);
    }
}

// ---------------------------------------------------------------------------
// Raw artifacts and canonical sources
// ---------------------------------------------------------------------------

/// What the retrieval stage hands over for one contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArtifact {
    /// Flat source text or an Etherscan `SourceCode` string (possibly JSON).
    Text(String),
    /// Already-split multi-file bundle: relative path -> source text.
    Bundle(BTreeMap<String, String>),
    /// Entry that could not be read as source at load time; the detail says why.
    #[serde(skip)]
    Malformed(String),
}

/// The single text that represents a contract for comparison.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSource {
    pub id: String,
    pub canonical: String,
    /// Bundle path of the canonical text; `None` for flat sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
    /// Remaining bundle files, kept for record-keeping only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auxiliary: BTreeMap<String, String>,
}

impl ContractSource {
    pub fn flat(id: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            canonical: canonical.into(),
            main_file: None,
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn is_bundle(&self) -> bool {
        self.main_file.is_some()
    }
}

/// Why a contract could not take part in the comparison.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum UnavailableReason {
    NotRetrieved,
    EmptySource,
    MalformedBundle(String),
    MissingText,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::NotRetrieved => write!(f, "not_retrieved"),
            UnavailableReason::EmptySource => write!(f, "empty_source"),
            UnavailableReason::MalformedBundle(detail) => {
                write!(f, "malformed_bundle: {detail}")
            }
            UnavailableReason::MissingText => write!(f, "missing_text"),
        }
    }
}

impl UnavailableReason {
    /// Short label without detail, used for grouping counts.
    pub fn label(&self) -> &'static str {
        match self {
            UnavailableReason::NotRetrieved => "not_retrieved",
            UnavailableReason::EmptySource => "empty_source",
            UnavailableReason::MalformedBundle(_) => "malformed_bundle",
            UnavailableReason::MissingText => "missing_text",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnavailableContract {
    pub id: String,
    pub reason: UnavailableReason,
}

// ---------------------------------------------------------------------------
// Pair scores
// ---------------------------------------------------------------------------

/// How the full similarity of a pair was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMethod {
    Identical,
    DigestMatch,
    Sampled,
    Complete,
}

impl ComparisonMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMethod::Identical => "identical",
            ComparisonMethod::DigestMatch => "digest_match",
            ComparisonMethod::Sampled => "sampled",
            ComparisonMethod::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "identical" => Some(ComparisonMethod::Identical),
            "digest_match" => Some(ComparisonMethod::DigestMatch),
            "sampled" => Some(ComparisonMethod::Sampled),
            "complete" => Some(ComparisonMethod::Complete),
            _ => None,
        }
    }
}

/// Scores of one unordered contract pair.  `contract_a < contract_b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimilarityPair {
    pub contract_a: String,
    pub contract_b: String,
    pub full_similarity: f64,
    pub partial_similarity: f64,
    pub method: ComparisonMethod,
    pub sampled: bool,
}

impl SimilarityPair {
    pub fn key(&self) -> String {
        pair_key(&self.contract_a, &self.contract_b)
    }

    pub fn max_similarity(&self) -> f64 {
        self.full_similarity.max(self.partial_similarity)
    }

    pub fn involves(&self, id: &str) -> bool {
        self.contract_a == id || self.contract_b == id
    }

    /// The other member of the pair, if `id` is one of them.
    pub fn peer_of(&self, id: &str) -> Option<&str> {
        if self.contract_a == id {
            Some(&self.contract_b)
        } else if self.contract_b == id {
            Some(&self.contract_a)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Clusters
// ---------------------------------------------------------------------------

/// Contracts linked, directly or transitively, by above-threshold full similarity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloneCluster {
    pub cluster_id: usize,
    pub members: Vec<String>,
    /// Above-threshold pairs inside the cluster.
    pub edge_count: usize,
    pub max_similarity: f64,
    pub min_edge_similarity: f64,
}

impl CloneCluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.binary_search_by(|m| m.as_str().cmp(id)).is_ok()
    }
}

// ---------------------------------------------------------------------------
// Scanner findings
// ---------------------------------------------------------------------------

/// Severity label reported by the external static analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
    Optimization,
    Unknown,
}

impl Severity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "critical" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            "informational" | "info" => Severity::Informational,
            "optimization" => Severity::Optimization,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Informational => "Informational",
            Severity::Optimization => "Optimization",
            Severity::Unknown => "Unknown",
        }
    }
}

/// One static-analysis finding for a contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Detector name, e.g. `arbitrary-send-eth`.
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, category: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
