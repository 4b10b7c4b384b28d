//! Analysis configuration: similarity limits, risk thresholds and main-file
//! priority weights.
//!
//! Every knob lives on [`AnalysisConfig`], which callers construct explicitly
//! and hand to the engine and orchestrator.  [`AnalysisConfig::from_env`] is
//! only a convenience for the Python entry points.

use serde::{Deserialize, Serialize};

// Similarity engine limits
pub const LARGE_TEXT_THRESHOLD: usize = 50_000;
pub const SAMPLE_CHARS: usize = 10_000;
pub const SAMPLE_DISCOUNT: f64 = 0.95;

// Risk tiers
pub const CRITICAL_THRESHOLD: f64 = 0.95;
pub const HIGH_THRESHOLD: f64 = 0.80;
pub const MODERATE_THRESHOLD: f64 = 0.50;
pub const DEFAULT_CLONE_THRESHOLD: f64 = 0.95;
pub const DEFAULT_TOP_K: usize = 20;
pub const MAX_TOP_K: usize = 1_000;

// Main-file priority
pub const NON_LIBRARY_WEIGHT: u32 = 2;
pub const FIRST_PARTY_WEIGHT: u32 = 1;
pub const LIBRARY_PATH_MARKERS: &[&str] = &["@openzeppelin", "node_modules", "@chainlink"];
pub const FIRST_PARTY_PATH_MARKERS: &[&str] = &["contracts/", "contracts\\", "src/"];

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Limits and heuristics for the character-level comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Texts longer than this many chars take the digest/sampling path.
    pub large_text_threshold: usize,
    /// Prefix length compared when sampling.
    pub sample_chars: usize,
    /// Multiplier applied to sampled ratios.
    pub sample_discount: f64,
    /// Ignore "popular" characters when seeding matches (difflib autojunk).
    pub autojunk: bool,
    /// Strip comments and string literals before extracting function names.
    pub strip_comments: bool,
    /// Declaration keyword introducing a function.
    pub function_keyword: String,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            large_text_threshold: LARGE_TEXT_THRESHOLD,
            sample_chars: SAMPLE_CHARS,
            sample_discount: SAMPLE_DISCOUNT,
            autojunk: true,
            strip_comments: false,
            function_keyword: "function".to_string(),
        }
    }
}

impl SimilarityConfig {
    /// Bring out-of-range values back into the domain the engine expects.
    pub fn validated(mut self) -> Self {
        self.sample_chars = self.sample_chars.max(1);
        self.sample_discount = unit_or(self.sample_discount, SAMPLE_DISCOUNT);
        if self.function_keyword.trim().is_empty() {
            self.function_keyword = "function".to_string();
        }
        self
    }
}

/// Lower bounds of the named risk tiers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub critical: f64,
    pub high: f64,
    pub moderate: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical: CRITICAL_THRESHOLD,
            high: HIGH_THRESHOLD,
            moderate: MODERATE_THRESHOLD,
        }
    }
}

impl RiskThresholds {
    /// Clamp to `[0, 1]` and keep `critical >= high >= moderate`.
    pub fn validated(self) -> Self {
        let critical = unit_or(self.critical, CRITICAL_THRESHOLD);
        let high = unit_or(self.high, HIGH_THRESHOLD).min(critical);
        let moderate = unit_or(self.moderate, MODERATE_THRESHOLD).min(high);
        Self {
            critical,
            high,
            moderate,
        }
    }
}

/// Weights of the main-file priority function.
///
/// `tier = non_library * [path has no library marker]
///       + first_party * [path has a first-party marker]`.
/// Candidates are ranked by tier, then byte length, then path.  With the
/// default weights being outside vendored code outranks sitting in a
/// first-party directory, and both outrank size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub non_library: u32,
    pub first_party: u32,
    pub library_markers: Vec<String>,
    pub first_party_markers: Vec<String>,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            non_library: NON_LIBRARY_WEIGHT,
            first_party: FIRST_PARTY_WEIGHT,
            library_markers: LIBRARY_PATH_MARKERS.iter().map(|m| m.to_string()).collect(),
            first_party_markers: FIRST_PARTY_PATH_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

/// Complete configuration for one analysis run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub similarity: SimilarityConfig,
    pub thresholds: RiskThresholds,
    pub priority: PriorityWeights,
    /// Full similarity at or above this marks a high-risk pair and a cluster edge.
    pub clone_threshold: f64,
    /// Also flag pairs whose partial similarity reaches `clone_threshold`.
    pub flag_partial_matches: bool,
    pub top_k: usize,
    /// Worker threads for pair scoring; 0 or 1 means sequential.
    pub workers: usize,
    pub progress_interval: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity: SimilarityConfig::default(),
            thresholds: RiskThresholds::default(),
            priority: PriorityWeights::default(),
            clone_threshold: DEFAULT_CLONE_THRESHOLD,
            flag_partial_matches: false,
            top_k: DEFAULT_TOP_K,
            workers: 1,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AnalysisConfig {
    /// Copy with every numeric knob clamped to its valid range.
    ///
    /// NaN falls back to the default of that knob.
    pub fn validated(mut self) -> Self {
        self.similarity = self.similarity.validated();
        self.thresholds = self.thresholds.validated();
        self.clone_threshold = unit_or(self.clone_threshold, DEFAULT_CLONE_THRESHOLD);
        self.top_k = clamp_top_k(self.top_k);
        self.progress_interval = self.progress_interval.max(1);
        self
    }

    /// Defaults overlaid with `CLONESCAN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = parse_f64(lookup("CLONESCAN_CLONE_THRESHOLD")) {
            config.clone_threshold = v;
        }
        if let Some(v) = parse_f64(lookup("CLONESCAN_SAMPLE_DISCOUNT")) {
            config.similarity.sample_discount = v;
        }
        if let Some(v) = parse_usize(lookup("CLONESCAN_LARGE_TEXT_THRESHOLD")) {
            config.similarity.large_text_threshold = v;
        }
        if let Some(v) = parse_usize(lookup("CLONESCAN_SAMPLE_CHARS")) {
            config.similarity.sample_chars = v;
        }
        if let Some(v) = parse_usize(lookup("CLONESCAN_WORKERS")) {
            config.workers = v;
        }
        if let Some(v) = parse_usize(lookup("CLONESCAN_TOP_K")) {
            config.top_k = v;
        }
        if let Some(v) = lookup("CLONESCAN_AUTOJUNK") {
            config.similarity.autojunk = is_truthy(&v, true);
        }
        if let Some(v) = lookup("CLONESCAN_STRIP_COMMENTS") {
            config.similarity.strip_comments = is_truthy(&v, false);
        }
        if let Some(v) = lookup("CLONESCAN_FLAG_PARTIAL") {
            config.flag_partial_matches = is_truthy(&v, false);
        }
        config.validated()
    }
}

/// Truthiness of a flag value; unrecognised values fall back to `default`.
pub fn is_truthy(value: &str, default: bool) -> bool {
    let v = value.trim().to_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

fn unit_or(value: f64, default: f64) -> f64 {
    if value.is_nan() {
        default
    } else {
        clamp_unit(value)
    }
}

pub fn clamp_top_k(value: usize) -> usize {
    value.clamp(1, MAX_TOP_K)
}

fn parse_f64(value: Option<String>) -> Option<f64> {
    value.and_then(|v| v.trim().parse::<f64>().ok())
}

fn parse_usize(value: Option<String>) -> Option<usize> {
    value.and_then(|v| v.trim().parse::<usize>().ok())
}
