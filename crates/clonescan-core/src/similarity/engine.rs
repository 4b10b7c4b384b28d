//! Pair scoring: full (character-level) and partial (interface-level)
//! similarity.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::config::SimilarityConfig;
use crate::models::ComparisonMethod;
use crate::similarity::functions::{FunctionExtractor, FunctionSignatureSet, RegexFunctionExtractor};
use crate::similarity::matcher::sequence_ratio;

/// SHA-256 hex digest of a text.
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Full similarity together with the path that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FullScore {
    pub value: f64,
    pub method: ComparisonMethod,
}

impl FullScore {
    pub fn sampled(&self) -> bool {
        self.method == ComparisonMethod::Sampled
    }
}

/// Both scores of a pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairScore {
    pub full: FullScore,
    pub partial: f64,
}

/// A source text with everything the engine needs precomputed.
///
/// Preparing once per contract keeps the pairwise loop from re-decoding and
/// re-hashing each text N - 1 times.
#[derive(Clone, Debug)]
pub struct PreparedSource {
    pub id: String,
    text: String,
    chars: Vec<char>,
    digest: String,
    functions: FunctionSignatureSet,
}

impl PreparedSource {
    pub fn char_len(&self) -> usize {
        self.chars.len()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn functions(&self) -> &FunctionSignatureSet {
        &self.functions
    }
}

/// Stateless scorer configured once per run.
#[derive(Clone)]
pub struct SimilarityEngine {
    config: SimilarityConfig,
    extractor: Arc<dyn FunctionExtractor>,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new(SimilarityConfig::default())
    }
}

impl SimilarityEngine {
    pub fn new(config: SimilarityConfig) -> Self {
        let config = config.validated();
        let extractor = RegexFunctionExtractor::with_keyword(&config.function_keyword)
            .strip_comments(config.strip_comments);
        Self {
            config,
            extractor: Arc::new(extractor),
        }
    }

    /// Swap in a different function extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn FunctionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &SimilarityConfig {
        &self.config
    }

    pub fn prepare(&self, id: &str, text: &str) -> PreparedSource {
        PreparedSource {
            id: id.to_string(),
            text: text.to_string(),
            chars: text.chars().collect(),
            digest: content_digest(text),
            functions: self.extractor.extract(text),
        }
    }

    pub fn function_names(&self, text: &str) -> FunctionSignatureSet {
        self.extractor.extract(text)
    }

    fn is_large(&self, len: usize) -> bool {
        len > self.config.large_text_threshold
    }

    /// Ratio of two char slices, independent of argument order.
    fn symmetric_ratio(&self, a: &[char], b: &[char]) -> f64 {
        let (first, second) = if (a.len(), a) <= (b.len(), b) {
            (a, b)
        } else {
            (b, a)
        };
        sequence_ratio(first, second, self.config.autojunk).clamp(0.0, 1.0)
    }

    fn sampled_ratio(&self, a: &[char], b: &[char]) -> f64 {
        let n = self.config.sample_chars;
        let ratio = self.symmetric_ratio(&a[..a.len().min(n)], &b[..b.len().min(n)]);
        (ratio * self.config.sample_discount).clamp(0.0, 1.0)
    }

    fn full_from_parts(
        &self,
        text_a: &str,
        chars_a: &[char],
        digest_a: impl FnOnce() -> String,
        text_b: &str,
        chars_b: &[char],
        digest_b: impl FnOnce() -> String,
    ) -> FullScore {
        if text_a == text_b {
            return FullScore {
                value: 1.0,
                method: ComparisonMethod::Identical,
            };
        }
        if self.is_large(chars_a.len()) || self.is_large(chars_b.len()) {
            if digest_a() == digest_b() {
                return FullScore {
                    value: 1.0,
                    method: ComparisonMethod::DigestMatch,
                };
            }
            return FullScore {
                value: self.sampled_ratio(chars_a, chars_b),
                method: ComparisonMethod::Sampled,
            };
        }
        FullScore {
            value: self.symmetric_ratio(chars_a, chars_b),
            method: ComparisonMethod::Complete,
        }
    }

    /// Character-level similarity of two texts.
    pub fn full_similarity(&self, a: &str, b: &str) -> FullScore {
        let chars_a: Vec<char> = a.chars().collect();
        let chars_b: Vec<char> = b.chars().collect();
        self.full_from_parts(
            a,
            &chars_a,
            || content_digest(a),
            b,
            &chars_b,
            || content_digest(b),
        )
    }

    /// Jaccard similarity of the declared function names of two texts.
    pub fn partial_similarity(&self, a: &str, b: &str) -> f64 {
        self.extractor.extract(a).jaccard(&self.extractor.extract(b))
    }

    /// Score two prepared sources.
    pub fn score(&self, a: &PreparedSource, b: &PreparedSource) -> PairScore {
        let full = self.full_from_parts(
            &a.text,
            &a.chars,
            || a.digest.clone(),
            &b.text,
            &b.chars,
            || b.digest.clone(),
        );
        PairScore {
            full,
            partial: a.functions.jaccard(&b.functions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_engine(threshold: usize, sample: usize) -> SimilarityEngine {
        SimilarityEngine::new(SimilarityConfig {
            large_text_threshold: threshold,
            sample_chars: sample,
            ..SimilarityConfig::default()
        })
    }

    fn contract_with_functions(names: &[&str], body_filler: &str) -> String {
        let mut out = String::from("pragma solidity ^0.8.0;\ncontract C {\n");
        for name in names {
            out.push_str(&format!("    function {name}() external {{ {body_filler} }}\n"));
        }
        out.push('}');
        out
    }

    #[test]
    fn test_identity() {
        let engine = SimilarityEngine::default();
        let text = contract_with_functions(&["mint", "burn"], "x = 1;");
        let full = engine.full_similarity(&text, &text);
        assert_eq!(full.value, 1.0);
        assert_eq!(full.method, ComparisonMethod::Identical);
        assert_eq!(engine.partial_similarity(&text, &text), 1.0);
        assert_eq!(engine.partial_similarity("no functions", "no functions"), 0.0);
    }

    #[test]
    fn test_symmetry_and_range() {
        let engine = SimilarityEngine::default();
        let a = contract_with_functions(&["mint", "burn", "pause"], "counter += 1;");
        let b = contract_with_functions(&["mint", "withdraw"], "owner = msg.sender;");
        let ab = engine.full_similarity(&a, &b).value;
        let ba = engine.full_similarity(&b, &a).value;
        assert_eq!(ab, ba);
        assert!((0.0..=1.0).contains(&ab));
        assert_eq!(
            engine.partial_similarity(&a, &b),
            engine.partial_similarity(&b, &a)
        );
        assert!((engine.partial_similarity(&a, &b) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_symmetry_on_equal_length_texts() {
        let engine = SimilarityEngine::default();
        let a = "aaab qqqq zz yyy";
        let b = "qqqq aaab yyy zz";
        assert_eq!(
            engine.full_similarity(a, b).value,
            engine.full_similarity(b, a).value
        );
    }

    #[test]
    fn test_disjoint_texts_score_zero() {
        let engine = SimilarityEngine::default();
        assert_eq!(engine.full_similarity("abc", "xyz").value, 0.0);
        assert_eq!(engine.partial_similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_large_identical_prefix_gets_discount() {
        let engine = SimilarityEngine::default();
        let prefix = "a".repeat(10_000);
        let a = format!("{prefix}{}", "b".repeat(45_000));
        let b = format!("{prefix}{}", "c".repeat(45_000));
        assert!(a.chars().count() > 50_000);
        let full = engine.full_similarity(&a, &b);
        assert_eq!(full.method, ComparisonMethod::Sampled);
        assert!(full.sampled());
        assert_eq!(full.value, 0.95);
    }

    #[test]
    fn test_small_threshold_sampling_and_digest_paths() {
        let engine = small_engine(10, 4);
        let a = "abcdXXXXXXXXXXXX";
        let b = "abcdYYYYYYYYYYYY";
        let full = engine.full_similarity(a, b);
        assert_eq!(full.method, ComparisonMethod::Sampled);
        assert_eq!(full.value, 0.95);

        // Equal texts short-circuit before the digest is consulted.
        let same = engine.full_similarity(a, a);
        assert_eq!(same.method, ComparisonMethod::Identical);
    }

    #[test]
    fn test_only_one_large_text_triggers_sampling() {
        let engine = small_engine(10, 4);
        let full = engine.full_similarity("abcd", "abcdefghijklmnop");
        assert_eq!(full.method, ComparisonMethod::Sampled);
        assert_eq!(full.value, 0.95);
    }

    #[test]
    fn test_zero_sample_length_from_json_is_clamped() {
        let config: crate::config::AnalysisConfig = serde_json::from_str(
            r#"{"similarity": {"large_text_threshold": 10, "sample_chars": 0, "sample_discount": 3.0}}"#,
        )
        .unwrap();
        let engine = SimilarityEngine::new(config.similarity);
        assert_eq!(engine.config().sample_chars, 1);
        assert_eq!(engine.config().sample_discount, 1.0);

        let full = engine.full_similarity(&"a".repeat(20), &"z".repeat(20));
        assert_eq!(full.method, ComparisonMethod::Sampled);
        assert_eq!(full.value, 0.0);
    }

    #[test]
    fn test_prepared_scoring_matches_direct_scoring() {
        let engine = SimilarityEngine::default();
        let a = contract_with_functions(&["mint", "burn"], "supply -= 1;");
        let b = contract_with_functions(&["mint", "reveal"], "revealed = true;");
        let pa = engine.prepare("0xa", &a);
        let pb = engine.prepare("0xb", &b);
        let score = engine.score(&pa, &pb);
        assert_eq!(score.full, engine.full_similarity(&a, &b));
        assert_eq!(score.partial, engine.partial_similarity(&a, &b));
        assert_eq!(pa.digest(), content_digest(&a));
        assert_eq!(pa.char_len(), a.chars().count());
    }

    #[test]
    fn test_content_digest_is_sha256() {
        assert_eq!(
            content_digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
