//! End-to-end analysis: normalize, score every pair, aggregate.

use std::path::Path;

use tracing::info;

use crate::config::AnalysisConfig;
use crate::errors::ScanResult;
use crate::normalizer::{normalize_corpus, RawCorpus};
use crate::orchestrator::{
    apply_address_list, load_address_list, load_corpus_dir, load_corpus_json, PairwiseOrchestrator,
};
use crate::report::{build_report, FindingsIndex, SimilarityReport};

/// Run the whole batch over an in-memory corpus.
pub fn analyze_corpus(corpus: &RawCorpus, config: &AnalysisConfig) -> SimilarityReport {
    let config = &config.clone().validated();
    let normalized = normalize_corpus(corpus, &config.priority);
    info!(
        "Normalized {}/{} contracts ({} unavailable)",
        normalized.available_count(),
        normalized.requested,
        normalized.unavailable.len()
    );

    let orchestrator = PairwiseOrchestrator::from_config(config);
    let table = orchestrator.run(&normalized);
    info!(
        "Scored {} pairs across {} contracts in {}ms",
        table.pair_count(),
        table.compared.len(),
        table.elapsed_ms
    );

    let report = build_report(&table, &normalized, config);
    info!(
        "{} high-risk pairs, {} clone clusters at threshold {}",
        report.high_risk.len(),
        report.clusters.len(),
        config.clone_threshold
    );
    report
}

/// [`analyze_corpus`] followed by the vulnerability cross-reference.
pub fn analyze_with_findings(
    corpus: &RawCorpus,
    findings: &FindingsIndex,
    config: &AnalysisConfig,
) -> SimilarityReport {
    let mut report = analyze_corpus(corpus, config);
    report.attach_findings(findings);
    report
}

/// Load a corpus from a directory or a JSON file, then analyze it.
///
/// When `address_list` is given, listed contracts without a source file are
/// reported as not retrieved.
pub fn analyze_path(
    source: &Path,
    address_list: Option<&Path>,
    config: &AnalysisConfig,
) -> ScanResult<SimilarityReport> {
    let mut corpus = if source.is_dir() {
        load_corpus_dir(source)?
    } else {
        load_corpus_json(source)?
    };
    if let Some(list) = address_list {
        let addresses = load_address_list(list)?;
        apply_address_list(&mut corpus, &addresses);
    }
    Ok(analyze_corpus(&corpus, config))
}
