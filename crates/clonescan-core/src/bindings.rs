//! Python surface of the core, compiled with the `python` feature.
//!
//! Structured values cross the boundary as JSON strings so Python callers can
//! hand over corpora and findings exactly as they store them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use pyo3::prelude::*;

use crate::config::AnalysisConfig;
use crate::errors::ScanResult;
use crate::normalizer::{self, RawCorpus};
use crate::orchestrator::parse_corpus_json;
use crate::pipeline;
use crate::report::{FindingsIndex, SimilarityReport};
use crate::similarity::{self, SimilarityEngine};
use crate::store::ReportStore;

/// Explicit JSON config, or the `CLONESCAN_*` environment overlay.
fn resolve_config(config_json: Option<&str>) -> ScanResult<AnalysisConfig> {
    match config_json {
        Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(text)?),
        _ => Ok(AnalysisConfig::from_env()),
    }
}

fn engine_for(config_json: Option<&str>) -> ScanResult<SimilarityEngine> {
    Ok(SimilarityEngine::new(resolve_config(config_json)?.similarity))
}

#[pyfunction]
#[pyo3(signature = (a, b, config_json=None))]
pub fn full_similarity(a: &str, b: &str, config_json: Option<&str>) -> PyResult<f64> {
    Ok(engine_for(config_json)?.full_similarity(a, b).value)
}

#[pyfunction]
#[pyo3(signature = (a, b, config_json=None))]
pub fn partial_similarity(a: &str, b: &str, config_json: Option<&str>) -> PyResult<f64> {
    Ok(engine_for(config_json)?.partial_similarity(a, b))
}

/// Sorted distinct function names.
#[pyfunction]
pub fn extract_function_names(source: &str) -> Vec<String> {
    similarity::extract_function_names(source)
        .names()
        .map(str::to_string)
        .collect()
}

/// `(path, text)` of the bundle file chosen as canonical source.
#[pyfunction]
pub fn select_main_source(files: BTreeMap<String, String>) -> Option<(String, String)> {
    let weights = AnalysisConfig::from_env().priority;
    let main = normalizer::select_main_file(&files, &weights)?;
    files
        .get(main)
        .map(|text| (main.to_string(), text.clone()))
}

#[pyfunction]
pub fn flatten_bundle(files: BTreeMap<String, String>) -> Option<String> {
    normalizer::flatten_bundle(&files)
}

#[pyfunction]
pub fn content_digest(text: &str) -> String {
    similarity::content_digest(text)
}

/// Analyze a JSON corpus (`{id: text | {path: text} | null}`) and return the
/// report as JSON.
#[pyfunction]
#[pyo3(signature = (corpus_json, config_json=None, pretty=false))]
pub fn analyze_corpus_json(
    py: Python<'_>,
    corpus_json: &str,
    config_json: Option<&str>,
    pretty: bool,
) -> PyResult<String> {
    let corpus: RawCorpus = parse_corpus_json(corpus_json)?;
    let config = resolve_config(config_json)?;
    let report = py.allow_threads(|| pipeline::analyze_corpus(&corpus, &config));
    let json = if pretty {
        report.to_json_pretty()?
    } else {
        report.to_json()?
    };
    Ok(json)
}

/// Attach the vulnerability cross-reference to a report produced by
/// [`analyze_corpus_json`].
#[pyfunction]
pub fn cross_reference_json(report_json: &str, findings_json: &str) -> PyResult<String> {
    let mut report = SimilarityReport::from_json(report_json)?;
    let findings: FindingsIndex =
        serde_json::from_str(findings_json).map_err(crate::errors::ScanError::from)?;
    report.attach_findings(&findings);
    Ok(report.to_json()?)
}

#[pymethods]
impl ReportStore {
    #[new]
    fn py_new(db_path: PathBuf) -> PyResult<Self> {
        Ok(ReportStore::open(&db_path)?)
    }

    #[getter]
    #[pyo3(name = "db_path")]
    fn py_db_path(&self) -> String {
        self.db_path().to_string_lossy().into_owned()
    }

    /// Store a report JSON and return its run id.
    #[pyo3(name = "save_report")]
    fn py_save_report(&self, report_json: &str) -> PyResult<String> {
        let report = SimilarityReport::from_json(report_json)?;
        Ok(self.save_report(&report)?)
    }

    #[pyo3(name = "load_pairs")]
    fn py_load_pairs(&self, run_id: &str) -> PyResult<String> {
        let pairs = self.load_pairs(run_id)?;
        Ok(serde_json::to_string(&pairs).map_err(crate::errors::ScanError::from)?)
    }

    #[pyo3(name = "load_clusters")]
    fn py_load_clusters(&self, run_id: &str) -> PyResult<String> {
        let clusters = self.load_clusters(run_id)?;
        Ok(serde_json::to_string(&clusters).map_err(crate::errors::ScanError::from)?)
    }

    #[pyo3(name = "list_runs")]
    fn py_list_runs(&self) -> PyResult<String> {
        let runs = self.list_runs()?;
        Ok(serde_json::to_string(&runs).map_err(crate::errors::ScanError::from)?)
    }
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("LARGE_TEXT_THRESHOLD", crate::config::LARGE_TEXT_THRESHOLD)?;
    m.add("SAMPLE_CHARS", crate::config::SAMPLE_CHARS)?;
    m.add("SAMPLE_DISCOUNT", crate::config::SAMPLE_DISCOUNT)?;
    m.add("DEFAULT_CLONE_THRESHOLD", crate::config::DEFAULT_CLONE_THRESHOLD)?;

    m.add_function(wrap_pyfunction!(full_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(partial_similarity, m)?)?;
    m.add_function(wrap_pyfunction!(extract_function_names, m)?)?;
    m.add_function(wrap_pyfunction!(select_main_source, m)?)?;
    m.add_function(wrap_pyfunction!(flatten_bundle, m)?)?;
    m.add_function(wrap_pyfunction!(content_digest, m)?)?;
    m.add_function(wrap_pyfunction!(analyze_corpus_json, m)?)?;
    m.add_function(wrap_pyfunction!(cross_reference_json, m)?)?;
    m.add_class::<ReportStore>()?;
    Ok(())
}
