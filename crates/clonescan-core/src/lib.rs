//! clonescan core library: batch clone triage for verified smart-contract
//! sources.
//!
//! Raw artifacts are normalized to one canonical text per contract, every
//! unordered pair is scored by character-level and function-interface
//! similarity, and the pair table is aggregated into risk tiers, clone
//! clusters and summary statistics.  With the `python` feature the crate
//! also builds as the `_clonescan_core` extension module.

pub mod config;
pub mod errors;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod similarity;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use config::AnalysisConfig;
pub use errors::{ScanError, ScanResult};
pub use pipeline::{analyze_corpus, analyze_path, analyze_with_findings};
pub use report::SimilarityReport;

// ---------------------------------------------------------------------------
// Top-level Python module: _clonescan_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _clonescan_core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    bindings::register(m)
}
