//! Error types for the clonescan core library.

#[cfg(feature = "python")]
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;

/// Top-level error enum for the clonescan core library.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Malformed bundle: {0}")]
    MalformedBundle(String),

    #[error("Empty source for contract {0}")]
    EmptySource(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(feature = "python")]
impl From<ScanError> for PyErr {
    fn from(err: ScanError) -> PyErr {
        match &err {
            ScanError::MalformedBundle(_) | ScanError::EmptySource(_) => {
                PyValueError::new_err(err.to_string())
            }
            ScanError::Corpus(_) | ScanError::Json(_) => PyValueError::new_err(err.to_string()),
            ScanError::Report(_) | ScanError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            ScanError::Io(_) => PyIOError::new_err(err.to_string()),
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
