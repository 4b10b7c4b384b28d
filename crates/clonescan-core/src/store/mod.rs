//! SQLite persistence layer.

pub mod database;
pub mod schema;

pub use database::{run_id_for, ReportStore, RunSummary, RUN_ID_LEN};
