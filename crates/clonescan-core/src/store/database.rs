//! SQLite persistence for similarity reports.
//!
//! Each public method opens its own connection so that the caller never has
//! to manage connection lifetime.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ScanError, ScanResult};
use crate::models::{
    CloneCluster, ComparisonMethod, SimilarityPair, UnavailableContract, UnavailableReason,
};
use crate::report::SimilarityReport;
use crate::similarity::content_digest;
use crate::store::schema;

/// Length of a run id in hex characters.
pub const RUN_ID_LEN: usize = 16;

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if path.len() > 2 {
                expanded.push(&path[2..]);
            }
            return expanded;
        }
    }
    PathBuf::from(path)
}

fn resolve_path(path: &Path) -> ScanResult<PathBuf> {
    let expanded = expand_tilde(&path.to_string_lossy());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

/// Deterministic run id: a prefix of the SHA-256 of the report JSON.
pub fn run_id_for(report: &SimilarityReport) -> ScanResult<String> {
    let digest = content_digest(&report.to_json()?);
    Ok(digest[..RUN_ID_LEN].to_string())
}

/// One row of `runs`, without the stored report body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub clone_threshold: f64,
    pub requested: usize,
    pub compared: usize,
    pub excluded: usize,
    pub pair_count: usize,
    pub high_risk_count: usize,
    pub cluster_count: usize,
    pub created_at: String,
}

fn reason_parts(reason: &UnavailableReason) -> (&'static str, Option<&str>) {
    match reason {
        UnavailableReason::MalformedBundle(detail) => (reason.label(), Some(detail.as_str())),
        other => (other.label(), None),
    }
}

fn reason_from_parts(label: &str, detail: Option<String>) -> ScanResult<UnavailableReason> {
    match label {
        "not_retrieved" => Ok(UnavailableReason::NotRetrieved),
        "empty_source" => Ok(UnavailableReason::EmptySource),
        "malformed_bundle" => Ok(UnavailableReason::MalformedBundle(detail.unwrap_or_default())),
        "missing_text" => Ok(UnavailableReason::MissingText),
        other => Err(ScanError::Report(format!("unknown exclusion reason {other}"))),
    }
}

/// SQLite store of analysis runs.
#[cfg_attr(feature = "python", pyo3::pyclass)]
pub struct ReportStore {
    db_path: PathBuf,
}

impl ReportStore {
    /// Resolve `db_path`, create parent directories and initialise the schema.
    pub fn open(db_path: &Path) -> ScanResult<Self> {
        let resolved = resolve_path(db_path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path: resolved };
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> ScanResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// WAL mode, every table and index, then pending migrations.
    pub fn init_schema(&self) -> ScanResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    pub fn schema_version(&self) -> ScanResult<i32> {
        Ok(schema::get_schema_version(&self.connect()?))
    }

    /// Persist a report in one transaction and return its run id.
    ///
    /// Saving the same report twice replaces the earlier copy.
    pub fn save_report(&self, report: &SimilarityReport) -> ScanResult<String> {
        let report_json = report.to_json()?;
        let run_id = content_digest(&report_json)[..RUN_ID_LEN].to_string();

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM runs WHERE run_id = ?1;", params![run_id])?;
        tx.execute(
            "INSERT INTO runs (run_id, clone_threshold, requested, compared, excluded, \
                               pair_count, high_risk_count, cluster_count, report_json) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                run_id,
                report.settings.clone_threshold,
                report.corpus.requested as i64,
                report.corpus.compared as i64,
                report.corpus.excluded_count as i64,
                report.pairs.len() as i64,
                report.high_risk.len() as i64,
                report.clusters.len() as i64,
                report_json,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO pairs (run_id, pair_key, contract_a, contract_b, full_similarity, \
                                    partial_similarity, method, sampled, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            )?;
            for (position, (key, pair)) in report.pairs.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    key,
                    pair.contract_a,
                    pair.contract_b,
                    pair.full_similarity,
                    pair.partial_similarity,
                    pair.method.as_str(),
                    pair.sampled,
                    position as i64,
                ])?;
            }
        }

        {
            let mut cluster_stmt = tx.prepare(
                "INSERT INTO clusters (run_id, cluster_id, size, edge_count, max_similarity, \
                                       min_edge_similarity) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            let mut member_stmt = tx.prepare(
                "INSERT INTO cluster_members (run_id, cluster_id, contract_id) VALUES (?1, ?2, ?3);",
            )?;
            for cluster in &report.clusters {
                cluster_stmt.execute(params![
                    run_id,
                    cluster.cluster_id as i64,
                    cluster.size() as i64,
                    cluster.edge_count as i64,
                    cluster.max_similarity,
                    cluster.min_edge_similarity,
                ])?;
                for member in &cluster.members {
                    member_stmt.execute(params![run_id, cluster.cluster_id as i64, member])?;
                }
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO excluded_contracts (run_id, contract_id, reason, detail) \
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for entry in &report.corpus.excluded {
                let (label, detail) = reason_parts(&entry.reason);
                stmt.execute(params![run_id, entry.id, label, detail])?;
            }
        }

        tx.commit()?;
        debug!(
            "Saved run {} ({} pairs, {} clusters)",
            run_id,
            report.pairs.len(),
            report.clusters.len()
        );
        Ok(run_id)
    }

    /// Pairs of a run in their original enumeration order.
    pub fn load_pairs(&self, run_id: &str) -> ScanResult<Vec<SimilarityPair>> {
        self.query_pairs(
            "SELECT contract_a, contract_b, full_similarity, partial_similarity, method, sampled \
             FROM pairs WHERE run_id = ?1 ORDER BY position;",
            params![run_id],
        )
    }

    /// Pairs of a run with full similarity at or above `threshold`, highest first.
    pub fn pairs_above(&self, run_id: &str, threshold: f64) -> ScanResult<Vec<SimilarityPair>> {
        self.query_pairs(
            "SELECT contract_a, contract_b, full_similarity, partial_similarity, method, sampled \
             FROM pairs WHERE run_id = ?1 AND full_similarity >= ?2 \
             ORDER BY full_similarity DESC, pair_key;",
            params![run_id, threshold],
        )
    }

    fn query_pairs(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> ScanResult<Vec<SimilarityPair>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;

        let mut pairs = Vec::new();
        for row in rows {
            let (contract_a, contract_b, full, partial, method, sampled) = row?;
            let method = ComparisonMethod::parse(&method)
                .ok_or_else(|| ScanError::Report(format!("unknown comparison method {method}")))?;
            pairs.push(SimilarityPair {
                contract_a,
                contract_b,
                full_similarity: full,
                partial_similarity: partial,
                method,
                sampled,
            });
        }
        Ok(pairs)
    }

    /// Clusters of a run, ordered by id, members sorted.
    pub fn load_clusters(&self, run_id: &str) -> ScanResult<Vec<CloneCluster>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT cluster_id, edge_count, max_similarity, min_edge_similarity \
             FROM clusters WHERE run_id = ?1 ORDER BY cluster_id;",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        let mut member_stmt = conn.prepare(
            "SELECT contract_id FROM cluster_members \
             WHERE run_id = ?1 AND cluster_id = ?2 ORDER BY contract_id;",
        )?;

        let mut clusters = Vec::new();
        for row in rows {
            let (cluster_id, edge_count, max_similarity, min_edge_similarity) = row?;
            let members = member_stmt
                .query_map(params![run_id, cluster_id], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            clusters.push(CloneCluster {
                cluster_id: cluster_id as usize,
                members,
                edge_count: edge_count as usize,
                max_similarity,
                min_edge_similarity,
            });
        }
        Ok(clusters)
    }

    pub fn load_excluded(&self, run_id: &str) -> ScanResult<Vec<UnavailableContract>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT contract_id, reason, detail FROM excluded_contracts \
             WHERE run_id = ?1 ORDER BY contract_id;",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, label, detail) = row?;
            out.push(UnavailableContract {
                id,
                reason: reason_from_parts(&label, detail)?,
            });
        }
        Ok(out)
    }

    /// The full stored report of a run.
    pub fn load_report(&self, run_id: &str) -> ScanResult<Option<SimilarityReport>> {
        let conn = self.connect()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT report_json FROM runs WHERE run_id = ?1;",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        body.map(|text| SimilarityReport::from_json(&text)).transpose()
    }

    /// Every stored run, newest first.
    pub fn list_runs(&self) -> ScanResult<Vec<RunSummary>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, clone_threshold, requested, compared, excluded, pair_count, \
                    high_risk_count, cluster_count, COALESCE(created_at, '') \
             FROM runs ORDER BY created_at DESC, run_id;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RunSummary {
                run_id: row.get(0)?,
                clone_threshold: row.get(1)?,
                requested: row.get::<_, i64>(2)? as usize,
                compared: row.get::<_, i64>(3)? as usize,
                excluded: row.get::<_, i64>(4)? as usize,
                pair_count: row.get::<_, i64>(5)? as usize,
                high_risk_count: row.get::<_, i64>(6)? as usize,
                cluster_count: row.get::<_, i64>(7)? as usize,
                created_at: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Remove a run and everything recorded under it.
    pub fn delete_run(&self, run_id: &str) -> ScanResult<bool> {
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM runs WHERE run_id = ?1;", params![run_id])?;
        Ok(deleted > 0)
    }

    /// Copy the database to `destination` with the SQLite backup API.
    pub fn backup_to(&self, destination: &Path) -> ScanResult<PathBuf> {
        let resolved = resolve_path(destination)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let src_conn = self.connect()?;
        let mut dst_conn = Connection::open(&resolved)?;
        let backup = rusqlite::backup::Backup::new(&src_conn, &mut dst_conn)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::models::RawArtifact;
    use crate::normalizer::RawCorpus;
    use crate::pipeline::analyze_corpus;

    fn sample_report() -> SimilarityReport {
        let base = "pragma solidity ^0.8.0;\ncontract Drop {\n    function mint() external {}\n    function burn() external {}\n}\n";
        let mut corpus = RawCorpus::new();
        corpus.insert("0xa".into(), Some(RawArtifact::Text(base.to_string())));
        corpus.insert("0xb".into(), Some(RawArtifact::Text(base.to_string())));
        corpus.insert(
            "0xc".into(),
            Some(RawArtifact::Text(
                "library Maths { function add(uint a, uint b) internal pure returns (uint) { return a + b; } }"
                    .to_string(),
            )),
        );
        corpus.insert("0xd".into(), None);
        corpus.insert("0xe".into(), Some(RawArtifact::Text("{\"sources\": ".to_string())));
        analyze_corpus(&corpus, &AnalysisConfig::default())
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::open(&tmp.path().join("nested").join("runs.db")).unwrap();
        assert_eq!(store.schema_version().unwrap(), schema::SCHEMA_VERSION);

        let report = sample_report();
        let run_id = store.save_report(&report).unwrap();
        assert_eq!(run_id.len(), RUN_ID_LEN);
        assert_eq!(run_id, run_id_for(&report).unwrap());

        let pairs = store.load_pairs(&run_id).unwrap();
        assert_eq!(pairs, report.pair_list());

        let clusters = store.load_clusters(&run_id).unwrap();
        assert_eq!(clusters, report.clusters);
        assert_eq!(clusters[0].members, vec!["0xa", "0xb"]);

        let excluded = store.load_excluded(&run_id).unwrap();
        assert_eq!(excluded, report.corpus.excluded);
        assert!(matches!(
            excluded[1].reason,
            UnavailableReason::MalformedBundle(_)
        ));

        let above = store.pairs_above(&run_id, 0.95).unwrap();
        assert_eq!(above.len(), 1);
        assert_eq!(above[0].key(), "0xa_0xb");

        let stored = store.load_report(&run_id).unwrap().unwrap();
        assert_eq!(stored.pairs.len(), report.pairs.len());
        assert!(store.load_report("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_keeps_pairs_of_underscored_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::open(&tmp.path().join("runs.db")).unwrap();
        let mut corpus = RawCorpus::new();
        for id in ["a", "a_b", "b_c", "c"] {
            corpus.insert(
                id.into(),
                Some(RawArtifact::Text(format!("contract T {{ function {}() public {{}} }}", id.replace('_', "")))),
            );
        }
        let report = analyze_corpus(&corpus, &AnalysisConfig::default());
        let run_id = store.save_report(&report).unwrap();
        let pairs = store.load_pairs(&run_id).unwrap();
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs, report.pair_list());
    }

    #[test]
    fn test_saving_twice_replaces_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::open(&tmp.path().join("runs.db")).unwrap();
        let report = sample_report();
        let first = store.save_report(&report).unwrap();
        let second = store.save_report(&report).unwrap();
        assert_eq!(first, second);

        let runs = store.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].pair_count, 3);
        assert_eq!(runs[0].requested, 5);
        assert_eq!(runs[0].excluded, 2);
        assert_eq!(runs[0].cluster_count, 1);
    }

    #[test]
    fn test_delete_run_cascades() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::open(&tmp.path().join("runs.db")).unwrap();
        let run_id = store.save_report(&sample_report()).unwrap();
        assert!(store.delete_run(&run_id).unwrap());
        assert!(!store.delete_run(&run_id).unwrap());
        assert!(store.load_pairs(&run_id).unwrap().is_empty());
        assert!(store.load_clusters(&run_id).unwrap().is_empty());
        assert!(store.list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_backup_copies_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReportStore::open(&tmp.path().join("runs.db")).unwrap();
        let run_id = store.save_report(&sample_report()).unwrap();
        let copy_path = store.backup_to(&tmp.path().join("backup").join("copy.db")).unwrap();
        let copy = ReportStore::open(&copy_path).unwrap();
        assert_eq!(copy.load_pairs(&run_id).unwrap().len(), 3);
    }
}
