//! SQLite schema DDL and migration framework for persisted reports.

use rusqlite::Connection;

use crate::errors::{ScanError, ScanResult};

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 1;

/// Core DDL statements: 7 CREATE TABLE + 5 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (7) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS runs (
        run_id TEXT PRIMARY KEY,
        clone_threshold REAL NOT NULL,
        requested INTEGER NOT NULL,
        compared INTEGER NOT NULL,
        excluded INTEGER NOT NULL,
        pair_count INTEGER NOT NULL,
        high_risk_count INTEGER NOT NULL,
        cluster_count INTEGER NOT NULL,
        report_json TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    "CREATE TABLE IF NOT EXISTS pairs (
        run_id TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
        pair_key TEXT NOT NULL,
        contract_a TEXT NOT NULL,
        contract_b TEXT NOT NULL,
        full_similarity REAL NOT NULL,
        partial_similarity REAL NOT NULL,
        method TEXT NOT NULL,
        sampled INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL,
        PRIMARY KEY(run_id, pair_key)
    );",
    "CREATE TABLE IF NOT EXISTS clusters (
        run_id TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
        cluster_id INTEGER NOT NULL,
        size INTEGER NOT NULL,
        edge_count INTEGER NOT NULL,
        max_similarity REAL NOT NULL,
        min_edge_similarity REAL NOT NULL,
        PRIMARY KEY(run_id, cluster_id)
    );",
    "CREATE TABLE IF NOT EXISTS cluster_members (
        run_id TEXT NOT NULL,
        cluster_id INTEGER NOT NULL,
        contract_id TEXT NOT NULL,
        PRIMARY KEY(run_id, cluster_id, contract_id),
        FOREIGN KEY(run_id, cluster_id) REFERENCES clusters(run_id, cluster_id) ON DELETE CASCADE
    );",
    "CREATE TABLE IF NOT EXISTS excluded_contracts (
        run_id TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
        contract_id TEXT NOT NULL,
        reason TEXT NOT NULL,
        detail TEXT,
        PRIMARY KEY(run_id, contract_id)
    );",
    // ── indexes (5) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_pairs_contract_a ON pairs(contract_a);",
    "CREATE INDEX IF NOT EXISTS idx_pairs_contract_b ON pairs(contract_b);",
    "CREATE INDEX IF NOT EXISTS idx_cluster_members_contract ON cluster_members(contract_id);",
    "CREATE INDEX IF NOT EXISTS idx_pairs_run_full ON pairs(run_id, full_similarity DESC);",
    "CREATE INDEX IF NOT EXISTS idx_pairs_run_partial ON pairs(run_id, partial_similarity DESC);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`].  Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> ScanResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT clonescan_migrate_step;")?;

        let step_result = (|| -> ScanResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT clonescan_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT clonescan_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT clonescan_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `schema_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> ScanResult<()> {
    conn.execute(
        "INSERT INTO schema_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> ScanResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline. Stamps a database created from [`SCHEMA_STATEMENTS`]
/// and checks that the tables a report needs are present.
fn migrate_to_v1(conn: &Connection) -> ScanResult<()> {
    for table in ["runs", "pairs", "clusters", "cluster_members", "excluded_contracts"] {
        let present: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            rusqlite::params![table],
            |row| row.get(0),
        )?;
        if present == 0 {
            return Err(ScanError::Report(format!(
                "schema baseline is missing table {table}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).unwrap();
        }
        conn
    }

    #[test]
    fn test_schema_statement_counts() {
        assert_eq!(SCHEMA_STATEMENTS.len(), 12);
    }

    #[test]
    fn test_migrate_fresh_database() {
        let conn = fresh();
        assert_eq!(get_schema_version(&conn), 0);
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);

        let steps: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM migration_history WHERE status = 'success';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(steps, SCHEMA_VERSION as i64);
    }

    #[test]
    fn test_baseline_fails_without_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_STATEMENTS[0]).unwrap();
        conn.execute_batch(SCHEMA_STATEMENTS[1]).unwrap();
        assert!(migrate_schema(&conn).is_err());
        assert_eq!(get_schema_version(&conn), 0);
        let failed: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM migration_history WHERE status = 'failed';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }
}
