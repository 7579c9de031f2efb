use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::{Result, TestrsError};
use crate::model::{RunInfo, StoredMeasure};
use crate::pipeline::{MeasureSink, Metric};

pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = include_str!("../schema.sql");

/// Open (or create) the measure database at the given path.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
    Ok(conn)
}

/// Ensure the schema is initialized. Safe to call on an already-initialized DB.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
        }
        Some(v) if v == SCHEMA_VERSION => {}
        Some(v) => {
            return Err(TestrsError::Other(format!(
                "Database schema version {} is not supported by this binary ({}). \
                 Delete the database and collect again.",
                v, SCHEMA_VERSION
            )));
        }
    }
    Ok(())
}

/// Register a new collect run. Returns the run id.
pub fn create_run(conn: &Connection, name: &str, reports_dir: Option<&str>) -> Result<i64> {
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO run (name, reports_dir, created_at) VALUES (?1, ?2, ?3)",
        params![name, reports_dir, now],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            TestrsError::Other(format!(
                "Run '{}' already exists. Use --name to choose a different name, or delete it first.",
                name
            ))
        }
        other => TestrsError::Sqlite(other),
    })?;
    Ok(conn.last_insert_rowid())
}

/// Stores measures under one run. Wrap the run in a transaction so a failed
/// collect leaves nothing behind.
pub struct SqliteSink<'c> {
    conn: &'c Connection,
    run_id: i64,
}

impl<'c> SqliteSink<'c> {
    pub fn new(conn: &'c Connection, run_id: i64) -> Self {
        Self { conn, run_id }
    }
}

impl MeasureSink<String> for SqliteSink<'_> {
    fn save_measure(&mut self, resource: &String, metric: Metric, value: f64) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO measure (run_id, resource, metric, value, data) \
             VALUES (?1, ?2, ?3, ?4, NULL)",
        )?;
        stmt.execute(params![self.run_id, resource, metric.key(), value])?;
        Ok(())
    }

    fn save_data(&mut self, resource: &String, metric: Metric, data: &str) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO measure (run_id, resource, metric, value, data) \
             VALUES (?1, ?2, ?3, NULL, ?4)",
        )?;
        stmt.execute(params![self.run_id, resource, metric.key(), data])?;
        Ok(())
    }
}

fn run_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row("SELECT id FROM run WHERE name = ?1", params![name], |row| {
        row.get(0)
    })
    .optional()?
    .ok_or_else(|| TestrsError::RunNotFound(name.to_string()))
}

/// Name of the most recently created run.
pub fn get_latest_run_name(conn: &Connection) -> Result<Option<String>> {
    Ok(conn
        .query_row("SELECT name FROM run ORDER BY id DESC LIMIT 1", [], |row| {
            row.get(0)
        })
        .optional()?)
}

/// All runs, newest first.
pub fn list_runs(conn: &Connection) -> Result<Vec<RunInfo>> {
    let mut stmt = conn.prepare(
        "SELECT r.name, r.reports_dir, r.created_at, COUNT(DISTINCT m.resource) \
         FROM run r LEFT JOIN measure m ON m.run_id = r.id \
         GROUP BY r.id ORDER BY r.id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(RunInfo {
            name: row.get(0)?,
            reports_dir: row.get(1)?,
            created_at: row.get(2)?,
            resources: row.get::<_, i64>(3)? as u64,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Numeric measures of a run, optionally restricted to one resource,
/// ordered by resource then metric.
pub fn get_measures(
    conn: &Connection,
    run: &str,
    resource: Option<&str>,
) -> Result<Vec<StoredMeasure>> {
    let run_id = run_id(conn, run)?;
    let mut stmt = conn.prepare(
        "SELECT resource, metric, value FROM measure \
         WHERE run_id = ?1 AND value IS NOT NULL AND (?2 IS NULL OR resource = ?2) \
         ORDER BY resource, metric",
    )?;
    let rows = stmt.query_map(params![run_id, resource], |row| {
        Ok(StoredMeasure {
            resource: row.get(0)?,
            metric: row.get(1)?,
            value: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// The serialized test detail of one resource, if it was published.
pub fn get_detail(conn: &Connection, run: &str, resource: &str) -> Result<Option<String>> {
    let run_id = run_id(conn, run)?;
    Ok(conn
        .query_row(
            "SELECT data FROM measure WHERE run_id = ?1 AND resource = ?2 AND metric = ?3",
            params![run_id, resource, Metric::TestData.key()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Delete a run and its measures.
pub fn delete_run(conn: &Connection, name: &str) -> Result<()> {
    let deleted = conn.execute("DELETE FROM run WHERE name = ?1", params![name])?;
    if deleted == 0 {
        return Err(TestrsError::RunNotFound(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = memory_db();
        init_schema(&conn).unwrap();
        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sink_round_trip() {
        let conn = memory_db();
        let run = create_run(&conn, "r1", Some("target/surefire-reports")).unwrap();
        let mut sink = SqliteSink::new(&conn, run);
        let resource = "src/Foo.js".to_string();
        sink.save_measure(&resource, Metric::Tests, 3.0).unwrap();
        sink.save_measure(&resource, Metric::TestFailures, 1.0).unwrap();
        sink.save_data(&resource, Metric::TestData, "{}").unwrap();

        let measures = get_measures(&conn, "r1", None).unwrap();
        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].metric, "test_failures");
        assert_eq!(measures[1].value, 3.0);
        assert_eq!(get_detail(&conn, "r1", "src/Foo.js").unwrap().as_deref(), Some("{}"));
        assert_eq!(get_detail(&conn, "r1", "src/Bar.js").unwrap(), None);
    }

    #[test]
    fn test_duplicate_run_name_fails() {
        let conn = memory_db();
        create_run(&conn, "dup", None).unwrap();
        let err = create_run(&conn, "dup", None).unwrap_err();
        assert!(err.to_string().contains("already exists"), "Error: {err}");
    }

    #[test]
    fn test_delete_run_cascades() {
        let conn = memory_db();
        let run = create_run(&conn, "gone", None).unwrap();
        SqliteSink::new(&conn, run)
            .save_measure(&"a".to_string(), Metric::Tests, 1.0)
            .unwrap();

        delete_run(&conn, "gone").unwrap();
        let left: u32 = conn
            .query_row("SELECT COUNT(*) FROM measure", [], |row| row.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert!(matches!(delete_run(&conn, "gone"), Err(TestrsError::RunNotFound(_))));
        assert!(matches!(get_measures(&conn, "gone", None), Err(TestrsError::RunNotFound(_))));
    }
}
