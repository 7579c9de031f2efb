#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::TempDir;
use testrs::error::Result;
use testrs::pipeline::{MeasureSink, Metric, ResourceResolver};

/// Create a fresh temporary database, returning the connection, dir handle, and db path.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_db() -> (Connection, TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("test.db");
    let conn = testrs::db::open(&db_path).unwrap();
    testrs::db::init_schema(&conn).unwrap();
    (conn, dir, db_path)
}

/// Copy a fixture from `tests/fixtures` into `dir`.
pub fn copy_fixture(dir: &Path, name: &str) {
    let src = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::copy(src, dir.join(name)).unwrap();
}

/// Resolves every class to `<class>.js`.
pub struct AnyResolver;

impl ResourceResolver for AnyResolver {
    type Resource = String;

    fn resolve(&self, class_key: &str) -> Option<String> {
        Some(format!("{class_key}.js"))
    }
}

/// Keeps every published measure in memory.
#[derive(Default)]
pub struct MemorySink {
    pub values: HashMap<(String, Metric), f64>,
    pub data: HashMap<String, String>,
}

impl MemorySink {
    pub fn value(&self, resource: &str, metric: Metric) -> Option<f64> {
        self.values.get(&(resource.to_string(), metric)).copied()
    }

    pub fn resources(&self) -> Vec<String> {
        let mut resources: Vec<_> = self.values.keys().map(|(r, _)| r.clone()).collect();
        resources.sort();
        resources.dedup();
        resources
    }
}

impl MeasureSink<String> for MemorySink {
    fn save_measure(&mut self, resource: &String, metric: Metric, value: f64) -> Result<()> {
        self.values.insert((resource.clone(), metric), value);
        Ok(())
    }

    fn save_data(&mut self, resource: &String, _metric: Metric, data: &str) -> Result<()> {
        self.data.insert(resource.clone(), data.to_string());
        Ok(())
    }
}
