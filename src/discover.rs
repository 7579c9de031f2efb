/// Discovery of report files in a reports directory.
///
/// Strategy:
///   1. List the files (one level, no recursion) whose name starts with the
///      per-class prefix and ends with the report extension.
///   2. If there are none, retry with the suite-aggregate prefix.
///
/// The two result sets are never combined.
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// File name conventions for report files. Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPatterns {
    /// Per test class reports, e.g. `TEST-com.acme.FooTest.xml`.
    pub primary_prefix: String,
    /// Suite aggregated reports, e.g. `TESTS-TestSuites.xml`.
    pub secondary_prefix: String,
    pub extension: String,
}

impl Default for ReportPatterns {
    fn default() -> Self {
        Self {
            primary_prefix: "TEST-".to_string(),
            secondary_prefix: "TESTS-".to_string(),
            extension: ".xml".to_string(),
        }
    }
}

/// Outcome of looking for reports. Only `Reports` carries files; the other
/// two are recoverable "nothing to do" states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The directory is absent, not a directory, or could not be listed.
    NotFound,
    /// The directory exists but no file matches either prefix.
    NoReports,
    Reports(Vec<PathBuf>),
}

impl Discovery {
    pub fn into_files(self) -> Vec<PathBuf> {
        match self {
            Discovery::Reports(files) => files,
            Discovery::NotFound | Discovery::NoReports => Vec::new(),
        }
    }
}

/// Find the report files to parse under `dir`.
pub fn discover_reports(dir: Option<&Path>, patterns: &ReportPatterns) -> Discovery {
    let Some(dir) = dir else {
        return Discovery::NotFound;
    };
    if !dir.is_dir() {
        warn!("Reports path not found: {}", dir.display());
        return Discovery::NotFound;
    }

    let names = match list_file_names(dir) {
        Ok(names) => names,
        Err(e) => {
            warn!("Could not list reports directory {}: {e}", dir.display());
            return Discovery::NotFound;
        }
    };

    let mut files = select(dir, &names, &patterns.primary_prefix, &patterns.extension);
    if files.is_empty() {
        // Maybe there's only a suite-level report.
        files = select(dir, &names, &patterns.secondary_prefix, &patterns.extension);
    }

    if files.is_empty() {
        warn!(
            "No unit test information will be saved, because no unit test report has been found in the given directory: {}",
            dir.display()
        );
        return Discovery::NoReports;
    }

    debug!(count = files.len(), dir = %dir.display(), "discovered report files");
    Discovery::Reports(files)
}

/// Files directly under `dir`, symlinks followed, sorted so runs are
/// reproducible.
fn list_file_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        // Report names are plain ASCII; anything else can't match a prefix.
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

fn select(dir: &Path, names: &[String], prefix: &str, extension: &str) -> Vec<PathBuf> {
    names
        .iter()
        .filter(|name| name.starts_with(prefix) && name.ends_with(extension))
        .map(|name| dir.join(name))
        .collect()
}
