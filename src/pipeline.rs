//! The collect run: discover → parse all → sanitize → publish.
//!
//! The host plugs in through two capabilities: a [`ResourceResolver`] that
//! maps a class name to whatever the host attaches measures to, and a
//! [`MeasureSink`] that stores them.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::discover::{discover_reports, Discovery, ReportPatterns};
use crate::error::Result;
use crate::index::{ReportIndex, NESTED_CLASS_MARKER};
use crate::ingest::ingest_report;
use crate::model::ClassReport;

/// Measures published per resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SkippedTests,
    /// Executed tests: all tests minus skipped ones.
    Tests,
    TestErrors,
    TestFailures,
    TestExecutionTime,
    /// Serialized per-class detail, see [`ClassReport::to_detail`].
    TestData,
}

impl Metric {
    pub fn key(&self) -> &'static str {
        match self {
            Metric::SkippedTests => "skipped_tests",
            Metric::Tests => "tests",
            Metric::TestErrors => "test_errors",
            Metric::TestFailures => "test_failures",
            Metric::TestExecutionTime => "test_execution_time",
            Metric::TestData => "test_data",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Maps a class name to the host's resource, if it has one.
pub trait ResourceResolver {
    type Resource;

    fn resolve(&self, class_key: &str) -> Option<Self::Resource>;
}

/// Receives published measures.
pub trait MeasureSink<R> {
    fn save_measure(&mut self, resource: &R, metric: Metric, value: f64) -> Result<()>;

    fn save_data(&mut self, resource: &R, metric: Metric, data: &str) -> Result<()>;
}

/// Settings for one collect run.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub reports_dir: Option<PathBuf>,
    pub patterns: ReportPatterns,
    pub nested_class_marker: String,
    /// Also publish the serialized detail of every resolved class.
    pub publish_details: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            reports_dir: None,
            patterns: ReportPatterns::default(),
            nested_class_marker: NESTED_CLASS_MARKER.to_string(),
            publish_details: false,
        }
    }
}

impl CollectConfig {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: Some(reports_dir.into()),
            ..Default::default()
        }
    }
}

/// What a collect run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    /// Report files parsed.
    pub reports: usize,
    /// Class reports left after merging nested classes.
    pub classes: usize,
    /// Test cases across those classes, skipped ones included.
    pub tests: u64,
    /// Classes whose measures were published.
    pub saved: usize,
    /// Classes with no matching resource, in class name order.
    pub unresolved: Vec<String>,
}

/// Run the whole pipeline and publish measures through `sink`.
///
/// Missing reports are not an error: the run publishes nothing. A report
/// that fails to parse aborts the run before anything is published.
pub fn collect<V, S>(config: &CollectConfig, resolver: &V, sink: &mut S) -> Result<CollectSummary>
where
    V: ResourceResolver,
    S: MeasureSink<V::Resource>,
{
    let files = match discover_reports(config.reports_dir.as_deref(), &config.patterns) {
        Discovery::Reports(files) => files,
        Discovery::NotFound | Discovery::NoReports => return Ok(CollectSummary::default()),
    };

    let mut index = ReportIndex::new();
    for file in &files {
        ingest_report(&mut index, file)?;
    }
    let merged = index.sanitize(&config.nested_class_marker);
    debug!(merged, "merged nested class reports");

    let mut summary = publish(&index, resolver, sink, config.publish_details)?;
    summary.reports = files.len();
    info!(
        reports = summary.reports,
        classes = summary.classes,
        tests = summary.tests,
        saved = summary.saved,
        unresolved = summary.unresolved.len(),
        "collected unit test results"
    );
    Ok(summary)
}

/// Publish the measures of every non-empty report in a sanitized index.
pub fn publish<V, S>(
    index: &ReportIndex,
    resolver: &V,
    sink: &mut S,
    with_details: bool,
) -> Result<CollectSummary>
where
    V: ResourceResolver,
    S: MeasureSink<V::Resource>,
{
    let mut summary = CollectSummary {
        classes: index.len(),
        tests: index.total_tests(),
        ..Default::default()
    };
    for (classname, report) in index.iter() {
        if report.tests() == 0 {
            continue;
        }
        let Some(resource) = resolver.resolve(classname) else {
            debug!(classname, "no resource for test class, skipping");
            summary.unresolved.push(classname.to_string());
            continue;
        };
        save_measures(sink, &resource, report)?;
        if with_details {
            save_results(sink, &resource, report)?;
        }
        summary.saved += 1;
    }
    Ok(summary)
}

/// Publish the five numeric measures of `report`. NaN values are left out.
pub fn save_measures<R, S>(sink: &mut S, resource: &R, report: &ClassReport) -> Result<()>
where
    S: MeasureSink<R> + ?Sized,
{
    let executed = report.executed() as f64;
    save_measure(sink, resource, Metric::SkippedTests, report.skipped() as f64)?;
    save_measure(sink, resource, Metric::Tests, executed)?;
    save_measure(sink, resource, Metric::TestErrors, report.errors() as f64)?;
    save_measure(sink, resource, Metric::TestFailures, report.failures() as f64)?;
    save_measure(
        sink,
        resource,
        Metric::TestExecutionTime,
        report.duration_millis().unwrap_or(f64::NAN),
    )
}

/// Publish the serialized detail of `report` under [`Metric::TestData`].
pub fn save_results<R, S>(sink: &mut S, resource: &R, report: &ClassReport) -> Result<()>
where
    S: MeasureSink<R> + ?Sized,
{
    let detail = report.to_detail()?;
    sink.save_data(resource, Metric::TestData, &detail)
}

fn save_measure<R, S>(sink: &mut S, resource: &R, metric: Metric, value: f64) -> Result<()>
where
    S: MeasureSink<R> + ?Sized,
{
    if value.is_nan() {
        return Ok(());
    }
    sink.save_measure(resource, metric, value)
}
