//! In-memory representation of test outcomes, independent of the report
//! format they were read from. Parsers produce `TestCaseResult`s which are
//! accumulated into one `ClassReport` per class name.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TestrsError};

/// Classification of a single executed test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Success,
    Skipped,
    Failure,
    Error,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Success => "success",
            TestOutcome::Skipped => "skipped",
            TestOutcome::Failure => "failure",
            TestOutcome::Error => "error",
        }
    }
}

impl std::fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One `<testcase>` as read from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub classname: String,
    pub name: String,
    pub outcome: TestOutcome,
    /// `None` when the report carries no timing for this case.
    #[serde(rename = "duration_ms")]
    pub duration_millis: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl TestCaseResult {
    pub fn new(classname: impl Into<String>, name: impl Into<String>, outcome: TestOutcome) -> Self {
        Self {
            classname: classname.into(),
            name: name.into(),
            outcome,
            duration_millis: None,
            message: None,
            stack_trace: None,
        }
    }

    pub fn with_duration(mut self, millis: f64) -> Self {
        self.duration_millis = Some(millis);
        self
    }
}

/// Aggregated outcomes for one class name.
///
/// Counts only ever grow: by `add_result` during ingestion and by `add` when
/// another report is merged in. `errors + failures + skipped <= tests` holds
/// at all times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    tests: u64,
    errors: u64,
    failures: u64,
    skipped: u64,
    #[serde(rename = "duration_ms")]
    duration_millis: Option<f64>,
    results: Vec<TestCaseResult>,
}

impl ClassReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tests(&self) -> u64 {
        self.tests
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Tests that actually ran, i.e. everything but the skipped ones.
    pub fn executed(&self) -> u64 {
        self.tests - self.skipped
    }

    /// Sum of the known case durations, `None` if no case reported one.
    pub fn duration_millis(&self) -> Option<f64> {
        self.duration_millis
    }

    pub fn results(&self) -> &[TestCaseResult] {
        &self.results
    }

    pub fn add_result(&mut self, result: TestCaseResult) {
        self.tests += 1;
        match result.outcome {
            TestOutcome::Success => {}
            TestOutcome::Skipped => self.skipped += 1,
            TestOutcome::Failure => self.failures += 1,
            TestOutcome::Error => self.errors += 1,
        }
        self.duration_millis = sum_durations(self.duration_millis, result.duration_millis);
        self.results.push(result);
    }

    /// Fold another report into this one. Results of `other` are appended
    /// after the existing ones.
    pub fn add(&mut self, other: ClassReport) {
        self.tests += other.tests;
        self.errors += other.errors;
        self.failures += other.failures;
        self.skipped += other.skipped;
        self.duration_millis = sum_durations(self.duration_millis, other.duration_millis);
        self.results.extend(other.results);
    }

    /// Serialize the report, including every case, for the test-data channel.
    pub fn to_detail(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read back a document produced by [`ClassReport::to_detail`].
    pub fn from_detail(detail: &str) -> Result<Self> {
        let report: ClassReport = serde_json::from_str(detail)?;
        let outcomes = report
            .errors
            .checked_add(report.failures)
            .and_then(|n| n.checked_add(report.skipped));
        if outcomes.map_or(true, |n| n > report.tests) {
            return Err(TestrsError::Other(format!(
                "Inconsistent test detail: {} errors, {} failures and {} skipped out of {} tests",
                report.errors, report.failures, report.skipped, report.tests
            )));
        }
        if report.results.len() as u64 != report.tests {
            return Err(TestrsError::Other(format!(
                "Inconsistent test detail: {} results for {} tests",
                report.results.len(),
                report.tests
            )));
        }
        Ok(report)
    }
}

/// A stored collect run.
#[derive(Debug)]
pub struct RunInfo {
    pub name: String,
    pub reports_dir: Option<String>,
    pub created_at: String,
    /// Distinct resources that received measures.
    pub resources: u64,
}

/// One numeric measure as stored for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMeasure {
    pub resource: String,
    pub metric: String,
    pub value: f64,
}

fn sum_durations(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}
