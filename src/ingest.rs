use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, TestrsError};
use crate::index::ReportIndex;
use crate::model::TestCaseResult;
use crate::parsers::surefire;

/// Feed a stream of test cases into `index`, each into the report of its
/// own class. Stops at the first error. Returns the number of cases added.
pub fn ingest_events<I>(index: &mut ReportIndex, events: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<TestCaseResult>>,
{
    let mut count = 0;
    for event in events {
        let case = event?;
        // Clone the key first; `case` moves into the report.
        let classname = case.classname.clone();
        index.indexed(&classname).add_result(case);
        count += 1;
    }
    Ok(count)
}

/// Parse one report file into `index`.
///
/// Any read or parse failure is wrapped so the error names the file.
pub fn ingest_report(index: &mut ReportIndex, path: &Path) -> Result<usize> {
    let wrap = |source: TestrsError| TestrsError::Report {
        path: path.to_path_buf(),
        source: Box::new(source),
    };
    let file = File::open(path).map_err(|e| wrap(e.into()))?;
    let count = ingest_events(index, surefire::events(BufReader::new(file))).map_err(wrap)?;
    debug!(path = %path.display(), cases = count, "parsed report");
    Ok(count)
}
