//! Class name → `ClassReport` index built while ingesting reports.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::ClassReport;

/// Separator the JVM uses between an enclosing class and a nested one.
pub const NESTED_CLASS_MARKER: &str = "$";

/// Per-run index of class reports. Keys are unique; each run owns a fresh one.
#[derive(Debug, Default)]
pub struct ReportIndex {
    reports: BTreeMap<String, ClassReport>,
}

impl ReportIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the report for `classname`, registering an empty one first if
    /// there is none yet.
    pub fn indexed(&mut self, classname: &str) -> &mut ClassReport {
        self.reports.entry(classname.to_string()).or_default()
    }

    pub fn get(&self, classname: &str) -> Option<&ClassReport> {
        self.reports.get(classname)
    }

    /// Snapshot of the current class names, safe to hold across mutation.
    pub fn classnames(&self) -> Vec<String> {
        self.reports.keys().cloned().collect()
    }

    /// Move the report of `from` into `into` and drop `from` from the index.
    ///
    /// Returns `None` without touching the index when there is nothing
    /// under `from`. The target is created if needed.
    pub fn merge(&mut self, from: &str, into: &str) -> Option<&ClassReport> {
        if from == into {
            return self.reports.get(into);
        }
        let source = self.reports.remove(from)?;
        let target = self.indexed(into);
        target.add(source);
        Some(&*target)
    }

    pub fn remove(&mut self, classname: &str) -> Option<ClassReport> {
        self.reports.remove(classname)
    }

    /// Collapse nested-class reports into their top-level class.
    ///
    /// The enclosing name is everything before the first `marker`, so
    /// `Outer$Inner$Deeper` goes straight to `Outer` and one pass over the
    /// key snapshot is enough. Returns the number of merges performed.
    pub fn sanitize(&mut self, marker: &str) -> usize {
        if marker.is_empty() {
            return 0;
        }
        let mut merged = 0;
        for classname in self.classnames() {
            let Some((enclosing, _)) = classname.split_once(marker) else {
                continue;
            };
            if enclosing.is_empty() {
                continue;
            }
            if self.merge(&classname, enclosing).is_some() {
                debug!(from = %classname, into = %enclosing, "merged nested class report");
                merged += 1;
            }
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Reports in class name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassReport)> {
        self.reports.iter().map(|(name, report)| (name.as_str(), report))
    }

    /// Total test cases across all reports.
    pub fn total_tests(&self) -> u64 {
        self.reports.values().map(ClassReport::tests).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TestCaseResult, TestOutcome};

    fn index_with(entries: &[(&str, usize)]) -> ReportIndex {
        let mut index = ReportIndex::new();
        for (classname, count) in entries {
            let report = index.indexed(classname);
            for i in 0..*count {
                report.add_result(
                    TestCaseResult::new(*classname, format!("test{i}"), TestOutcome::Success)
                        .with_duration(1.0),
                );
            }
        }
        index
    }

    #[test]
    fn test_indexed_returns_same_report() {
        let mut index = ReportIndex::new();
        let first: *const ClassReport = index.indexed("com.acme.Foo");
        index
            .indexed("com.acme.Foo")
            .add_result(TestCaseResult::new("com.acme.Foo", "a", TestOutcome::Success));
        let second: *const ClassReport = index.indexed("com.acme.Foo");

        assert!(std::ptr::eq(first, second));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("com.acme.Foo").unwrap().tests(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let index = ReportIndex::new();
        assert!(index.get("Missing").is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_classnames_is_a_snapshot() {
        let mut index = index_with(&[("A", 1), ("B", 1)]);
        let names = index.classnames();
        index.remove("A");
        assert_eq!(names, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(index.classnames(), vec!["B".to_string()]);
    }

    #[test]
    fn test_merge_conserves_counts() {
        let mut index = index_with(&[("A", 3), ("B", 4)]);
        let merged = index.merge("A", "B").unwrap();
        assert_eq!(merged.tests(), 7);
        assert_eq!(merged.duration_millis(), Some(7.0));
        assert!(index.get("A").is_none());
        assert_eq!(index.total_tests(), 7);
    }

    #[test]
    fn test_merge_into_absent_target_creates_it() {
        let mut index = index_with(&[("A", 2)]);
        let merged = index.merge("A", "Fresh").unwrap().clone();
        assert_eq!(merged.tests(), 2);
        assert_eq!(merged.duration_millis(), Some(2.0));
        assert_eq!(index.classnames(), vec!["Fresh".to_string()]);
    }

    #[test]
    fn test_merge_missing_source_is_noop() {
        let mut index = index_with(&[("B", 1)]);
        assert!(index.merge("A", "B").is_none());
        assert!(index.merge("A", "C").is_none());
        assert_eq!(index.classnames(), vec!["B".to_string()]);
        assert_eq!(index.get("B").unwrap().tests(), 1);
    }

    #[test]
    fn test_merge_into_self_keeps_counts() {
        let mut index = index_with(&[("A", 2)]);
        assert_eq!(index.merge("A", "A").unwrap().tests(), 2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_sanitize_collapses_nested_classes() {
        let mut index = index_with(&[("Outer", 1), ("Outer$Inner1", 2), ("Outer$Inner2", 3)]);
        assert_eq!(index.sanitize(NESTED_CLASS_MARKER), 2);
        assert_eq!(index.classnames(), vec!["Outer".to_string()]);
        assert_eq!(index.get("Outer").unwrap().tests(), 6);
    }

    #[test]
    fn test_sanitize_creates_missing_enclosing_class() {
        let mut index = index_with(&[("com.acme.Foo$1", 2)]);
        index.sanitize(NESTED_CLASS_MARKER);
        assert_eq!(index.classnames(), vec!["com.acme.Foo".to_string()]);
        assert_eq!(index.get("com.acme.Foo").unwrap().tests(), 2);
    }

    #[test]
    fn test_sanitize_multi_level_nesting_in_one_pass() {
        let mut index = index_with(&[("Outer$Inner", 1), ("Outer$Inner$Deeper", 2)]);
        index.sanitize(NESTED_CLASS_MARKER);
        assert_eq!(index.classnames(), vec!["Outer".to_string()]);
        assert_eq!(index.get("Outer").unwrap().tests(), 3);
    }

    #[test]
    fn test_sanitize_skips_names_without_enclosing_part() {
        let mut index = index_with(&[("$Proxy", 1), ("Plain", 1)]);
        assert_eq!(index.sanitize(NESTED_CLASS_MARKER), 0);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_sanitize_is_order_independent() {
        let mut a = index_with(&[("X$B", 1), ("X", 2), ("X$A", 4)]);
        let mut b = index_with(&[("X$A", 4), ("X$B", 1), ("X", 2)]);
        a.sanitize(NESTED_CLASS_MARKER);
        b.sanitize(NESTED_CLASS_MARKER);
        assert_eq!(a.get("X").unwrap().tests(), b.get("X").unwrap().tests());
        assert_eq!(a.total_tests(), 7);
    }
}
