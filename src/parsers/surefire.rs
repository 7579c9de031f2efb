/// Parser for Surefire / JUnit XML test reports.
///
/// Surefire XML structure (one file per test class, `TEST-*.xml`):
///   <testsuite name="com.acme.FooTest" tests="3" failures="1" errors="0" skipped="1" time="0.042">
///     <properties>...</properties>
///     <testcase classname="com.acme.FooTest" name="adds" time="0.012"/>
///     <testcase classname="com.acme.FooTest" name="subtracts" time="0.020">
///       <failure message="expected 1 but was 2" type="AssertionError">stack trace</failure>
///     </testcase>
///     <testcase classname="com.acme.FooTest$Nested" name="later" time="0">
///       <skipped/>
///     </testcase>
///     <system-out>...</system-out>
///   </testsuite>
///
/// Suite-aggregated reports (`TESTS-*.xml`) wrap several `<testsuite>`
/// elements in a `<testsuites>` root; the grammar is otherwise the same.
///
/// Notes:
///   - `classname` falls back to the enclosing suite's `name` when blank.
///   - Parameterized runners produce `classname="Foo(param)"`; everything
///     from the first `(` is dropped.
///   - `time` is in seconds and may use `,` as a grouping separator.
///   - The first of `<skipped>`, `<failure>`, `<error>` inside a test case
///     decides its outcome; no such child means success.
use std::io::BufRead;
use std::iter::FusedIterator;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{get_attr, is_blank, utf8_lossy, xml_err, xml_reader};
use crate::error::{Result, TestrsError};
use crate::model::{TestCaseResult, TestOutcome};

/// Lazy stream of the test cases in one report.
///
/// Each `<testcase>` is yielded as soon as its closing tag is read. After
/// the first error the stream is exhausted; it cannot be restarted.
pub struct SurefireEvents<R: BufRead> {
    xml: Reader<R>,
    buf: Vec<u8>,
    /// Names of the open `<testsuite>` elements, innermost last.
    suites: Vec<Option<String>>,
    current: Option<TestCaseResult>,
    /// Inside the `<failure>`/`<error>` that decided the current outcome.
    capturing: bool,
    depth: usize,
    saw_root: bool,
    done: bool,
}

/// Start streaming test cases from `reader`.
pub fn events<R: BufRead>(reader: R) -> SurefireEvents<R> {
    SurefireEvents {
        xml: xml_reader(reader),
        buf: Vec::new(),
        suites: Vec::new(),
        current: None,
        capturing: false,
        depth: 0,
        saw_root: false,
        done: false,
    }
}

/// Parse a whole report held in memory.
pub fn parse(input: &[u8]) -> Result<Vec<TestCaseResult>> {
    events(input).collect()
}

/// Owned copy of the parts of an XML event this parser looks at, so the
/// reader's buffer can be reused before the event is acted on.
enum Node {
    Open {
        name: Vec<u8>,
        empty: bool,
        attrs: Attrs,
    },
    Close(Vec<u8>),
    Text(String),
    Skip,
    Eof,
}

#[derive(Default)]
struct Attrs {
    name: Option<String>,
    classname: Option<String>,
    time: Option<String>,
    message: Option<String>,
}

impl Attrs {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            name: get_attr(e, b"name"),
            classname: get_attr(e, b"classname"),
            time: get_attr(e, b"time"),
            message: get_attr(e, b"message"),
        }
    }
}

impl<R: BufRead> SurefireEvents<R> {
    fn read_node(&mut self) -> Result<Node> {
        let node = match self.xml.read_event_into(&mut self.buf) {
            Err(e) => return Err(xml_err(e, &self.xml)),
            Ok(Event::Start(e)) => Node::Open {
                name: e.local_name().as_ref().to_vec(),
                empty: false,
                attrs: Attrs::from_element(&e),
            },
            Ok(Event::Empty(e)) => Node::Open {
                name: e.local_name().as_ref().to_vec(),
                empty: true,
                attrs: Attrs::from_element(&e),
            },
            Ok(Event::End(e)) => Node::Close(e.local_name().as_ref().to_vec()),
            Ok(Event::Text(e)) => match e.unescape() {
                Ok(text) => Node::Text(text.into_owned()),
                Err(err) => return Err(xml_err(err, &self.xml)),
            },
            Ok(Event::CData(e)) => Node::Text(utf8_lossy(&e.into_inner())),
            Ok(Event::Eof) => Node::Eof,
            Ok(_) => Node::Skip,
        };
        self.buf.clear();
        Ok(node)
    }

    fn parse_err(&self, message: impl Into<String>) -> TestrsError {
        TestrsError::Parse {
            message: message.into(),
            position: self.xml.buffer_position(),
        }
    }

    /// Advance by one XML node. Returns a test case when one completes.
    fn step(&mut self) -> Result<Option<TestCaseResult>> {
        match self.read_node()? {
            Node::Eof => {
                self.done = true;
                if self.depth > 0 || self.current.is_some() {
                    return Err(self.parse_err("unexpected end of document inside an open element"));
                }
                if !self.saw_root {
                    return Err(self.parse_err("document has no root element"));
                }
                Ok(None)
            }
            Node::Open { name, empty, attrs } => {
                if self.depth == 0 && self.saw_root {
                    return Err(self.parse_err("document has more than one root element"));
                }
                self.saw_root = true;
                if !empty {
                    self.depth += 1;
                }
                match name.as_slice() {
                    b"testsuite" if !empty => {
                        self.suites.push(attrs.name);
                        Ok(None)
                    }
                    b"testcase" => {
                        let case = self.open_case(attrs)?;
                        if empty {
                            Ok(Some(case))
                        } else {
                            self.current = Some(case);
                            Ok(None)
                        }
                    }
                    b"skipped" => {
                        self.set_outcome(TestOutcome::Skipped, attrs.message);
                        Ok(None)
                    }
                    b"failure" | b"error" => {
                        let outcome = if name.as_slice() == b"failure" {
                            TestOutcome::Failure
                        } else {
                            TestOutcome::Error
                        };
                        if self.set_outcome(outcome, attrs.message) && !empty {
                            self.capturing = true;
                        }
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            Node::Close(name) => {
                self.depth = self.depth.saturating_sub(1);
                match name.as_slice() {
                    b"testsuite" => {
                        self.suites.pop();
                        Ok(None)
                    }
                    b"testcase" => {
                        self.capturing = false;
                        Ok(self.current.take())
                    }
                    b"failure" | b"error" => {
                        self.capturing = false;
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            Node::Text(text) => {
                if self.depth == 0 && !text.trim().is_empty() {
                    return Err(self.parse_err("content outside of the root element"));
                }
                if self.capturing {
                    if let Some(case) = self.current.as_mut() {
                        match case.stack_trace.as_mut() {
                            Some(trace) => trace.push_str(&text),
                            None => case.stack_trace = Some(text),
                        }
                    }
                }
                Ok(None)
            }
            Node::Skip => Ok(None),
        }
    }

    fn open_case(&self, attrs: Attrs) -> Result<TestCaseResult> {
        let suite = self.suites.iter().rev().find_map(|s| s.as_deref());
        let classname = case_classname(attrs.classname, suite)
            .ok_or_else(|| self.parse_err("test case has neither a classname nor an enclosing suite name"))?;
        let duration_millis = parse_duration(attrs.time.as_deref()).map_err(|m| self.parse_err(m))?;

        let mut case = TestCaseResult::new(classname, attrs.name.unwrap_or_default(), TestOutcome::Success);
        case.duration_millis = duration_millis;
        Ok(case)
    }

    /// Record a non-success outcome on the open test case. Only the first
    /// one counts; returns whether this call set it.
    fn set_outcome(&mut self, outcome: TestOutcome, message: Option<String>) -> bool {
        match self.current.as_mut() {
            Some(case) if case.outcome == TestOutcome::Success => {
                case.outcome = outcome;
                case.message = message;
                true
            }
            _ => false,
        }
    }
}

impl<R: BufRead> Iterator for SurefireEvents<R> {
    type Item = Result<TestCaseResult>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.step() {
                Ok(Some(case)) => return Some(Ok(case)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl<R: BufRead> FusedIterator for SurefireEvents<R> {}

fn case_classname(classname: Option<String>, suite: Option<&str>) -> Option<String> {
    let classname = classname.map(|c| {
        let c = c.trim();
        match c.find('(') {
            Some(i) if c.ends_with(')') => c[..i].to_string(),
            _ => c.to_string(),
        }
    });
    if !is_blank(classname.as_deref()) {
        return classname;
    }
    suite
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Convert a `time` attribute in seconds to milliseconds, rounded to the
/// microsecond. Missing or non-finite values mean "unknown".
fn parse_duration(time: Option<&str>) -> std::result::Result<Option<f64>, String> {
    let Some(raw) = time.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let seconds: f64 = raw
        .replace(',', "")
        .parse()
        .map_err(|_| format!("invalid time attribute '{raw}'"))?;
    if !seconds.is_finite() {
        return Ok(None);
    }
    Ok(Some((seconds * 1_000_000.0).round() / 1_000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_surefire() {
        let input = include_bytes!("../../tests/fixtures/TEST-com.acme.CalculatorTest.xml");
        let cases = parse(input).unwrap();

        assert_eq!(cases.len(), 5);

        assert_eq!(cases[0].classname, "com.acme.CalculatorTest");
        assert_eq!(cases[0].name, "adds");
        assert_eq!(cases[0].outcome, TestOutcome::Success);
        assert_eq!(cases[0].duration_millis, Some(12.0));

        assert_eq!(cases[1].outcome, TestOutcome::Failure);
        assert_eq!(cases[1].message.as_deref(), Some("expected 1 but was 2"));
        assert!(cases[1]
            .stack_trace
            .as_deref()
            .unwrap()
            .contains("CalculatorTest.subtracts"));

        assert_eq!(cases[2].outcome, TestOutcome::Error);
        assert_eq!(cases[2].duration_millis, Some(0.0));

        assert_eq!(cases[3].classname, "com.acme.CalculatorTest$Nested");
        assert_eq!(cases[3].outcome, TestOutcome::Skipped);
        assert_eq!(cases[3].duration_millis, None);

        assert_eq!(cases[4].outcome, TestOutcome::Success);
        assert_eq!(cases[4].duration_millis, Some(1250.0));
    }

    #[test]
    fn test_classname_falls_back_to_suite_name() {
        let input = br#"<testsuite name="com.acme.Suite"><testcase name="a" classname=""/><testcase name="b"/></testsuite>"#;
        let cases = parse(input).unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.classname == "com.acme.Suite"));
    }

    #[test]
    fn test_parameterized_classname_is_cut() {
        let input = br#"<testsuite name="S"><testcase name="a" classname="com.acme.ParamTest(1, foo)"/></testsuite>"#;
        let cases = parse(input).unwrap();
        assert_eq!(cases[0].classname, "com.acme.ParamTest");
    }

    #[test]
    fn test_nested_suites_in_aggregate_report() {
        let input = br#"<?xml version="1.0"?>
<testsuites>
  <testsuite name="A"><testcase name="one"/></testsuite>
  <testsuite name="B"><testcase name="two" time="0.5"/></testsuite>
</testsuites>"#;
        let cases = parse(input).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].classname, "A");
        assert_eq!(cases[1].classname, "B");
        assert_eq!(cases[1].duration_millis, Some(500.0));
    }

    #[test]
    fn test_empty_suite_yields_nothing() {
        let input = br#"<testsuite name="Empty" tests="0"></testsuite>"#;
        assert!(parse(input).unwrap().is_empty());
        assert!(parse(br#"<testsuite name="Empty"/>"#).unwrap().is_empty());
    }

    #[test]
    fn test_first_outcome_child_wins() {
        let input = br#"<testsuite name="S">
  <testcase name="a"><system-out>noise</system-out><error message="boom"/><failure message="later"/></testcase>
</testsuite>"#;
        let cases = parse(input).unwrap();
        assert_eq!(cases[0].outcome, TestOutcome::Error);
        assert_eq!(cases[0].message.as_deref(), Some("boom"));
        assert_eq!(cases[0].stack_trace, None);
    }

    #[test]
    fn test_time_with_grouping_separator() {
        assert_eq!(parse_duration(Some("1,234.5")).unwrap(), Some(1_234_500.0));
        assert_eq!(parse_duration(Some("  ")).unwrap(), None);
        assert_eq!(parse_duration(None).unwrap(), None);
        assert_eq!(parse_duration(Some("NaN")).unwrap(), None);
        assert!(parse_duration(Some("fast")).is_err());
    }

    #[test]
    fn test_invalid_time_is_an_error() {
        let input = br#"<testsuite name="S"><testcase name="a" time="soon"/></testsuite>"#;
        assert!(matches!(parse(input), Err(TestrsError::Parse { .. })));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let input = br#"<testsuite name="S"><testcase name="a"></testsuite>"#;
        assert!(parse(input).is_err());
    }

    #[test]
    fn test_truncated_document_fails() {
        let input = br#"<testsuite name="S"><testcase name="a"/>"#;
        let mut stream = events(&input[..]);
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_second_root_element_fails() {
        let input = br#"<testsuite name="A"><testcase name="a"/></testsuite><testsuite name="B"><testcase name="b"/></testsuite>"#;
        let mut stream = events(&input[..]);
        assert_eq!(stream.next().unwrap().unwrap().name, "a");
        let err = stream.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("more than one root element"), "Error: {err}");
        assert!(stream.next().is_none());

        assert!(parse(b"<testsuite/><testsuite/>").is_err());
    }

    #[test]
    fn test_not_xml_fails() {
        assert!(parse(b"this is not a test report").is_err());
        assert!(parse(b"").is_err());
    }
}
