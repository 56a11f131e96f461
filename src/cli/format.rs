//! Output formatting for test reports.

use std::fmt::Write;

use crate::model::{DiffLine, Outcome, TestResult};

/// Format one test result: its name, and for anything but a pass, why.
pub(super) fn format_result(result: &TestResult) -> String {
    let mut out = format!("{}\n", result.name);
    match &result.outcome {
        Outcome::Passed => {}
        Outcome::Failed { stdout, stderr } => {
            out.push_str("TEST FAILED\n");
            out.push_str("STDOUT:\n");
            out.push_str(&format_diff(stdout));
            out.push_str("STDERR:\n");
            out.push_str(&format_diff(stderr));
        }
        Outcome::Malformed { reason } => {
            let _ = writeln!(out, "MALFORMED FIXTURE: {reason}");
        }
    }
    out
}

/// One line per diff entry, prefixed with `  `, `- ` or `+ `.
fn format_diff(lines: &[DiffLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{} {}", line.tag.sign(), line.text);
    }
    out
}

pub(super) fn format_summary(results: &[TestResult]) -> String {
    let passed = results.iter().filter(|r| r.passed()).count();
    let malformed = results
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::Malformed { .. }))
        .count();
    let failed = results.len() - passed - malformed;
    format!("{passed} passed, {failed} failed, {malformed} malformed")
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::DiffTag;

    fn line(tag: DiffTag, text: &str) -> DiffLine {
        DiffLine {
            tag,
            expected_line: None,
            actual_line: None,
            text: text.into(),
        }
    }

    fn result(name: &str, outcome: Outcome) -> TestResult {
        TestResult {
            name: name.into(),
            outcome,
        }
    }

    #[test]
    fn passing_result_is_just_the_name() {
        assert_eq!(format_result(&result("tests/add", Outcome::Passed)), "tests/add\n");
    }

    #[test]
    fn failing_result_shows_both_diffs() {
        let outcome = Outcome::Failed {
            stdout: vec![
                line(DiffTag::Equal, "1"),
                line(DiffTag::Delete, "2"),
                line(DiffTag::Insert, "3"),
            ],
            stderr: vec![line(DiffTag::Equal, "")],
        };
        assert_eq!(
            format_result(&result("tests/add", outcome)),
            "tests/add\nTEST FAILED\nSTDOUT:\n  1\n- 2\n+ 3\nSTDERR:\n  \n"
        );
    }

    #[test]
    fn malformed_result_names_the_problem() {
        let outcome = Outcome::Malformed {
            reason: "missing `_STDOUT` marker".into(),
        };
        assert_eq!(
            format_result(&result("tests/bad", outcome)),
            "tests/bad\nMALFORMED FIXTURE: missing `_STDOUT` marker\n"
        );
    }

    #[test]
    fn summary_counts_each_outcome() {
        let results = [
            result("a", Outcome::Passed),
            result("b", Outcome::Passed),
            result(
                "c",
                Outcome::Failed {
                    stdout: vec![],
                    stderr: vec![],
                },
            ),
            result(
                "d",
                Outcome::Malformed {
                    reason: String::new(),
                },
            ),
        ];
        assert_eq!(format_summary(&results), "2 passed, 1 failed, 1 malformed");
    }
}
