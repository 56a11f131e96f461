//! Golden-transcript test harness.
//!
//! Every fixture in the test directory is fed, unchanged, to the compiler on
//! stdin. Whatever the compiler prints is compared with the `_STDOUT` and
//! `_STDERR` blocks embedded in the same fixture.
//!
//! A mismatch or a malformed fixture is recorded and the run moves on.
//! Only problems outside any single test (unreadable directory, unreadable
//! file, a compiler that can't be spawned) stop the run.

mod diff;
mod discover;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::TestsConfig;
use crate::model::{Outcome, TestCase, TestResult};
use crate::runner::{self, Command, RunError};
use crate::transcript::{FixtureError, STDERR_MARKER, STDOUT_MARKER, extract_block};

pub use diff::diff_lines;
pub use discover::discover;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("failed to scan {}: {source}", dir.display())]
    Discover {
        dir: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Run(#[from] RunError),
}

/// Runs the fixtures of one test directory.
#[derive(Debug, Clone)]
pub struct Harness {
    dir: PathBuf,
    extension: String,
}

impl Harness {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    pub fn from_config(tests: &TestsConfig) -> Self {
        Self::new(&tests.dir, &tests.extension)
    }

    /// Runs every fixture against `compiler`, in file-name order.
    pub fn run_all(&self, compiler: &Path) -> Result<Vec<TestResult>, HarnessError> {
        let mut results = Vec::new();
        for path in discover(&self.dir, &self.extension)? {
            let result = run_fixture(compiler, &path)?;
            match &result.outcome {
                Outcome::Passed => info!(test = %result.name, "passed"),
                Outcome::Failed { .. } => warn!(test = %result.name, "failed"),
                Outcome::Malformed { reason } => warn!(test = %result.name, %reason, "malformed"),
            }
            results.push(result);
        }
        Ok(results)
    }
}

/// Loads one fixture and runs it.
pub fn run_fixture(compiler: &Path, path: &Path) -> Result<TestResult, HarnessError> {
    let name = case_name(path);
    let lines = read_lines(path)?;
    let outcome = match parse_case(name.clone(), lines) {
        Ok(case) => run_case(compiler, &case)?,
        Err(e) => Outcome::Malformed {
            reason: e.to_string(),
        },
    };
    Ok(TestResult { name, outcome })
}

/// Builds a test case from a fixture's right-trimmed lines.
pub fn parse_case(name: String, lines: Vec<String>) -> Result<TestCase, FixtureError> {
    let expected_stdout = extract_block(&lines, STDOUT_MARKER)?;
    let expected_stderr = extract_block(&lines, STDERR_MARKER)?;
    Ok(TestCase {
        name,
        lines,
        expected_stdout,
        expected_stderr,
    })
}

/// Feeds the case to the compiler and compares both streams.
pub fn run_case(compiler: &Path, case: &TestCase) -> Result<Outcome, RunError> {
    debug!(test = %case.name, "running");
    let out = runner::run(&Command::argv([compiler]), Some(case.stdin().as_slice()))?;
    let stdout = normalize(&out.stdout);
    let stderr = normalize(&out.stderr);
    Ok(compare(case, &stdout, &stderr))
}

/// Compares normalized actual output with the case's expectations.
pub fn compare(case: &TestCase, stdout: &str, stderr: &str) -> Outcome {
    if case.expected_stdout == stdout && case.expected_stderr == stderr {
        return Outcome::Passed;
    }
    Outcome::Failed {
        stdout: diff_lines(&case.expected_stdout, stdout),
        stderr: diff_lines(&case.expected_stderr, stderr),
    }
}

/// Decodes a captured stream and strips insignificant whitespace: the
/// stream's leading and trailing whitespace, and each line's trailing
/// whitespace.
pub fn normalize(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The fixture path without its extension.
fn case_name(path: &Path) -> String {
    path.with_extension("").display().to_string()
}

fn read_lines(path: &Path) -> Result<Vec<String>, HarnessError> {
    let contents = fs::read_to_string(path).map_err(|source| HarnessError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect())
}
