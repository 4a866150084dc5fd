//! Human-readable pass/fail report.

use crate::engine::{Response, RunResult, Verdict};
use chrono::{DateTime, Local};
use std::fmt;

/// Aggregate counts over a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub mismatched: usize,
    pub transport_errors: usize,
}

impl Summary {
    pub fn from_results(results: &[RunResult]) -> Self {
        results.iter().fold(Summary::default(), |mut summary, result| {
            summary.total += 1;
            match result.verdict() {
                Verdict::Passed => summary.passed += 1,
                Verdict::Mismatch => summary.mismatched += 1,
                Verdict::TransportFailed => summary.transport_errors += 1,
            }
            summary
        })
    }

    pub fn failed(&self) -> usize {
        self.mismatched + self.transport_errors
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Report for one run against one target
pub struct Report<'a> {
    target: &'a str,
    started_at: DateTime<Local>,
    results: &'a [RunResult],
}

impl<'a> Report<'a> {
    pub fn new(target: &'a str, started_at: DateTime<Local>, results: &'a [RunResult]) -> Self {
        Self {
            target,
            started_at,
            results,
        }
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(self.results)
    }

    /// Render the full report
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "GETFILE conformance run against {} at {}\n",
            self.target,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;

        for result in self.results {
            writeln!(f, "{}", CaseReport(result))?;
        }

        let summary = self.summary();
        writeln!(
            f,
            "Summary: {} passed, {} failed ({} mismatched, {} transport errors), {} total",
            summary.passed,
            summary.failed(),
            summary.mismatched,
            summary.transport_errors,
            summary.total
        )
    }
}

/// One case rendered as a block of lines
struct CaseReport<'a>(&'a RunResult);

impl fmt::Display for CaseReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.0;
        let case = &result.case;

        let verdict = match &result.response {
            Response::Transport(e) if e.is_timeout() => "FAILED (timeout)",
            Response::Transport(_) => "FAILED (transport)",
            Response::Received(_) if result.passed() => "PASSED",
            Response::Received(_) => "FAILED",
        };

        writeln!(f, "Running test: {}", case.description())?;
        writeln!(f, "Request Sent: {}", escape(case.request()))?;
        writeln!(f, "Expected: {}", case.expected_prefix())?;
        match &result.response {
            Response::Received(body) => writeln!(f, "Received: {}", body.trim_end())?,
            Response::Transport(e) => writeln!(f, "Received: {}", e)?,
        }
        writeln!(f, "Test {}", verdict)
    }
}

/// Render bytes with CR/LF and non-printables escaped
fn escape(bytes: &[u8]) -> String {
    bytes.escape_ascii().to_string()
}
