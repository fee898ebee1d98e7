//! Batch reports for logging and UI feedback.

use std::fmt;

use iptv_extract::ExtractionWarning;
use iptv_probe::ValidationResult;
use iptv_registry::{Endpoint, Transition};

/// Outcome for one pair in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub endpoint: Endpoint,
    pub result: ValidationResult,
    /// State change applied to the registry entry, if the pair is registered
    pub transition: Option<Transition>,
}

impl ReportLine {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.result.is_ok() { "OK" } else { "FAILED" };
        write!(f, "[{verdict}] {} - {}", self.endpoint, self.result)?;
        match self.transition {
            Some(Transition::Deactivated) => write!(f, " (deactivated)"),
            Some(Transition::Reactivated) => write!(f, " (reactivated)"),
            Some(Transition::Unchanged) | None => Ok(()),
        }
    }
}

/// Result of [`import_from_text`](crate::ConnectivitySupervisor::import_from_text).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// One line per probed pair, in completion order
    pub lines: Vec<ReportLine>,
    /// Problems noticed while extracting, none of them fatal
    pub warnings: Vec<ExtractionWarning>,
}

impl ImportReport {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.lines.iter().filter(|line| line.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.lines.len() - self.succeeded()
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for warning in &self.warnings {
            writeln!(f, "[WARN] {warning}")?;
        }
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        write!(
            f,
            "{} endpoint(s) checked: {} reachable, {} unreachable",
            self.lines.len(),
            self.succeeded(),
            self.failed()
        )
    }
}

/// Result of one full [`check_all`](crate::ConnectivitySupervisor::check_all) pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub probed: usize,
    pub reachable: usize,
    pub unreachable: usize,
    pub deactivated: Vec<Endpoint>,
    pub reactivated: Vec<Endpoint>,
}

impl CheckSummary {
    pub(crate) fn record(&mut self, line: &ReportLine) {
        self.probed += 1;
        if line.is_ok() {
            self.reachable += 1;
        } else {
            self.unreachable += 1;
        }
        match line.transition {
            Some(Transition::Deactivated) => self.deactivated.push(line.endpoint.clone()),
            Some(Transition::Reactivated) => self.reactivated.push(line.endpoint.clone()),
            Some(Transition::Unchanged) | None => {}
        }
    }
}

impl fmt::Display for CheckSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} probed, {} reachable, {} unreachable, {} deactivated, {} reactivated",
            self.probed,
            self.reachable,
            self.unreachable,
            self.deactivated.len(),
            self.reactivated.len()
        )
    }
}
