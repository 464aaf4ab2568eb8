//! End-of-run report and the sinks it is written to.

use crate::error::{HarnessError, Result};
use crate::types::{Account, Artifact};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// File name of the rendered text report inside a run directory.
pub const REPORT_TEXT_FILE: &str = "report.txt";

/// File name of the JSON report inside a run directory.
pub const REPORT_JSON_FILE: &str = "report.json";

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Completed without error.
    Passed,
    /// Returned or surfaced an error.
    Failed,
    /// Not run because an earlier step failed.
    Skipped,
}

impl StepStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Step name.
    pub step: String,
    /// Correlation id the step ran under; nil for skipped steps.
    pub correlation_id: Uuid,
    /// Outcome.
    pub status: StepStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Ledger attempts made during the step.
    pub attempts: u32,
    /// Error text for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    /// Entry for a step that never ran.
    pub fn skipped(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            correlation_id: Uuid::nil(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            attempts: 0,
            error: None,
        }
    }
}

/// Named artifact captured when the report is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedArtifact {
    /// Artifact name.
    pub name: String,
    /// Artifact value.
    pub artifact: Artifact,
}

/// Step outcomes plus a snapshot of what the run left behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Network the session ran against.
    pub network: String,
    /// Chain id reported by the network, if it was fetched.
    pub chain_id: Option<String>,
    /// Steps in the order they were recorded.
    pub entries: Vec<ReportEntry>,
    /// Accounts as last synced.
    pub accounts: Vec<Account>,
    /// Artifacts ordered by kind, then name.
    pub artifacts: Vec<NamedArtifact>,
}

impl SessionReport {
    /// Empty report for `network`.
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            ..Self::default()
        }
    }

    /// Appends one step outcome.
    pub fn append(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Number of entries with `status`.
    pub fn count(&self, status: StepStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Human-readable report. Same report, same text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "Session report: {}", self.network);
        if let Some(chain_id) = &self.chain_id {
            let _ = write!(out, " (chain {})", chain_id);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Steps: {} passed, {} failed, {} skipped",
            self.count(StepStatus::Passed),
            self.count(StepStatus::Failed),
            self.count(StepStatus::Skipped)
        );

        if !self.entries.is_empty() {
            let _ = writeln!(out);
            let width = self
                .entries
                .iter()
                .map(|e| e.step.chars().count())
                .max()
                .unwrap_or(0);
            for entry in &self.entries {
                let _ = write!(
                    out,
                    "  {}  {:<width$}",
                    entry.status.label(),
                    entry.step,
                    width = width
                );
                if entry.status != StepStatus::Skipped {
                    let _ = write!(
                        out,
                        "  {:>7}ms  {} attempt(s)  {}",
                        entry.duration_ms, entry.attempts, entry.correlation_id
                    );
                }
                let _ = writeln!(out);
                if let Some(error) = &entry.error {
                    let _ = writeln!(out, "        error: {}", error);
                }
            }
        }

        if !self.accounts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Accounts:");
            for account in &self.accounts {
                if account.synced {
                    let _ = writeln!(
                        out,
                        "  {} {} nonce={} balance={}",
                        account.role,
                        account.identity.address,
                        account.state.nonce,
                        account.state.balance
                    );
                } else {
                    let _ = writeln!(
                        out,
                        "  {} {} (not synced)",
                        account.role, account.identity.address
                    );
                }
            }
        }

        if !self.artifacts.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Artifacts:");
            for named in &self.artifacts {
                let _ = writeln!(
                    out,
                    "  {} {}: {}",
                    named.artifact.kind(),
                    named.name,
                    named.artifact
                );
            }
        }

        out
    }
}

/// Destination of the final report.
pub trait ReportSink: Send {
    /// Writes the report.
    ///
    /// # Errors
    ///
    /// Returns `ReportUnwritable` if the destination cannot be written.
    fn write(&mut self, report: &SessionReport) -> Result<()>;
}

/// Writes `report.txt` and `report.json` into a directory.
#[derive(Debug, Clone)]
pub struct FileReportSink {
    dir: PathBuf,
}

impl FileReportSink {
    /// Sink writing into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the text report.
    pub fn text_path(&self) -> PathBuf {
        self.dir.join(REPORT_TEXT_FILE)
    }

    /// Path of the JSON report.
    pub fn json_path(&self) -> PathBuf {
        self.dir.join(REPORT_JSON_FILE)
    }
}

fn unwritable(path: &Path) -> impl FnOnce(std::io::Error) -> HarnessError + '_ {
    move |e| HarnessError::ReportUnwritable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

impl ReportSink for FileReportSink {
    fn write(&mut self, report: &SessionReport) -> Result<()> {
        let text_path = self.text_path();
        fs::write(&text_path, report.render()).map_err(unwritable(&text_path))?;

        let json_path = self.json_path();
        let json = serde_json::to_string_pretty(report).map_err(|e| {
            HarnessError::ReportUnwritable {
                path: json_path.clone(),
                reason: e.to_string(),
            }
        })?;
        fs::write(&json_path, json).map_err(unwritable(&json_path))?;
        Ok(())
    }
}

/// Keeps written reports in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryReportSink {
    reports: Arc<Mutex<Vec<SessionReport>>>,
}

impl MemoryReportSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report written so far.
    pub fn reports(&self) -> Vec<SessionReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The most recent report.
    pub fn last(&self) -> Option<SessionReport> {
        self.reports().pop()
    }
}

impl ReportSink for MemoryReportSink {
    fn write(&mut self, report: &SessionReport) -> Result<()> {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report.clone()),
            Err(poisoned) => poisoned.into_inner().push(report.clone()),
        }
        Ok(())
    }
}
