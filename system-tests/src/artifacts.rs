// system-tests/src/artifacts.rs
// ============================================================================
// Module: Test Artifacts
// Description: Artifact helpers for system-tests.
// Purpose: Create per-test run roots and write deterministic summaries.
// Dependencies: serde, serde_jcs
// ============================================================================

//! ## Overview
//! Each system test owns a run root holding `summary.json` (canonical JSON),
//! `summary.md`, and any extra artifacts such as the HTTP transcript. The
//! summary carries the scenario result: request id, passed checks, and the
//! failing check. The reporter writes a summary even when the test panics.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::config::SystemTestConfig;
use crate::scenario::ScenarioError;
use crate::scenario::ScenarioOutcome;

/// Scenario result recorded before the summary is written.
#[derive(Debug, Clone, Default, Serialize)]
struct ScenarioReport {
    /// Scenario label, `file/name`.
    scenario: Option<String>,
    /// Identifier assigned by the service.
    request_id: Option<u64>,
    /// Checks that passed, in execution order.
    checks_passed: Vec<String>,
    /// Check that rejected the service output.
    failed_check: Option<String>,
}

/// Summary written at the end of every test.
#[derive(Debug, Serialize)]
struct TestSummary {
    /// Test name.
    test_name: String,
    /// Final status label.
    status: String,
    /// Start time, Unix milliseconds.
    started_at_ms: u128,
    /// End time, Unix milliseconds.
    ended_at_ms: u128,
    /// Wall-clock duration.
    duration_ms: u128,
    /// Free-form notes.
    notes: Vec<String>,
    /// Artifact file names written by the test.
    artifacts: Vec<String>,
    /// Scenario result.
    #[serde(flatten)]
    report: ScenarioReport,
}

/// Current Unix time in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Default run root for a test under `target/`.
fn default_run_root(test_name: &str) -> PathBuf {
    let stamp = now_millis();
    PathBuf::from("target/system-tests").join(format!("run_{stamp}")).join(test_name)
}

/// Artifact manager for a single system-test.
#[derive(Debug, Clone)]
pub struct TestArtifacts {
    /// Directory receiving the artifacts.
    root: PathBuf,
}

impl TestArtifacts {
    /// Creates the artifact root for a test.
    ///
    /// A configured run root gets one subdirectory per test.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn new(test_name: &str, config: &SystemTestConfig) -> io::Result<Self> {
        let root = config
            .run_root
            .as_ref()
            .map_or_else(|| default_run_root(test_name), |root| root.join(test_name));
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
        })
    }

    /// Returns the root directory for the test artifacts.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a JSON artifact using canonical JCS serialization.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        let bytes = serde_jcs::to_vec(value).map_err(|err| io::Error::other(err.to_string()))?;
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Writes a text artifact with UTF-8 encoding.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub fn write_text(&self, name: &str, value: &str) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        fs::write(&path, value.as_bytes())?;
        Ok(path)
    }
}

/// Helper that writes summaries even when a test panics.
pub struct TestReporter {
    /// Artifact manager.
    artifacts: TestArtifacts,
    /// Test name.
    test_name: String,
    /// Start time, Unix milliseconds.
    started_at_ms: u128,
    /// Scenario result for the summary.
    report: ScenarioReport,
    /// Set once a summary has been written.
    finalized: bool,
}

impl TestReporter {
    /// Creates a reporter for the named test.
    ///
    /// # Errors
    ///
    /// Returns an error when the artifact root cannot be created.
    pub fn new(test_name: &str, config: &SystemTestConfig) -> io::Result<Self> {
        Ok(Self {
            artifacts: TestArtifacts::new(test_name, config)?,
            test_name: test_name.to_string(),
            started_at_ms: now_millis(),
            report: ScenarioReport::default(),
            finalized: false,
        })
    }

    /// Records a passing scenario for the summary.
    pub fn record_outcome(&mut self, outcome: &ScenarioOutcome) {
        self.report.scenario = Some(outcome.scenario.clone());
        self.report.request_id = Some(outcome.request_id);
        self.report.checks_passed = outcome.checks_passed.iter().map(ToString::to_string).collect();
        self.report.failed_check = None;
    }

    /// Records a failed scenario for the summary.
    pub fn record_failure(&mut self, err: &ScenarioError) {
        self.report.failed_check = match err {
            ScenarioError::Check(failure) => Some(failure.check.to_string()),
            ScenarioError::Config(_) => Some("config".to_string()),
            ScenarioError::Fixture(_) => Some("fixture".to_string()),
            ScenarioError::Client(_) => Some("service call".to_string()),
        };
    }

    /// Returns the artifact manager.
    #[must_use]
    pub const fn artifacts(&self) -> &TestArtifacts {
        &self.artifacts
    }

    /// Writes the final summary for the test.
    ///
    /// # Errors
    ///
    /// Returns an error when a summary file cannot be written.
    pub fn finish(
        &mut self,
        status: &str,
        notes: Vec<String>,
        artifacts: Vec<String>,
    ) -> io::Result<()> {
        let ended_at_ms = now_millis();
        let summary = TestSummary {
            test_name: self.test_name.clone(),
            status: status.to_string(),
            started_at_ms: self.started_at_ms,
            ended_at_ms,
            duration_ms: ended_at_ms.saturating_sub(self.started_at_ms),
            notes,
            artifacts,
            report: self.report.clone(),
        };
        self.artifacts.write_json("summary.json", &summary)?;
        self.artifacts.write_text("summary.md", &summary_markdown(&summary))?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for TestReporter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let status = if std::thread::panicking() { "panic" } else { "unknown" };
        let _ = self.finish(
            status,
            vec!["test terminated without explicit summary".to_string()],
            Vec::new(),
        );
    }
}

/// Renders the Markdown summary.
fn summary_markdown(summary: &TestSummary) -> String {
    let mut out = String::new();
    out.push_str("# System-Test Summary\n\n## Status\n\n");
    let _ = writeln!(out, "- Test: {}", summary.test_name);
    let _ = writeln!(out, "- Status: {}", summary.status);
    let _ = writeln!(out, "- Duration (ms): {}", summary.duration_ms);
    let report = &summary.report;
    if let Some(scenario) = &report.scenario {
        let _ = writeln!(out, "- Scenario: {scenario}");
    }
    if let Some(request_id) = report.request_id {
        let _ = writeln!(out, "- Request: {request_id}");
    }
    if let Some(check) = &report.failed_check {
        let _ = writeln!(out, "- Failed check: {check}");
    }
    push_list(&mut out, "Checks Passed", &report.checks_passed);
    push_list(&mut out, "Notes", &summary.notes);
    push_list(&mut out, "Artifacts", &summary.artifacts);
    out
}

/// Appends a Markdown section with one bullet per item.
fn push_list(out: &mut String, title: &str, items: &[String]) {
    let _ = write!(out, "\n## {title}\n\n");
    if items.is_empty() {
        out.push_str("- None\n");
    }
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}
