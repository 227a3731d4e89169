/*!
Test harness for the health pipeline

Runs one pass against a [`MockAzureClient`] at a fixed clock, emits the
report into a private temp directory and reads it back.
*/

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use funcapp_health_core::{CheckSettings, Condition, Emitted, HealthCheck, Issue, Report, ReportEmitter, RunOutcome};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::az_stub::MockAzureClient;
use crate::fixtures;

pub struct TestHarness {
    pub client: MockAzureClient,
    pub settings: CheckSettings,
    pub now: DateTime<Utc>,
    output_dir: TempDir,
}

impl TestHarness {
    pub fn new(client: MockAzureClient) -> Result<Self> {
        env_logger::try_init().ok();

        Ok(Self {
            client,
            settings: fixtures::settings(),
            now: fixtures::reference_time(),
            output_dir: TempDir::new().context("Failed to create report directory")?,
        })
    }

    pub fn with_settings(mut self, configure: impl FnOnce(&mut CheckSettings)) -> Self {
        configure(&mut self.settings);
        self
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.path().join("function_app_health.json")
    }

    /// One pass, without touching the filesystem
    pub async fn run(&self) -> funcapp_health_core::Result<RunOutcome> {
        log::info!(
            "Running health check for '{}' at {}",
            self.settings.function_app_name,
            self.now
        );
        HealthCheck::new(&self.client, self.settings.clone()).run(self.now).await
    }

    /// One pass, emitted to disk; returns the outcome and the parsed file
    pub async fn run_and_emit(&self) -> Result<(RunOutcome, Value)> {
        let outcome = self.run().await?;
        let emitted = ReportEmitter::new(self.report_path()).emit(&outcome.report)?;
        anyhow::ensure!(emitted == Emitted::Report, "Report was replaced by the fallback");

        let written = self.read_report()?;
        log::info!("Report written with {} issue(s)", outcome.report.issues.len());
        Ok((outcome, written))
    }

    pub fn read_report(&self) -> Result<Value> {
        let content = std::fs::read_to_string(self.report_path())
            .with_context(|| format!("Failed to read {}", self.report_path().display()))?;
        serde_json::from_str(&content).context("Report is not valid JSON")
    }
}

/// Issues whose title carries the phrase of `condition`
pub fn issues_for<'a>(report: &'a Report, condition: Condition) -> Vec<&'a Issue> {
    report
        .issues
        .iter()
        .filter(|issue| issue.title.ends_with(condition.phrase()))
        .collect()
}

/// Exactly one issue for `condition`, or a descriptive error
pub fn single_issue<'a>(report: &'a Report, condition: Condition) -> Result<&'a Issue> {
    let found = issues_for(report, condition);
    match found.as_slice() {
        [issue] => Ok(*issue),
        _ => anyhow::bail!(
            "Expected one '{}' issue, found {} (titles: {:?})",
            condition.phrase(),
            found.len(),
            report.issues.iter().map(|i| i.title.as_str()).collect::<Vec<_>>()
        ),
    }
}
