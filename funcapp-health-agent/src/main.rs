//! funcapp-health - one-shot health check for a single Azure Function App
//!
//! Reads metrics, activity log and configuration through the Azure CLI and
//! writes a runbook issue report:
//! - threshold violations collapsed into one issue per metric
//! - issues deduplicated and graded on a fixed 1-4 severity scale
//! - a valid (possibly empty) JSON report on every exit path
//!
//! Environment (a `.env` file in the working directory is honored):
//!
//! | Variable                         | Default                    |
//! |----------------------------------|----------------------------|
//! | `FUNCTION_APP_NAME`              | required                   |
//! | `AZ_RESOURCE_GROUP`              | required                   |
//! | `AZURE_RESOURCE_SUBSCRIPTION_ID` | CLI default subscription   |
//! | `TIME_PERIOD_MINUTES`            | 30                         |
//! | `METRIC_INTERVAL`                | PT5M                       |
//! | `CPU_THRESHOLD`                  | 80                         |
//! | `MEMORY_PERCENT_THRESHOLD`       | 80                         |
//! | `MEMORY_THRESHOLD_MB`            | 1024                       |
//! | `DURATION_THRESHOLD_MS`          | 5000                       |
//! | `ERROR_RATE_THRESHOLD`           | 10                         |
//! | `HTTP4XX_THRESHOLD`              | 200                        |
//! | `HEALTH_CHECK_THRESHOLD`         | 100                        |
//! | `COST_CHECK_ENABLED`             | true                       |
//! | `COST_BASELINE_DAYS`             | 7                          |
//! | `COST_ANOMALY_MULTIPLIER`        | 2.0                        |
//! | `AZ_COMMAND_TIMEOUT_SECS`        | 60                         |
//! | `AZ_CLI_PATH`                    | az                         |
//! | `OUTPUT_FILE`                    | function_app_health.json   |
//! | `RUST_LOG`                       | funcapp_health=info        |
//!
//! Exit status is 0 whenever the check ran, including a missing app; 1 when
//! configuration or subscription resolution failed (the fallback report is
//! still written).

mod config;
mod execution;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use config::{AgentConfig, OutputConfig};
use execution::AzCli;
use funcapp_health_core::{AzureClient, Emitted, HealthCheck, ReportEmitter, RunStatus};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// The check ran; the report may still hold issues
const EXIT_OK: u8 = 0;
/// Configuration or subscription resolution failed; a fallback report was written
const EXIT_FAILED: u8 = 1;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("Health check aborted: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("funcapp_health=info,funcapp_health_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<u8> {
    let config = match AgentConfig::load().await {
        Ok(config) => config,
        Err(e) => return config_failure(&fallback_path(), &e),
    };

    let client = AzCli::new(
        config.azure.program.clone(),
        config.check.subscription_id.clone(),
        Duration::from_secs(config.azure.timeout_secs),
    )
    .with_leading_args(config.azure.leading_args.clone());

    run_with(&config, &client, Utc::now()).await
}

/// The configuration could not be loaded, so its output path is unknown
fn config_failure(path: &Path, err: &anyhow::Error) -> Result<u8> {
    error!("Failed to load configuration: {:#}", err);
    write_fallback(path, &format!("configuration error: {err:#}"))?;
    Ok(EXIT_FAILED)
}

/// One pass with a loaded configuration: validate, check, emit
async fn run_with<C: AzureClient + ?Sized>(config: &AgentConfig, client: &C, now: DateTime<Utc>) -> Result<u8> {
    let emitter = ReportEmitter::new(&config.output.file);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {:#}", e);
        write_fallback(emitter.path(), &format!("configuration error: {e:#}"))?;
        return Ok(EXIT_FAILED);
    }

    let check = HealthCheck::new(client, config.check.clone());
    let outcome = match check.run(now).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Health check could not start: {}", e);
            write_fallback(emitter.path(), &e.to_string())?;
            return Ok(EXIT_FAILED);
        }
    };

    let counts = &outcome.report.summary.counts;
    info!(
        total = counts.total,
        severity_1 = counts.severity_1,
        severity_2 = counts.severity_2,
        severity_3 = counts.severity_3,
        severity_4 = counts.severity_4,
        "Issues found"
    );
    match outcome.status {
        RunStatus::Completed => {}
        RunStatus::AppStopped => warn!("Function App is not running; metric checks were skipped"),
        RunStatus::ResourceNotFound => warn!("Function App was not found; report holds a single critical issue"),
    }

    let emitted = emitter
        .emit(&outcome.report)
        .with_context(|| format!("Failed to write {}", emitter.path().display()))?;
    if emitted == Emitted::Fallback {
        warn!("Report was replaced by the fallback document");
    }

    Ok(EXIT_OK)
}

/// Output path when the configuration itself could not be loaded
fn fallback_path() -> PathBuf {
    std::env::var("OUTPUT_FILE")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| OutputConfig::default().file)
}

fn write_fallback(path: &Path, reason: &str) -> Result<()> {
    ReportEmitter::new(path)
        .write_fallback(reason)
        .with_context(|| format!("Failed to write fallback report to {}", path.display()))?;
    info!(path = %path.display(), "Fallback report written");
    Ok(())
}
