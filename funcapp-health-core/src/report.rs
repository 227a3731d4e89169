//! Report document and emitter
//!
//! Output shape (field names are consumed by the reporting layer):
//!
//! ```json
//! { "issues": [ { "title", "severity", "details", "next_step", "observed_at" } ],
//!   "summary": { "counts", "ranges", "checked_at", ... } }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{HealthError, Result};
use crate::issue::{Issue, Severity};
use crate::sample::{MetricSample, SampleSet, TimeWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub issues: Vec<Issue>,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub run_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub counts: IssueCounts,
    pub ranges: BTreeMap<String, MetricRange>,
    pub resource: ResourceSummary,
    pub window: WindowSummary,
    pub thresholds: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub total: usize,
    pub severity_1: usize,
    pub severity_2: usize,
    pub severity_3: usize,
    pub severity_4: usize,
}

impl IssueCounts {
    pub fn tally(issues: &[Issue]) -> Self {
        let mut counts = IssueCounts {
            total: issues.len(),
            ..Default::default()
        };
        for issue in issues {
            match issue.severity {
                Severity::Critical => counts.severity_1 += 1,
                Severity::Major => counts.severity_2 += 1,
                Severity::Warning => counts.severity_3 += 1,
                Severity::Info => counts.severity_4 += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub data_points: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl MetricRange {
    /// `None` for an empty series
    pub fn of(samples: &[MetricSample]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let values: Vec<f64> = samples.iter().map(MetricSample::value_or_zero).collect();
        Some(MetricRange {
            data_points: values.len(),
            min: values.iter().copied().fold(f64::MAX, f64::min),
            max: values.iter().copied().fold(f64::MIN, f64::max),
            average: values.iter().sum::<f64>() / values.len() as f64,
        })
    }
}

/// Ranges for every non-empty series of the set
pub fn ranges(samples: &SampleSet) -> BTreeMap<String, MetricRange> {
    samples
        .iter()
        .filter_map(|(key, series)| MetricRange::of(series).map(|r| (key.clone(), r)))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub name: String,
    pub resource_group: String,
    pub subscription_id: Option<String>,
    pub resource_id: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lookback_minutes: u32,
}

impl WindowSummary {
    pub fn new(window: &TimeWindow, lookback_minutes: u32) -> Self {
        Self {
            start: window.start,
            end: window.end,
            lookback_minutes,
        }
    }
}

/// Outcome of an emit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitted {
    Report,
    /// The rendered report failed validation and the fallback was written
    Fallback,
}

/// Writes the report file
pub struct ReportEmitter {
    path: PathBuf,
}

impl ReportEmitter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn emit(&self, report: &Report) -> Result<Emitted> {
        match serde_json::to_string_pretty(report) {
            Ok(rendered) => self.emit_document(&rendered),
            Err(e) => {
                warn!(error = %e, "report serialization failed, writing fallback");
                self.write_fallback(&e.to_string())?;
                Ok(Emitted::Fallback)
            }
        }
    }

    /// Validate an already rendered document and write it, or write the
    /// fallback when it is not a well-formed report.
    pub fn emit_document(&self, rendered: &str) -> Result<Emitted> {
        match validate_document(rendered) {
            Ok(()) => {
                self.write(rendered)?;
                info!(path = %self.path.display(), "report written");
                Ok(Emitted::Report)
            }
            Err(e) => {
                warn!(error = %e, "report failed validation, writing fallback");
                self.write_fallback(&e.to_string())?;
                Ok(Emitted::Fallback)
            }
        }
    }

    /// Minimal valid report carrying only the failure reason
    pub fn write_fallback(&self, reason: &str) -> Result<()> {
        let doc = fallback_document(reason, Utc::now());
        self.write(&serde_json::to_string_pretty(&doc)?)
    }

    fn write(&self, contents: &str) -> Result<()> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(contents.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

pub fn fallback_document(reason: &str, checked_at: DateTime<Utc>) -> Value {
    json!({
        "issues": [],
        "summary": {
            "checked_at": checked_at,
            "counts": IssueCounts::default(),
            "error": reason,
        }
    })
}

/// Well-formed JSON with an `issues` array and a `summary` object
pub fn validate_document(rendered: &str) -> Result<()> {
    let doc: Value = serde_json::from_str(rendered)?;
    if !doc.get("issues").map(Value::is_array).unwrap_or(false) {
        return Err(HealthError::Parse("report has no `issues` array".into()));
    }
    if !doc.get("summary").map(Value::is_object).unwrap_or(false) {
        return Err(HealthError::Parse("report has no `summary` object".into()));
    }
    Ok(())
}
