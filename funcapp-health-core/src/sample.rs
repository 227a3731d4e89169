//! Metric samples and the Azure Monitor response format
//!
//! `az monitor metrics list` answers with:
//!
//! ```json
//! { "value": [ { "name": { "value": "Http5xx" },
//!                "timeseries": [ { "data": [ { "timeStamp": "...", "total": 3.0 } ] } ] } ] }
//! ```
//!
//! Each data point carries only the aggregation that was requested, and points
//! without activity carry no value at all.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HealthError, Result};

/// One observation of a metric over an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }

    /// Missing readings mean "no activity" for every metric we poll.
    pub fn value_or_zero(&self) -> f64 {
        self.value.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Sampled series keyed by metric key, handed from the sampling stage to
/// evaluation and to the report summary.
pub type SampleSet = BTreeMap<String, Vec<MetricSample>>;

/// Azure Monitor aggregation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    Total,
    Average,
    Maximum,
    Minimum,
    Count,
}

impl Aggregation {
    /// Name expected by `--aggregation`
    pub fn as_cli_arg(&self) -> &'static str {
        match self {
            Aggregation::Total => "Total",
            Aggregation::Average => "Average",
            Aggregation::Maximum => "Maximum",
            Aggregation::Minimum => "Minimum",
            Aggregation::Count => "Count",
        }
    }

    /// Field name on each data point of the response
    pub fn response_field(&self) -> &'static str {
        match self {
            Aggregation::Total => "total",
            Aggregation::Average => "average",
            Aggregation::Maximum => "maximum",
            Aggregation::Minimum => "minimum",
            Aggregation::Count => "count",
        }
    }
}

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window ending at `now` and reaching back `minutes`
    pub fn last_minutes(now: DateTime<Utc>, minutes: u32) -> Self {
        Self::new(now - Duration::minutes(i64::from(minutes)), now)
    }

    /// Window of `days` days ending where `self` starts
    pub fn preceding_days(&self, days: u32) -> Self {
        Self::new(self.start - Duration::days(i64::from(days)), self.start)
    }

    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Parse an `az monitor metrics list` document into an ordered sample list.
///
/// Every time series of every metric in the response is flattened; an empty
/// or missing `value` array is valid and yields no samples.
pub fn parse_metrics_response(doc: &Value, aggregation: Aggregation) -> Result<Vec<MetricSample>> {
    let metrics = match doc.get("value") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(metrics)) => metrics,
        Some(other) => {
            return Err(HealthError::Parse(format!(
                "metrics response `value` is not an array: {other}"
            )))
        }
    };

    let field = aggregation.response_field();
    let mut samples = Vec::new();

    for metric in metrics {
        let series = metric
            .get("timeseries")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for ts in series {
            let points = ts
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            for point in points {
                let Some(stamp) = point.get("timeStamp").and_then(Value::as_str) else {
                    continue;
                };
                let timestamp = DateTime::parse_from_rfc3339(stamp)
                    .map_err(|e| HealthError::Parse(format!("bad timeStamp `{stamp}`: {e}")))?
                    .with_timezone(&Utc);
                let value = point.get(field).and_then(Value::as_f64);
                samples.push(MetricSample::new(timestamp, value));
            }
        }
    }

    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

/// Multiply every present value by `factor` (unit conversion)
pub fn scale_samples(samples: Vec<MetricSample>, factor: f64) -> Vec<MetricSample> {
    samples
        .into_iter()
        .map(|s| MetricSample {
            value: s.value.map(|v| v * factor),
            ..s
        })
        .collect()
}

/// Per-timestamp `100 * numerator / denominator`.
///
/// Timestamps without a denominator sample, or with a zero denominator,
/// yield 0 (no requests means no failed requests).
pub fn ratio_percent(numerator: &[MetricSample], denominator: &[MetricSample]) -> Vec<MetricSample> {
    let totals: BTreeMap<DateTime<Utc>, f64> = denominator
        .iter()
        .map(|s| (s.timestamp, s.value_or_zero()))
        .collect();

    numerator
        .iter()
        .map(|s| {
            let total = totals.get(&s.timestamp).copied().unwrap_or(0.0);
            let rate = if total > 0.0 {
                s.value_or_zero() / total * 100.0
            } else {
                0.0
            };
            MetricSample::new(s.timestamp, Some(rate))
        })
        .collect()
}

/// Sum of all samples with nulls counted as zero
pub fn sum(samples: &[MetricSample]) -> f64 {
    samples.iter().map(MetricSample::value_or_zero).sum()
}
