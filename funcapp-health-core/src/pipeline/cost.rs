//! Execution-unit cost anomaly
//!
//! Plain sum ratio: last day's execution units against the daily average of
//! the preceding baseline days. No variance or seasonality adjustment.

use chrono::{DateTime, Utc};

use crate::aggregator::{IssueAggregator, IssueTarget};
use crate::client::AzureClient;
use crate::issue::Condition;
use crate::rule::format_number;
use crate::sample::{sum, Aggregation, MetricSample, TimeWindow};
use crate::sampler::MetricSampler;
use crate::settings::CostSettings;

use super::metrics::EXECUTION_UNITS;

/// Execution units are MB-milliseconds; 1 GB-s = 1,024,000 units
pub const UNITS_PER_GB_SECOND: f64 = 1_024_000.0;
/// Consumption plan price per GB-s in USD
pub const PRICE_PER_GB_SECOND: f64 = 0.000016;

const RECENT_MINUTES: u32 = 24 * 60;
const COST_INTERVAL: &str = "PT1H";

#[derive(Debug, Clone, PartialEq)]
pub struct CostComparison {
    pub recent_units: f64,
    pub baseline_units: f64,
    pub baseline_days: u32,
}

impl CostComparison {
    pub fn new(recent: &[MetricSample], baseline: &[MetricSample], baseline_days: u32) -> Self {
        Self {
            recent_units: sum(recent),
            baseline_units: sum(baseline),
            baseline_days,
        }
    }

    pub fn baseline_daily_average(&self) -> f64 {
        if self.baseline_days == 0 {
            return 0.0;
        }
        self.baseline_units / f64::from(self.baseline_days)
    }

    /// `None` without a baseline to compare against
    pub fn ratio(&self) -> Option<f64> {
        let average = self.baseline_daily_average();
        (average > 0.0).then(|| self.recent_units / average)
    }

    pub fn is_anomalous(&self, multiplier: f64) -> bool {
        let average = self.baseline_daily_average();
        average > 0.0 && self.recent_units > average * multiplier
    }
}

pub fn estimated_cost(units: f64) -> f64 {
    units / UNITS_PER_GB_SECOND * PRICE_PER_GB_SECOND
}

pub async fn check<C: AzureClient + ?Sized>(
    sampler: &MetricSampler<'_, C>,
    app_id: &str,
    now: DateTime<Utc>,
    settings: &CostSettings,
    target: &IssueTarget,
    aggregator: &mut IssueAggregator,
) {
    let recent_window = TimeWindow::last_minutes(now, RECENT_MINUTES);
    let baseline_window = recent_window.preceding_days(settings.baseline_days);

    let recent = sampler
        .sample_every(app_id, EXECUTION_UNITS, Aggregation::Total, recent_window, COST_INTERVAL)
        .await;
    let baseline = sampler
        .sample_every(app_id, EXECUTION_UNITS, Aggregation::Total, baseline_window, COST_INTERVAL)
        .await;

    let comparison = CostComparison::new(&recent, &baseline, settings.baseline_days);
    if !comparison.is_anomalous(settings.anomaly_multiplier) {
        return;
    }

    aggregator.raise(
        target,
        Condition::ExecutionCostAnomaly,
        EXECUTION_UNITS,
        details(&comparison, settings.anomaly_multiplier),
    );
}

fn details(comparison: &CostComparison, multiplier: f64) -> String {
    format!(
        "Execution units over the last 24 hours: {} (~${:.4}) vs a daily average of {} over the previous {} day(s); \
         {}x the baseline exceeds the {}x anomaly multiplier.",
        format_number(comparison.recent_units),
        estimated_cost(comparison.recent_units),
        format_number(comparison.baseline_daily_average()),
        comparison.baseline_days,
        format_number(comparison.ratio().unwrap_or_default()),
        format_number(multiplier),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(values: &[f64]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(start + Duration::hours(i as i64), Some(*v)))
            .collect()
    }

    #[test]
    fn test_anomaly_ratio() {
        let comparison = CostComparison::new(&series(&[3000.0, 2000.0]), &series(&[7000.0, 7000.0]), 7);
        assert_eq!(comparison.baseline_daily_average(), 2000.0);
        assert_eq!(comparison.ratio(), Some(2.5));
        assert!(comparison.is_anomalous(2.0));
        assert!(!comparison.is_anomalous(3.0));
    }

    #[test]
    fn test_exactly_at_multiplier_is_not_anomalous() {
        let comparison = CostComparison::new(&series(&[4000.0]), &series(&[14000.0]), 7);
        assert!(!comparison.is_anomalous(2.0));
    }

    #[test]
    fn test_no_baseline() {
        let comparison = CostComparison::new(&series(&[1_000_000.0]), &[], 7);
        assert_eq!(comparison.ratio(), None);
        assert!(!comparison.is_anomalous(2.0));

        let zero_days = CostComparison::new(&series(&[1.0]), &series(&[1.0]), 0);
        assert!(!zero_days.is_anomalous(2.0));
    }

    #[test]
    fn test_estimated_cost() {
        assert!((estimated_cost(1_024_000.0) - 0.000016).abs() < 1e-12);
    }

    #[test]
    fn test_details() {
        let comparison = CostComparison::new(&series(&[5000.0]), &series(&[14000.0]), 7);
        let text = details(&comparison, 2.0);
        assert!(text.starts_with("Execution units over the last 24 hours: 5000"));
        assert!(text.contains("daily average of 2000 over the previous 7 day(s)"));
        assert!(text.contains("2.50x the baseline exceeds the 2x anomaly multiplier"));
    }
}
