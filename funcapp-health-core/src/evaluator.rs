//! Threshold evaluation
//!
//! All violating points of one series collapse into a single [`Violation`];
//! the aggregator turns that into at most one issue.

use serde::Serialize;

use crate::rule::ThresholdRule;
use crate::sample::MetricSample;

/// Summary of every violating sample for one rule over one series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub metric_name: String,
    /// Number of violating samples, always >= 1
    pub count: usize,
    /// Number of samples evaluated, excluding skipped missing readings
    pub data_points: usize,
    /// Largest violating value
    pub max: f64,
    /// Smallest violating value
    pub min: f64,
    /// Mean of all samples, violating or not
    pub average: f64,
    /// Sum of violating values
    pub violating_total: f64,
}

/// Evaluate `samples` against `rule`. `None` means no violation.
///
/// Missing readings count as zero unless the rule sets `skip_missing`, in
/// which case they are left out of every figure.
pub fn evaluate(samples: &[MetricSample], rule: &ThresholdRule) -> Option<Violation> {
    let values: Vec<f64> = samples
        .iter()
        .filter_map(|sample| match sample.value {
            Some(v) if v.is_finite() => Some(v),
            _ if rule.skip_missing => None,
            _ => Some(0.0),
        })
        .collect();

    if values.is_empty() {
        return None;
    }

    let violating: Vec<f64> = values.iter().copied().filter(|v| rule.violates(*v)).collect();

    if violating.is_empty() {
        return None;
    }

    let average = values.iter().sum::<f64>() / values.len() as f64;
    let max = violating.iter().copied().fold(f64::MIN, f64::max);
    let min = violating.iter().copied().fold(f64::MAX, f64::min);

    Some(Violation {
        metric_name: rule.metric_name.clone(),
        count: violating.len(),
        data_points: values.len(),
        max,
        min,
        average,
        violating_total: violating.iter().sum(),
    })
}

impl Violation {
    /// Every sample in the series violated the rule
    pub fn is_total(&self) -> bool {
        self.count == self.data_points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Comparison;
    use chrono::{Duration, TimeZone, Utc};

    fn series(values: &[Option<f64>]) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(start + Duration::minutes(5 * i as i64), *v))
            .collect()
    }

    fn cpu_rule() -> ThresholdRule {
        ThresholdRule::bound("CpuPercentage", "CPU", Comparison::GreaterThan, 80.0, "%")
    }

    #[test]
    fn test_cpu_example() {
        let samples = series(&[Some(85.0), Some(90.0), Some(70.0), Some(95.0)]);
        let violation = evaluate(&samples, &cpu_rule()).expect("violation");

        assert_eq!(violation.count, 3);
        assert_eq!(violation.data_points, 4);
        assert_eq!(violation.max, 95.0);
        assert_eq!(violation.min, 85.0);
        assert_eq!(violation.average, 85.0);
        assert_eq!(violation.violating_total, 270.0);
        assert!(!violation.is_total());
    }

    #[test]
    fn test_no_violation_is_none() {
        let samples = series(&[Some(10.0), Some(80.0), None]);
        assert!(evaluate(&samples, &cpu_rule()).is_none());
        assert!(evaluate(&[], &cpu_rule()).is_none());
    }

    #[test]
    fn test_nulls_count_as_zero_in_average() {
        let rule = ThresholdRule::detected("Http5xx", "HTTP 5xx errors", "errors");
        let samples = series(&[None, Some(4.0), None, Some(0.0)]);
        let violation = evaluate(&samples, &rule).expect("violation");

        assert_eq!(violation.count, 1);
        assert_eq!(violation.average, 1.0);
        assert_eq!(violation.violating_total, 4.0);
    }

    #[test]
    fn test_less_than_rule_reports_extremes() {
        let rule = ThresholdRule::bound("HealthCheckStatus", "Health check status", Comparison::LessThan, 100.0, "%");
        let samples = series(&[Some(100.0), Some(50.0), Some(0.0)]);
        let violation = evaluate(&samples, &rule).expect("violation");

        assert_eq!(violation.count, 2);
        assert_eq!(violation.max, 50.0);
        assert_eq!(violation.min, 0.0);
    }

    #[test]
    fn test_all_points_violating() {
        let rule = ThresholdRule::bound("HealthCheckStatus", "Health check status", Comparison::LessThan, 100.0, "%");
        let violation = evaluate(&series(&[Some(0.0), None]), &rule).expect("violation");
        assert!(violation.is_total());
        assert_eq!(violation.data_points, 1);
    }

    #[test]
    fn test_less_than_skips_missing_readings() {
        let rule = ThresholdRule::bound("HealthCheckStatus", "Health check status", Comparison::LessThan, 100.0, "%");

        assert!(evaluate(&series(&[None, None, None, None]), &rule).is_none());
        assert!(evaluate(&series(&[Some(100.0), Some(100.0), Some(100.0), None]), &rule).is_none());

        let violation = evaluate(&series(&[Some(100.0), None, Some(40.0)]), &rule).expect("violation");
        assert_eq!(violation.count, 1);
        assert_eq!(violation.data_points, 2);
        assert_eq!(violation.average, 70.0);
    }

    #[test]
    fn test_skip_missing_can_be_overridden() {
        let rule = ThresholdRule::bound("HealthCheckStatus", "Health check status", Comparison::LessThan, 100.0, "%")
            .with_skip_missing(false);
        let violation = evaluate(&series(&[Some(100.0), None]), &rule).expect("violation");
        assert_eq!(violation.count, 1);
        assert_eq!(violation.min, 0.0);
    }
}
