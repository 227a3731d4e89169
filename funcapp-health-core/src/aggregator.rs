//! Violation → Issue conversion with creation-time deduplication

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::evaluator::Violation;
use crate::issue::{Condition, Issue};
use crate::rule::{format_number, Comparison, RuleKind, ThresholdRule};

/// What an issue is about, used in the title template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueTarget {
    /// "Function App", "App Service Plan"
    pub entity: String,
    pub name: String,
    /// "Subscription", "Function App"
    pub resource_type: String,
    pub resource: String,
    pub resource_group: String,
}

impl IssueTarget {
    pub fn new(
        entity: impl Into<String>,
        name: impl Into<String>,
        resource_type: impl Into<String>,
        resource: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            name: name.into(),
            resource_type: resource_type.into(),
            resource: resource.into(),
            resource_group: resource_group.into(),
        }
    }

    /// `<Entity> '<name>' in <ResourceType> '<resource>' (RG: <rg>) has <condition>`
    pub fn title(&self, condition: Condition) -> String {
        format!(
            "{} '{}' in {} '{}' (RG: {}) has {}",
            self.entity,
            self.name,
            self.resource_type,
            self.resource,
            self.resource_group,
            condition.phrase()
        )
    }
}

/// Build an issue. Pure: no state is touched.
pub fn build_issue(
    target: &IssueTarget,
    condition: Condition,
    details: impl Into<String>,
    observed_at: DateTime<Utc>,
) -> Issue {
    Issue {
        title: target.title(condition),
        severity: condition.severity(),
        details: details.into(),
        next_step: condition.next_step().to_string(),
        observed_at,
    }
}

/// Details line for a metric violation, e.g.
/// `CPU exceeded 80% threshold in 3 out of 4 data points. Max: 95%, Average: 85%`
pub fn violation_details(rule: &ThresholdRule, violation: &Violation) -> String {
    match rule.kind {
        RuleKind::Detected => format!(
            "{} detected in {} out of {} data points ({} total). Max: {} per interval, Average: {}",
            rule.label,
            violation.count,
            violation.data_points,
            format_number(violation.violating_total),
            rule.with_unit(violation.max),
            rule.with_unit(violation.average),
        ),
        RuleKind::Excessive => format!(
            "{} exceeded {} per interval in {} out of {} data points. Max: {}, Average: {}",
            rule.label,
            rule.with_unit(rule.limit),
            violation.count,
            violation.data_points,
            rule.with_unit(violation.max),
            rule.with_unit(violation.average),
        ),
        RuleKind::Bound => {
            let worst = match rule.comparison {
                Comparison::LessThan => ("Min", violation.min),
                _ => ("Max", violation.max),
            };
            format!(
                "{} {} {} threshold in {} out of {} data points. {}: {}, Average: {}",
                rule.label,
                rule.comparison.verb(),
                rule.with_unit(rule.limit),
                violation.count,
                violation.data_points,
                worst.0,
                rule.with_unit(worst.1),
                rule.with_unit(violation.average),
            )
        }
    }
}

/// Collects issues for one aggregation pass.
///
/// A finding is identified by its condition and a subject (metric key,
/// setting name...). The first occurrence wins; later ones are dropped.
#[derive(Debug)]
pub struct IssueAggregator {
    observed_at: DateTime<Utc>,
    issues: Vec<Issue>,
    seen: HashSet<(Condition, String)>,
}

impl IssueAggregator {
    pub fn new(observed_at: DateTime<Utc>) -> Self {
        Self {
            observed_at,
            issues: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Record an issue unless `(condition, subject)` was already reported.
    /// Returns whether the issue was kept.
    pub fn raise(
        &mut self,
        target: &IssueTarget,
        condition: Condition,
        subject: &str,
        details: impl Into<String>,
    ) -> bool {
        let key = (condition, format!("{}/{}", target.name, subject));
        if self.seen.contains(&key) {
            debug!(?condition, subject, "duplicate finding dropped");
            return false;
        }
        self.seen.insert(key);
        self.issues
            .push(build_issue(target, condition, details, self.observed_at));
        true
    }

    /// One issue for a collapsed set of violations
    pub fn raise_violation(
        &mut self,
        target: &IssueTarget,
        condition: Condition,
        rule: &ThresholdRule,
        violation: &Violation,
    ) -> bool {
        let details = violation_details(rule, violation);
        self.raise(target, condition, &rule.metric_name, details)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::issue::Severity;
    use crate::sample::MetricSample;
    use chrono::{Duration, TimeZone};

    fn target() -> IssueTarget {
        IssueTarget::new("Function App", "orders-fn", "Subscription", "prod-sub", "rg-orders")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn series(values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(now() + Duration::minutes(i as i64), Some(*v)))
            .collect()
    }

    #[test]
    fn test_title_template() {
        assert_eq!(
            target().title(Condition::HighCpu),
            "Function App 'orders-fn' in Subscription 'prod-sub' (RG: rg-orders) has high CPU usage"
        );
    }

    #[test]
    fn test_cpu_example_issue() {
        let rule = ThresholdRule::bound("CpuPercentage", "CPU", Comparison::GreaterThan, 80.0, "%");
        let violation = evaluate(&series(&[85.0, 90.0, 70.0, 95.0]), &rule).unwrap();

        let mut aggregator = IssueAggregator::new(now());
        assert!(aggregator.raise_violation(&target(), Condition::HighCpu, &rule, &violation));

        let issues = aggregator.into_issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert_eq!(
            issues[0].details,
            "CPU exceeded 80% threshold in 3 out of 4 data points. Max: 95%, Average: 85%"
        );
        assert_eq!(issues[0].observed_at, now());
    }

    #[test]
    fn test_duplicates_dropped_at_creation() {
        let rule = ThresholdRule::detected("Http5xx", "HTTP 5xx errors", "errors");
        let violation = evaluate(&series(&[1.0, 2.0]), &rule).unwrap();

        let mut aggregator = IssueAggregator::new(now());
        assert!(aggregator.raise_violation(&target(), Condition::ServerErrors, &rule, &violation));
        assert!(!aggregator.raise_violation(&target(), Condition::ServerErrors, &rule, &violation));
        // same metric, different condition is a different finding
        assert!(aggregator.raise(&target(), Condition::ErrorRate, "Http5xx", "rate"));
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn test_detected_details() {
        let rule = ThresholdRule::detected("Http429", "Throttled requests", "requests");
        let violation = evaluate(&series(&[0.0, 3.0, 1.0, 0.0]), &rule).unwrap();
        assert_eq!(
            violation_details(&rule, &violation),
            "Throttled requests detected in 2 out of 4 data points (4 total). Max: 3 requests per interval, Average: 1 requests"
        );
    }

    #[test]
    fn test_less_than_details_report_minimum() {
        let rule = ThresholdRule::bound("HealthCheckStatus", "Health check status", Comparison::LessThan, 100.0, "%");
        let violation = evaluate(&series(&[100.0, 50.0]), &rule).unwrap();
        assert_eq!(
            violation_details(&rule, &violation),
            "Health check status fell below 100% threshold in 1 out of 2 data points. Min: 50%, Average: 75%"
        );
    }
}
