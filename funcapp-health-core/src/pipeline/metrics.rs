//! Metric sampling table and threshold checks

use tracing::warn;

use crate::aggregator::{IssueAggregator, IssueTarget};
use crate::client::AzureClient;
use crate::evaluator::evaluate;
use crate::issue::Condition;
use crate::rule::{Comparison, ThresholdRule};
use crate::sample::{ratio_percent, scale_samples, sum, Aggregation, SampleSet, TimeWindow};
use crate::sampler::MetricSampler;
use crate::settings::Thresholds;

pub const EXECUTION_COUNT: &str = "FunctionExecutionCount";
pub const EXECUTION_UNITS: &str = "FunctionExecutionUnits";
pub const REQUESTS: &str = "Requests";
pub const HTTP_5XX: &str = "Http5xx";
pub const HTTP_4XX: &str = "Http4xx";
pub const HTTP_429: &str = "Http429";
pub const RESPONSE_TIME_MS: &str = "HttpResponseTimeMs";
pub const WORKING_SET_MB: &str = "AverageMemoryWorkingSetMb";
pub const HEALTH_CHECK_STATUS: &str = "HealthCheckStatus";
pub const CPU_PERCENT: &str = "CpuPercentage";
pub const MEMORY_PERCENT: &str = "MemoryPercentage";
/// Derived from Http5xx / Requests
pub const ERROR_RATE_PERCENT: &str = "ErrorRatePercent";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    App,
    Plan,
}

/// A series to pull from Azure Monitor
#[derive(Debug, Clone, Copy)]
struct MetricSpec {
    key: &'static str,
    metric: &'static str,
    scope: Scope,
    aggregation: Aggregation,
    /// Unit conversion applied to every value
    scale: f64,
}

const SAMPLED: &[MetricSpec] = &[
    MetricSpec { key: EXECUTION_COUNT, metric: "FunctionExecutionCount", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    MetricSpec { key: EXECUTION_UNITS, metric: "FunctionExecutionUnits", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    MetricSpec { key: REQUESTS, metric: "Requests", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    MetricSpec { key: HTTP_5XX, metric: "Http5xx", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    MetricSpec { key: HTTP_4XX, metric: "Http4xx", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    MetricSpec { key: HTTP_429, metric: "Http429", scope: Scope::App, aggregation: Aggregation::Total, scale: 1.0 },
    // seconds -> milliseconds
    MetricSpec { key: RESPONSE_TIME_MS, metric: "HttpResponseTime", scope: Scope::App, aggregation: Aggregation::Average, scale: 1000.0 },
    MetricSpec { key: WORKING_SET_MB, metric: "AverageMemoryWorkingSet", scope: Scope::App, aggregation: Aggregation::Average, scale: 1.0 / BYTES_PER_MB },
    MetricSpec { key: HEALTH_CHECK_STATUS, metric: "HealthCheckStatus", scope: Scope::App, aggregation: Aggregation::Average, scale: 1.0 },
    MetricSpec { key: CPU_PERCENT, metric: "CpuPercentage", scope: Scope::Plan, aggregation: Aggregation::Average, scale: 1.0 },
    MetricSpec { key: MEMORY_PERCENT, metric: "MemoryPercentage", scope: Scope::Plan, aggregation: Aggregation::Average, scale: 1.0 },
];

/// Sample every metric of the table into one set.
///
/// Plan metrics are skipped when the plan did not resolve, and the health
/// check series only exists when a health check path is configured.
pub async fn sample_all<C: AzureClient + ?Sized>(
    sampler: &MetricSampler<'_, C>,
    app_id: &str,
    plan_id: Option<&str>,
    window: TimeWindow,
    health_check_enabled: bool,
) -> SampleSet {
    let mut set = SampleSet::new();

    for spec in SAMPLED {
        let resource_id = match (spec.scope, plan_id) {
            (Scope::App, _) => app_id,
            (Scope::Plan, Some(plan_id)) => plan_id,
            (Scope::Plan, None) => continue,
        };
        if spec.key == HEALTH_CHECK_STATUS && !health_check_enabled {
            continue;
        }

        let Some(samples) = sampler
            .try_sample(resource_id, spec.metric, spec.aggregation, window)
            .await
        else {
            continue;
        };
        let samples = if spec.scale == 1.0 {
            samples
        } else {
            scale_samples(samples, spec.scale)
        };
        set.insert(spec.key.to_string(), samples);
    }

    if let (Some(errors), Some(requests)) = (set.get(HTTP_5XX), set.get(REQUESTS)) {
        let rates = ratio_percent(errors, requests);
        set.insert(ERROR_RATE_PERCENT.to_string(), rates);
    }

    set
}

/// A rule bound to the condition it reports
#[derive(Debug, Clone)]
pub struct MetricCheck {
    pub rule: ThresholdRule,
    pub condition: Condition,
    pub scope: Scope,
}

impl MetricCheck {
    fn new(rule: ThresholdRule, condition: Condition, scope: Scope) -> Self {
        Self { rule, condition, scope }
    }
}

pub fn checks(thresholds: &Thresholds) -> Vec<MetricCheck> {
    use Comparison::{GreaterThan, LessThan};

    vec![
        MetricCheck::new(
            ThresholdRule::bound(CPU_PERCENT, "CPU", GreaterThan, thresholds.cpu_percent, "%"),
            Condition::HighCpu,
            Scope::Plan,
        ),
        MetricCheck::new(
            ThresholdRule::bound(MEMORY_PERCENT, "Memory", GreaterThan, thresholds.memory_percent, "%"),
            Condition::HighMemory,
            Scope::Plan,
        ),
        MetricCheck::new(
            ThresholdRule::bound(WORKING_SET_MB, "Memory working set", GreaterThan, thresholds.memory_mb, "MB"),
            Condition::HighMemory,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::bound(RESPONSE_TIME_MS, "Response time", GreaterThan, thresholds.duration_ms, "ms"),
            Condition::SlowResponse,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::bound(ERROR_RATE_PERCENT, "Error rate", GreaterThan, thresholds.error_rate_percent, "%"),
            Condition::ErrorRate,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::detected(HTTP_5XX, "HTTP 5xx errors", "errors"),
            Condition::ServerErrors,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::excessive(HTTP_4XX, "HTTP 4xx errors", thresholds.client_errors_per_interval, "errors"),
            Condition::ExcessiveClientErrors,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::detected(HTTP_429, "Throttled requests", "requests"),
            Condition::Throttling,
            Scope::App,
        ),
        MetricCheck::new(
            ThresholdRule::bound(HEALTH_CHECK_STATUS, "Health check status", LessThan, thresholds.health_check_percent, "%"),
            Condition::HealthCheckFailing,
            Scope::App,
        ),
    ]
}

/// Run every check over the sampled set. At most one issue per check.
pub fn evaluate_all(
    samples: &SampleSet,
    checks: &[MetricCheck],
    app_target: &IssueTarget,
    plan_target: Option<&IssueTarget>,
    aggregator: &mut IssueAggregator,
) {
    for check in checks {
        let Some(series) = samples.get(&check.rule.metric_name) else {
            continue;
        };
        let Some(violation) = evaluate(series, &check.rule) else {
            continue;
        };
        let target = match (check.scope, plan_target) {
            (Scope::App, _) => app_target,
            (Scope::Plan, Some(plan)) => plan,
            (Scope::Plan, None) => continue,
        };

        // zero health on every reported point is an outage, not a degradation
        let condition = if check.condition == Condition::HealthCheckFailing
            && violation.data_points > 0
            && violation.is_total()
            && violation.max <= 0.0
        {
            Condition::ServiceDown
        } else {
            check.condition
        };

        aggregator.raise_violation(target, condition, &check.rule, &violation);
    }
}

/// Absence of executions is itself a finding. A failed execution count
/// query proves nothing and raises no issue.
pub fn check_executions(
    samples: &SampleSet,
    app_name: &str,
    lookback_minutes: u32,
    target: &IssueTarget,
    aggregator: &mut IssueAggregator,
) {
    let Some(series) = samples.get(EXECUTION_COUNT) else {
        warn!(app_name, "execution count unavailable, skipping the no-executions check");
        return;
    };
    if sum(series) > 0.0 {
        return;
    }
    aggregator.raise(
        target,
        Condition::NoExecutions,
        EXECUTION_COUNT,
        format!(
            "No Function Executions recorded for Function App '{app_name}' over the last {lookback_minutes} minute(s)."
        ),
    );
}
