//! Issues and the severity policy
//!
//! Severity is never computed from a metric value. Every [`Condition`] belongs
//! to exactly one [`ConditionCategory`], and each category has a fixed severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1 = outage, 4 = informational
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    Critical = 1,
    Major = 2,
    Warning = 3,
    Info = 4,
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity as u8
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Severity::Critical),
            2 => Ok(Severity::Major),
            3 => Ok(Severity::Warning),
            4 => Ok(Severity::Info),
            other => Err(format!("severity must be between 1 and 4, got {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    /// Service down, resource missing, stopped when it should run
    Outage,
    /// Elevated error rates and throttling
    Errors,
    /// CPU, memory, latency and cost warnings
    Performance,
    /// Configuration recommendations and informational findings
    Configuration,
}

impl ConditionCategory {
    pub const fn severity(self) -> Severity {
        match self {
            ConditionCategory::Outage => Severity::Critical,
            ConditionCategory::Errors => Severity::Major,
            ConditionCategory::Performance => Severity::Warning,
            ConditionCategory::Configuration => Severity::Info,
        }
    }
}

/// Every finding the health check can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ResourceNotFound,
    AppStopped,
    ServiceDown,
    ErrorRate,
    ServerErrors,
    ExcessiveClientErrors,
    Throttling,
    HealthCheckFailing,
    ActivityLogCritical,
    HighCpu,
    HighMemory,
    SlowResponse,
    ActivityLogErrors,
    ExecutionCostAnomaly,
    NoExecutions,
    HttpsNotEnforced,
    OutdatedTls,
    AlwaysOnDisabled,
    AppInsightsMissing,
    DiagnosticSettingsMissing,
}

impl Condition {
    pub const fn category(self) -> ConditionCategory {
        use Condition::*;
        match self {
            ResourceNotFound | AppStopped | ServiceDown => ConditionCategory::Outage,
            ErrorRate | ServerErrors | ExcessiveClientErrors | Throttling | HealthCheckFailing
            | ActivityLogCritical => ConditionCategory::Errors,
            HighCpu | HighMemory | SlowResponse | ActivityLogErrors | ExecutionCostAnomaly => {
                ConditionCategory::Performance
            }
            NoExecutions | HttpsNotEnforced | OutdatedTls | AlwaysOnDisabled | AppInsightsMissing
            | DiagnosticSettingsMissing => ConditionCategory::Configuration,
        }
    }

    pub const fn severity(self) -> Severity {
        self.category().severity()
    }

    /// Tail of the issue title: "... has <phrase>"
    pub fn phrase(self) -> &'static str {
        use Condition::*;
        match self {
            ResourceNotFound => "a resource that could not be found",
            AppStopped => "stopped while expected to be running",
            ServiceDown => "no healthy instances",
            ErrorRate => "an elevated error rate",
            ServerErrors => "HTTP 5xx errors",
            ExcessiveClientErrors => "excessive HTTP 4xx errors",
            Throttling => "throttled requests",
            HealthCheckFailing => "failing health checks",
            ActivityLogCritical => "critical activity log events",
            HighCpu => "high CPU usage",
            HighMemory => "high memory usage",
            SlowResponse => "slow response times",
            ActivityLogErrors => "failed operations in the activity log",
            ExecutionCostAnomaly => "an execution cost anomaly",
            NoExecutions => "no function executions",
            HttpsNotEnforced => "HTTPS-only disabled",
            OutdatedTls => "an outdated minimum TLS version",
            AlwaysOnDisabled => "Always On disabled",
            AppInsightsMissing => "no Application Insights configured",
            DiagnosticSettingsMissing => "no diagnostic settings configured",
        }
    }

    /// Remediation hint
    pub fn next_step(self) -> &'static str {
        use Condition::*;
        match self {
            ResourceNotFound => "Verify the Function App name, resource group and subscription, and that the identity running the check can read the resource.",
            AppStopped => "Start the Function App and review the activity log for who stopped it and why.",
            ServiceDown => "Check the health check endpoint, recent deployments and platform status; restart the Function App if instances stay unhealthy.",
            ErrorRate => "Review Application Insights failures and function logs for the failing invocations and roll back recent deployments if needed.",
            ServerErrors => "Inspect application logs and Application Insights exceptions for the requests returning 5xx.",
            ExcessiveClientErrors => "Check callers for malformed requests, authentication failures or removed routes.",
            Throttling => "Review scale-out limits, plan capacity and downstream quotas causing throttled (429) responses.",
            HealthCheckFailing => "Inspect the health check endpoint response and the instances reported as unhealthy.",
            ActivityLogCritical => "Review the critical activity log events and confirm whether they caused an outage.",
            HighCpu => "Profile the functions under load and consider scaling up or out the App Service plan.",
            HighMemory => "Look for memory leaks or large payloads and consider a larger plan SKU.",
            SlowResponse => "Trace slow invocations in Application Insights and check downstream dependencies.",
            ActivityLogErrors => "Review the failed operations in the activity log and re-run or fix the failing deployments or configuration changes.",
            ExecutionCostAnomaly => "Compare recent invocation volume and duration against the baseline and check for runaway triggers or retries.",
            NoExecutions => "Confirm triggers are configured and enabled if executions were expected during this window.",
            HttpsNotEnforced => "Enable HTTPS Only on the Function App.",
            OutdatedTls => "Set the minimum TLS version to 1.2 or later.",
            AlwaysOnDisabled => "Enable Always On to avoid cold starts on dedicated plans.",
            AppInsightsMissing => "Connect the Function App to Application Insights for invocation telemetry.",
            DiagnosticSettingsMissing => "Add a diagnostic setting sending FunctionAppLogs to Log Analytics or storage.",
        }
    }
}

/// A finding surfaced to the reporting layer. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub title: String,
    pub severity: Severity,
    pub details: String,
    pub next_step: String,
    pub observed_at: DateTime<Utc>,
}
