/*!
In-memory Azure client

Stands in for the Azure CLI so the pipeline can run without a subscription.
Canned answers are set with builder methods; every call is recorded for
assertions.
*/

use async_trait::async_trait;
use funcapp_health_core::models::{
    ActivityLogEntry, AppServicePlanInfo, AppSetting, DiagnosticSetting, FunctionAppInfo, Subscription,
};
use funcapp_health_core::{AzureClient, HealthError, MetricQuery, MetricSample, Result, TimeWindow};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const DEFAULT_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Default)]
struct MockState {
    subscription: Option<Subscription>,
    subscription_error: Option<String>,
    function_app: Option<FunctionAppInfo>,
    function_app_error: Option<String>,
    plan: Option<AppServicePlanInfo>,
    app_settings: Vec<AppSetting>,
    metrics: HashMap<String, Vec<MetricSample>>,
    failing_metrics: HashSet<String>,
    activity_log: Vec<ActivityLogEntry>,
    diagnostic_settings: Vec<DiagnosticSetting>,
    metric_queries: Vec<MetricQuery>,
    calls: Vec<String>,
}

/// Mock client implementing `AzureClient`
#[derive(Debug, Clone)]
pub struct MockAzureClient {
    state: Arc<Mutex<MockState>>,
}

impl MockAzureClient {
    /// Logged in to a default subscription, with no resources
    pub fn new() -> Self {
        let state = MockState {
            subscription: Some(Subscription {
                id: DEFAULT_SUBSCRIPTION_ID.to_string(),
                name: "Test Subscription".to_string(),
            }),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn with_subscription(self, id: &str, name: &str) -> Self {
        self.state.lock().subscription = Some(Subscription {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// `az account show` fails, e.g. not logged in
    pub fn failing_subscription(self, stderr: &str) -> Self {
        self.state.lock().subscription_error = Some(stderr.to_string());
        self
    }

    pub fn with_function_app(self, app: FunctionAppInfo) -> Self {
        self.state.lock().function_app = Some(app);
        self
    }

    /// The lookup itself fails (access denied, network...)
    pub fn failing_function_app(self, stderr: &str) -> Self {
        self.state.lock().function_app_error = Some(stderr.to_string());
        self
    }

    pub fn with_plan(self, plan: AppServicePlanInfo) -> Self {
        self.state.lock().plan = Some(plan);
        self
    }

    pub fn with_app_settings(self, settings: Vec<AppSetting>) -> Self {
        self.state.lock().app_settings = settings;
        self
    }

    /// Series returned for `metric` (Azure metric name); queries only see
    /// the samples inside their window
    pub fn with_metric(self, metric: &str, samples: Vec<MetricSample>) -> Self {
        self.state.lock().metrics.insert(metric.to_string(), samples);
        self
    }

    pub fn failing_metric(self, metric: &str) -> Self {
        self.state.lock().failing_metrics.insert(metric.to_string());
        self
    }

    pub fn with_activity_log(self, entries: Vec<ActivityLogEntry>) -> Self {
        self.state.lock().activity_log = entries;
        self
    }

    pub fn with_diagnostic_settings(self, settings: Vec<DiagnosticSetting>) -> Self {
        self.state.lock().diagnostic_settings = settings;
        self
    }

    /// Every metric query made so far
    pub fn metric_queries(&self) -> Vec<MetricQuery> {
        self.state.lock().metric_queries.clone()
    }

    pub fn queried_metrics(&self) -> Vec<String> {
        self.state
            .lock()
            .metric_queries
            .iter()
            .map(|q| q.metric.clone())
            .collect()
    }

    /// Client calls in order, e.g. `function_app orders-fn`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.metric_queries.clear();
        state.calls.clear();
    }

    fn record(&self, call: String) {
        log::debug!("[MOCK] {}", call);
        self.state.lock().calls.push(call);
    }
}

impl Default for MockAzureClient {
    fn default() -> Self {
        Self::new()
    }
}

fn command_error(command: &str, stderr: &str) -> HealthError {
    HealthError::Command {
        command: command.to_string(),
        exit_code: Some(1),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl AzureClient for MockAzureClient {
    async fn current_subscription(&self) -> Result<Subscription> {
        self.record("current_subscription".to_string());
        let state = self.state.lock();
        if let Some(stderr) = &state.subscription_error {
            return Err(command_error("az account show", stderr));
        }
        state
            .subscription
            .clone()
            .ok_or_else(|| command_error("az account show", "Please run 'az login' to setup account."))
    }

    async fn function_app(&self, name: &str, resource_group: &str) -> Result<Option<FunctionAppInfo>> {
        self.record(format!("function_app {name} {resource_group}"));
        let state = self.state.lock();
        if let Some(stderr) = &state.function_app_error {
            return Err(command_error("az functionapp show", stderr));
        }
        Ok(state
            .function_app
            .clone()
            .filter(|app| app.name.eq_ignore_ascii_case(name)))
    }

    async fn app_service_plan(&self, plan_id: &str) -> Result<Option<AppServicePlanInfo>> {
        self.record(format!("app_service_plan {plan_id}"));
        Ok(self
            .state
            .lock()
            .plan
            .clone()
            .filter(|plan| plan.id.eq_ignore_ascii_case(plan_id)))
    }

    async fn app_settings(&self, name: &str, _resource_group: &str) -> Result<Vec<AppSetting>> {
        self.record(format!("app_settings {name}"));
        Ok(self.state.lock().app_settings.clone())
    }

    async fn metrics(&self, query: &MetricQuery) -> Result<Vec<MetricSample>> {
        self.record(format!("metrics {}", query.metric));
        let mut state = self.state.lock();
        state.metric_queries.push(query.clone());

        if state.failing_metrics.contains(&query.metric) {
            return Err(command_error("az monitor metrics list", "InternalServerError"));
        }

        let mut samples: Vec<MetricSample> = state
            .metrics
            .get(&query.metric)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| query.window.contains(s.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    async fn activity_log(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<ActivityLogEntry>> {
        self.record(format!("activity_log {resource_id}"));
        Ok(self
            .state
            .lock()
            .activity_log
            .iter()
            .filter(|e| window.contains(e.event_timestamp))
            .cloned()
            .collect())
    }

    async fn diagnostic_settings(&self, resource_id: &str) -> Result<Vec<DiagnosticSetting>> {
        self.record(format!("diagnostic_settings {resource_id}"));
        Ok(self.state.lock().diagnostic_settings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use funcapp_health_core::Aggregation;

    #[tokio::test]
    async fn test_metrics_filtered_by_window() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let client = MockAzureClient::new().with_metric(
            "CpuPercentage",
            vec![
                MetricSample::new(now - Duration::hours(2), Some(99.0)),
                MetricSample::new(now - Duration::minutes(10), Some(50.0)),
                MetricSample::new(now, Some(10.0)),
            ],
        );

        let query = MetricQuery {
            resource_id: "plan".into(),
            metric: "CpuPercentage".into(),
            aggregation: Aggregation::Average,
            window: TimeWindow::last_minutes(now, 30),
            interval: "PT5M".into(),
        };
        let samples = client.metrics(&query).await.unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, Some(50.0));
        assert_eq!(client.queried_metrics(), vec!["CpuPercentage".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_and_recording() {
        let client = MockAzureClient::new()
            .failing_subscription("AADSTS700082: The refresh token has expired")
            .failing_metric("Http5xx");

        assert!(client.current_subscription().await.is_err());
        assert!(client.function_app("ghost", "rg").await.unwrap().is_none());
        assert_eq!(client.calls(), vec!["current_subscription", "function_app ghost rg"]);

        client.clear();
        assert!(client.calls().is_empty());
    }
}
