/*!
Fixtures for a single Function App named `orders-fn`

All series are placed relative to [`reference_time`] so they fall inside the
default 30 minute lookback window.
*/

use chrono::{DateTime, Duration, TimeZone, Utc};
use funcapp_health_core::models::{
    ActivityLevel, ActivityLogEntry, AppServicePlanInfo, AppSetting, DiagnosticSetting, FunctionAppInfo, PlanSku,
    SiteConfig,
};
use funcapp_health_core::{CheckSettings, MetricSample};

use crate::az_stub::{MockAzureClient, DEFAULT_SUBSCRIPTION_ID};

pub const APP_NAME: &str = "orders-fn";
pub const RESOURCE_GROUP: &str = "rg-orders";
pub const PLAN_NAME: &str = "orders-plan";

pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn app_id() -> String {
    format!(
        "/subscriptions/{DEFAULT_SUBSCRIPTION_ID}/resourceGroups/{RESOURCE_GROUP}/providers/Microsoft.Web/sites/{APP_NAME}"
    )
}

pub fn plan_id() -> String {
    format!(
        "/subscriptions/{DEFAULT_SUBSCRIPTION_ID}/resourceGroups/{RESOURCE_GROUP}/providers/Microsoft.Web/serverfarms/{PLAN_NAME}"
    )
}

/// Running, HTTPS only, TLS 1.2, Always On
pub fn running_app() -> FunctionAppInfo {
    FunctionAppInfo {
        id: app_id(),
        name: APP_NAME.to_string(),
        state: Some("Running".to_string()),
        kind: Some("functionapp,linux".to_string()),
        location: Some("westeurope".to_string()),
        server_farm_id: Some(plan_id()),
        https_only: Some(true),
        site_config: Some(SiteConfig {
            always_on: Some(true),
            min_tls_version: Some("1.2".to_string()),
            health_check_path: None,
        }),
    }
}

pub fn stopped_app() -> FunctionAppInfo {
    FunctionAppInfo {
        state: Some("Stopped".to_string()),
        ..running_app()
    }
}

pub fn premium_plan() -> AppServicePlanInfo {
    AppServicePlanInfo {
        id: plan_id(),
        name: PLAN_NAME.to_string(),
        sku: Some(PlanSku {
            name: Some("EP1".to_string()),
            tier: Some("ElasticPremium".to_string()),
        }),
    }
}

pub fn instrumented_settings() -> Vec<AppSetting> {
    vec![
        AppSetting {
            name: "FUNCTIONS_WORKER_RUNTIME".to_string(),
            value: Some("dotnet-isolated".to_string()),
            slot_setting: false,
        },
        AppSetting {
            name: "APPLICATIONINSIGHTS_CONNECTION_STRING".to_string(),
            value: Some("InstrumentationKey=11111111-2222-3333-4444-555555555555".to_string()),
            slot_setting: false,
        },
    ]
}

pub fn log_analytics_export() -> Vec<DiagnosticSetting> {
    vec![DiagnosticSetting {
        name: "to-log-analytics".to_string(),
        workspace_id: Some("/subscriptions/x/resourceGroups/rg-obs/providers/Microsoft.OperationalInsights/workspaces/obs".to_string()),
        storage_account_id: None,
    }]
}

/// Samples `interval_minutes` apart, the last one `interval_minutes` before `end`
pub fn series_ending_at(end: DateTime<Utc>, interval_minutes: i64, values: &[Option<f64>]) -> Vec<MetricSample> {
    let n = values.len() as i64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| MetricSample::new(end - Duration::minutes(interval_minutes * (n - i as i64)), *v))
        .collect()
}

/// Five minute samples ending at [`reference_time`]
pub fn recent_series(values: &[f64]) -> Vec<MetricSample> {
    let values: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
    series_ending_at(reference_time(), 5, &values)
}

pub fn activity(operation: &str, level: ActivityLevel, minutes_ago: i64) -> ActivityLogEntry {
    ActivityLogEntry {
        operation_name: operation.to_string(),
        level,
        status: Some("Failed".to_string()),
        caller: Some("deploy@example.com".to_string()),
        event_timestamp: reference_time() - Duration::minutes(minutes_ago),
    }
}

/// Settings for `orders-fn` with every default threshold
pub fn settings() -> CheckSettings {
    CheckSettings {
        function_app_name: APP_NAME.to_string(),
        resource_group: RESOURCE_GROUP.to_string(),
        ..CheckSettings::default()
    }
}

/// A running, well-configured app with steady traffic and nothing to report
pub fn healthy_client() -> MockAzureClient {
    MockAzureClient::new()
        .with_function_app(running_app())
        .with_plan(premium_plan())
        .with_app_settings(instrumented_settings())
        .with_diagnostic_settings(log_analytics_export())
        .with_metric("FunctionExecutionCount", recent_series(&[12.0, 9.0, 15.0, 11.0]))
        .with_metric("Requests", recent_series(&[120.0, 90.0, 150.0, 110.0]))
        .with_metric("Http5xx", recent_series(&[0.0, 0.0, 0.0, 0.0]))
        .with_metric("CpuPercentage", recent_series(&[20.0, 35.0, 28.0, 31.0]))
        .with_metric("MemoryPercentage", recent_series(&[40.0, 42.0, 41.0, 43.0]))
        // seconds
        .with_metric("HttpResponseTime", recent_series(&[0.12, 0.2, 0.15, 0.18]))
}
