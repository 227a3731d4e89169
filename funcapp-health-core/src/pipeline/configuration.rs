//! Configuration recommendations (all informational)

use tracing::warn;

use crate::aggregator::{IssueAggregator, IssueTarget};
use crate::client::AzureClient;
use crate::issue::Condition;
use crate::models::{has_app_insights, AppServicePlanInfo, FunctionAppInfo};

const MIN_TLS_VERSION: f64 = 1.2;

pub async fn check<C: AzureClient + ?Sized>(
    client: &C,
    app: &FunctionAppInfo,
    plan: Option<&AppServicePlanInfo>,
    resource_group: &str,
    target: &IssueTarget,
    aggregator: &mut IssueAggregator,
) {
    check_site(app, plan, target, aggregator);

    match client.app_settings(&app.name, resource_group).await {
        Ok(settings) if !has_app_insights(&settings) => {
            aggregator.raise(
                target,
                Condition::AppInsightsMissing,
                "app-settings",
                format!(
                    "Function App '{}' has neither APPLICATIONINSIGHTS_CONNECTION_STRING nor APPINSIGHTS_INSTRUMENTATIONKEY set.",
                    app.name
                ),
            );
        }
        Ok(_) => {}
        Err(e) => warn!(app = %app.name, error = %e, "app settings query failed, skipping"),
    }

    match client.diagnostic_settings(&app.id).await {
        Ok(settings) if settings.is_empty() => {
            aggregator.raise(
                target,
                Condition::DiagnosticSettingsMissing,
                "diagnostic-settings",
                format!(
                    "Function App '{}' has no diagnostic settings; platform logs are not retained.",
                    app.name
                ),
            );
        }
        Ok(_) => {}
        Err(e) => warn!(app = %app.name, error = %e, "diagnostic settings query failed, skipping"),
    }
}

/// Findings that only need the `az functionapp show` document
pub fn check_site(
    app: &FunctionAppInfo,
    plan: Option<&AppServicePlanInfo>,
    target: &IssueTarget,
    aggregator: &mut IssueAggregator,
) {
    if app.https_only == Some(false) {
        aggregator.raise(
            target,
            Condition::HttpsNotEnforced,
            "httpsOnly",
            format!("HTTPS Only is disabled on Function App '{}'; plain HTTP requests are accepted.", app.name),
        );
    }

    let site = app.site_config.clone().unwrap_or_default();

    if let Some(version) = site.min_tls_version.as_deref() {
        if tls_below_minimum(version) {
            aggregator.raise(
                target,
                Condition::OutdatedTls,
                "minTlsVersion",
                format!("Minimum TLS version is {version}; 1.2 or later is recommended."),
            );
        }
    }

    // consumption plans have no Always On
    let dedicated = plan.map(|p| !p.is_consumption()).unwrap_or(false);
    if dedicated && site.always_on == Some(false) {
        aggregator.raise(
            target,
            Condition::AlwaysOnDisabled,
            "alwaysOn",
            format!(
                "Always On is disabled on Function App '{}' running on a dedicated plan.",
                app.name
            ),
        );
    }
}

fn tls_below_minimum(version: &str) -> bool {
    version
        .trim()
        .parse::<f64>()
        .map(|v| v < MIN_TLS_VERSION)
        .unwrap_or(false)
}
