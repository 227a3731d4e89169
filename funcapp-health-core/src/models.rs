//! Typed views over the `az` JSON documents the health check reads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// `az functionapp show`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionAppInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, alias = "appServicePlanId")]
    pub server_farm_id: Option<String>,
    #[serde(default)]
    pub https_only: Option<bool>,
    #[serde(default)]
    pub site_config: Option<SiteConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub always_on: Option<bool>,
    #[serde(default)]
    pub min_tls_version: Option<String>,
    #[serde(default)]
    pub health_check_path: Option<String>,
}

impl FunctionAppInfo {
    pub fn is_running(&self) -> bool {
        self.state
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("running"))
            .unwrap_or(false)
    }

    pub fn health_check_path(&self) -> Option<&str> {
        self.site_config
            .as_ref()
            .and_then(|c| c.health_check_path.as_deref())
            .filter(|p| !p.trim().is_empty())
    }
}

/// `az appservice plan show`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppServicePlanInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<PlanSku>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSku {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tier: Option<String>,
}

impl AppServicePlanInfo {
    /// Consumption (Y1) and Flex Consumption plans have no Always On setting.
    pub fn is_consumption(&self) -> bool {
        let Some(sku) = &self.sku else {
            return false;
        };
        let tier = sku.tier.as_deref().unwrap_or_default();
        let name = sku.name.as_deref().unwrap_or_default();
        tier.eq_ignore_ascii_case("Dynamic")
            || tier.eq_ignore_ascii_case("FlexConsumption")
            || name.eq_ignore_ascii_case("Y1")
    }
}

/// One entry of `az functionapp config appsettings list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSetting {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub slot_setting: bool,
}

/// Names under which Application Insights is wired into a Function App
pub const APP_INSIGHTS_SETTINGS: &[&str] = &[
    "APPLICATIONINSIGHTS_CONNECTION_STRING",
    "APPINSIGHTS_INSTRUMENTATIONKEY",
];

pub fn has_app_insights(settings: &[AppSetting]) -> bool {
    settings.iter().any(|s| {
        APP_INSIGHTS_SETTINGS.contains(&s.name.as_str())
            && s.value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
    })
}

/// Activity log level as reported by Azure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityLevel {
    Critical,
    Error,
    Warning,
    Informational,
    Verbose,
    #[serde(other)]
    Unknown,
}

/// Flattened activity log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub operation_name: String,
    pub level: ActivityLevel,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub caller: Option<String>,
    pub event_timestamp: DateTime<Utc>,
}

/// `az monitor diagnostic-settings list` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSetting {
    pub name: String,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub storage_account_id: Option<String>,
}
