//! The authenticated Azure API seam
//!
//! The pipeline never shells out itself; it is handed one client. The agent
//! implements it over the Azure CLI, the devkit over in-memory fixtures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    ActivityLogEntry, AppServicePlanInfo, AppSetting, DiagnosticSetting, FunctionAppInfo, Subscription,
};
use crate::sample::{Aggregation, MetricSample, TimeWindow};

/// One metric query against one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub resource_id: String,
    pub metric: String,
    pub aggregation: Aggregation,
    pub window: TimeWindow,
    /// ISO-8601 duration, e.g. `PT5M`
    pub interval: String,
}

#[async_trait]
pub trait AzureClient: Send + Sync {
    /// Subscription the checks run against
    async fn current_subscription(&self) -> Result<Subscription>;

    /// `Ok(None)` when the app does not exist
    async fn function_app(&self, name: &str, resource_group: &str) -> Result<Option<FunctionAppInfo>>;

    async fn app_service_plan(&self, plan_id: &str) -> Result<Option<AppServicePlanInfo>>;

    async fn app_settings(&self, name: &str, resource_group: &str) -> Result<Vec<AppSetting>>;

    /// Samples in timestamp order; empty when the window holds no data
    async fn metrics(&self, query: &MetricQuery) -> Result<Vec<MetricSample>>;

    async fn activity_log(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<ActivityLogEntry>>;

    async fn diagnostic_settings(&self, resource_id: &str) -> Result<Vec<DiagnosticSetting>>;
}
