//! One health-check pass over one Function App
//!
//! Sampler -> Evaluator -> Aggregator, then the caller hands the report to the
//! emitter. Only subscription resolution can fail the pass; everything past it
//! degrades to missing data or ends in a report.

pub mod activity;
pub mod configuration;
pub mod cost;
pub mod metrics;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::{IssueAggregator, IssueTarget};
use crate::client::AzureClient;
use crate::error::{HealthError, Result};
use crate::issue::{Condition, Issue};
use crate::models::{AppServicePlanInfo, FunctionAppInfo, Subscription};
use crate::report::{ranges, IssueCounts, Report, ResourceSummary, Summary, WindowSummary};
use crate::sample::{SampleSet, TimeWindow};
use crate::sampler::MetricSampler;
use crate::settings::CheckSettings;

/// How the pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The app is stopped; metric checks were skipped
    AppStopped,
    /// The app could not be resolved; the report holds one critical issue
    ResourceNotFound,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub report: Report,
}

pub struct HealthCheck<'a, C: AzureClient + ?Sized> {
    client: &'a C,
    settings: CheckSettings,
}

impl<'a, C: AzureClient + ?Sized> HealthCheck<'a, C> {
    pub fn new(client: &'a C, settings: CheckSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &CheckSettings {
        &self.settings
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let settings = &self.settings;
        if settings.function_app_name.trim().is_empty() {
            return Err(HealthError::Precondition("function app name is required".into()));
        }
        if settings.resource_group.trim().is_empty() {
            return Err(HealthError::Precondition("resource group is required".into()));
        }

        let subscription = self
            .client
            .current_subscription()
            .await
            .map_err(|e| HealthError::Precondition(format!("cannot resolve subscription: {e}")))?;

        let window = TimeWindow::last_minutes(now, settings.lookback_minutes);
        let app_target = IssueTarget::new(
            "Function App",
            &settings.function_app_name,
            "Subscription",
            subscription_label(&subscription),
            &settings.resource_group,
        );
        let mut aggregator = IssueAggregator::new(now);

        info!(
            app = %settings.function_app_name,
            resource_group = %settings.resource_group,
            subscription = %subscription.id,
            lookback_minutes = settings.lookback_minutes,
            "starting health check"
        );

        let app = match self
            .client
            .function_app(&settings.function_app_name, &settings.resource_group)
            .await
        {
            Ok(Some(app)) => app,
            Ok(None) => {
                return Ok(self.not_found(&subscription, &app_target, aggregator, &window, now, None));
            }
            Err(e) => {
                warn!(error = %e, "function app lookup failed");
                return Ok(self.not_found(&subscription, &app_target, aggregator, &window, now, Some(e)));
            }
        };

        let plan = self.resolve_plan(&app).await;
        let plan_target = plan.as_ref().map(|p| {
            IssueTarget::new("App Service Plan", &p.name, "Function App", &app.name, &settings.resource_group)
        });

        let mut status = RunStatus::Completed;
        let mut samples = SampleSet::new();

        if app.is_running() {
            let sampler = MetricSampler::new(self.client, &settings.interval);
            samples = metrics::sample_all(
                &sampler,
                &app.id,
                plan.as_ref().map(|p| p.id.as_str()),
                window,
                app.health_check_path().is_some(),
            )
            .await;

            metrics::evaluate_all(
                &samples,
                &metrics::checks(&settings.thresholds),
                &app_target,
                plan_target.as_ref(),
                &mut aggregator,
            );
            metrics::check_executions(
                &samples,
                &app.name,
                settings.lookback_minutes,
                &app_target,
                &mut aggregator,
            );

            if settings.cost.enabled {
                cost::check(&sampler, &app.id, now, &settings.cost, &app_target, &mut aggregator).await;
            }
        } else {
            status = RunStatus::AppStopped;
            aggregator.raise(
                &app_target,
                Condition::AppStopped,
                "state",
                format!(
                    "Function App '{}' is in state '{}' but is expected to be Running. Metric checks were skipped.",
                    app.name,
                    app.state.as_deref().unwrap_or("Unknown")
                ),
            );
        }

        activity::check(self.client, &app.id, &window, &app_target, &mut aggregator).await;
        configuration::check(
            self.client,
            &app,
            plan.as_ref(),
            &settings.resource_group,
            &app_target,
            &mut aggregator,
        )
        .await;

        let issues = aggregator.into_issues();
        info!(issues = issues.len(), ?status, "health check finished");

        let resource = ResourceSummary {
            name: app.name.clone(),
            resource_group: settings.resource_group.clone(),
            subscription_id: Some(subscription.id.clone()),
            resource_id: Some(app.id.clone()),
            state: app.state.clone(),
        };

        Ok(RunOutcome {
            status,
            report: self.report(issues, &samples, resource, &window, now),
        })
    }

    async fn resolve_plan(&self, app: &FunctionAppInfo) -> Option<AppServicePlanInfo> {
        let plan_id = app.server_farm_id.as_deref()?;
        match self.client.app_service_plan(plan_id).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(plan_id, error = %e, "app service plan lookup failed, plan checks skipped");
                None
            }
        }
    }

    fn not_found(
        &self,
        subscription: &Subscription,
        target: &IssueTarget,
        mut aggregator: IssueAggregator,
        window: &TimeWindow,
        now: DateTime<Utc>,
        cause: Option<HealthError>,
    ) -> RunOutcome {
        let settings = &self.settings;
        let mut details = format!(
            "Function App '{}' could not be found in resource group '{}' (subscription '{}').",
            settings.function_app_name, settings.resource_group, subscription.id
        );
        if let Some(cause) = cause {
            details.push_str(&format!(" Lookup error: {cause}"));
        }
        aggregator.raise(target, Condition::ResourceNotFound, "resource", details);

        let resource = ResourceSummary {
            name: settings.function_app_name.clone(),
            resource_group: settings.resource_group.clone(),
            subscription_id: Some(subscription.id.clone()),
            resource_id: None,
            state: None,
        };

        RunOutcome {
            status: RunStatus::ResourceNotFound,
            report: self.report(aggregator.into_issues(), &SampleSet::new(), resource, window, now),
        }
    }

    fn report(
        &self,
        issues: Vec<Issue>,
        samples: &SampleSet,
        resource: ResourceSummary,
        window: &TimeWindow,
        now: DateTime<Utc>,
    ) -> Report {
        let summary = Summary {
            run_id: Uuid::new_v4(),
            checked_at: now,
            counts: IssueCounts::tally(&issues),
            ranges: ranges(samples),
            resource,
            window: WindowSummary::new(window, self.settings.lookback_minutes),
            thresholds: self.settings.thresholds.as_map(),
        };
        Report { issues, summary }
    }
}

fn subscription_label(subscription: &Subscription) -> &str {
    if subscription.name.is_empty() {
        &subscription.id
    } else {
        &subscription.name
    }
}
