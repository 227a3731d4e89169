//! Metric sampling
//!
//! Errors from the client are not retried: the metric degrades to "no data"
//! and the pass moves on to the next one.

use tracing::{debug, warn};

use crate::client::{AzureClient, MetricQuery};
use crate::sample::{Aggregation, MetricSample, TimeWindow};

pub struct MetricSampler<'a, C: AzureClient + ?Sized> {
    client: &'a C,
    interval: String,
}

impl<'a, C: AzureClient + ?Sized> MetricSampler<'a, C> {
    pub fn new(client: &'a C, interval: impl Into<String>) -> Self {
        Self {
            client,
            interval: interval.into(),
        }
    }

    /// Samples for `metric` on `resource_id` over `window`, possibly empty
    pub async fn sample(
        &self,
        resource_id: &str,
        metric: &str,
        aggregation: Aggregation,
        window: TimeWindow,
    ) -> Vec<MetricSample> {
        self.sample_every(resource_id, metric, aggregation, window, &self.interval).await
    }

    /// Same as [`sample`](Self::sample) with an explicit interval
    pub async fn sample_every(
        &self,
        resource_id: &str,
        metric: &str,
        aggregation: Aggregation,
        window: TimeWindow,
        interval: &str,
    ) -> Vec<MetricSample> {
        self.try_sample_every(resource_id, metric, aggregation, window, interval)
            .await
            .unwrap_or_default()
    }

    /// Like [`sample`](Self::sample), but `None` when the query failed so
    /// callers can tell "no data" from "could not ask"
    pub async fn try_sample(
        &self,
        resource_id: &str,
        metric: &str,
        aggregation: Aggregation,
        window: TimeWindow,
    ) -> Option<Vec<MetricSample>> {
        self.try_sample_every(resource_id, metric, aggregation, window, &self.interval).await
    }

    async fn try_sample_every(
        &self,
        resource_id: &str,
        metric: &str,
        aggregation: Aggregation,
        window: TimeWindow,
        interval: &str,
    ) -> Option<Vec<MetricSample>> {
        let query = MetricQuery {
            resource_id: resource_id.to_string(),
            metric: metric.to_string(),
            aggregation,
            window,
            interval: interval.to_string(),
        };

        match self.client.metrics(&query).await {
            Ok(mut samples) => {
                samples.sort_by_key(|s| s.timestamp);
                debug!(metric, points = samples.len(), "metric sampled");
                Some(samples)
            }
            Err(e) => {
                warn!(metric, resource_id, error = %e, "metric query failed, treating as no data");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HealthError, Result};
    use crate::models::{
        ActivityLogEntry, AppServicePlanInfo, AppSetting, DiagnosticSetting, FunctionAppInfo, Subscription,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn refused(command: &str) -> HealthError {
        HealthError::Command {
            command: command.to_string(),
            exit_code: Some(1),
            stderr: "InternalServerError".to_string(),
        }
    }

    /// Serves one canned series for "Requests"; every other metric fails
    #[derive(Default)]
    struct CannedMetrics {
        intervals: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AzureClient for CannedMetrics {
        async fn current_subscription(&self) -> Result<Subscription> {
            Err(refused("az account show"))
        }

        async fn function_app(&self, _name: &str, _resource_group: &str) -> Result<Option<FunctionAppInfo>> {
            Ok(None)
        }

        async fn app_service_plan(&self, _plan_id: &str) -> Result<Option<AppServicePlanInfo>> {
            Ok(None)
        }

        async fn app_settings(&self, _name: &str, _resource_group: &str) -> Result<Vec<AppSetting>> {
            Ok(Vec::new())
        }

        async fn metrics(&self, query: &MetricQuery) -> Result<Vec<MetricSample>> {
            self.intervals.lock().unwrap().push(query.interval.clone());
            if query.metric != "Requests" {
                return Err(refused("az monitor metrics list"));
            }
            Ok(vec![
                MetricSample::new(now() - Duration::minutes(5), Some(3.0)),
                MetricSample::new(now() - Duration::minutes(15), Some(1.0)),
                MetricSample::new(now() - Duration::minutes(10), None),
            ])
        }

        async fn activity_log(&self, _resource_id: &str, _window: &TimeWindow) -> Result<Vec<ActivityLogEntry>> {
            Ok(Vec::new())
        }

        async fn diagnostic_settings(&self, _resource_id: &str) -> Result<Vec<DiagnosticSetting>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_samples_come_back_in_time_order() {
        let client = CannedMetrics::default();
        let sampler = MetricSampler::new(&client, "PT5M");
        let window = TimeWindow::last_minutes(now(), 30);

        let samples = sampler.sample("app", "Requests", Aggregation::Total, window).await;
        let values: Vec<Option<f64>> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![Some(1.0), None, Some(3.0)]);

        sampler
            .sample_every("app", "Requests", Aggregation::Total, window, "PT1H")
            .await;
        assert_eq!(*client.intervals.lock().unwrap(), vec!["PT5M", "PT1H"]);
    }

    #[tokio::test]
    async fn test_failed_query_degrades_to_no_data() {
        let client = CannedMetrics::default();
        let sampler = MetricSampler::new(&client, "PT5M");
        let window = TimeWindow::last_minutes(now(), 30);

        assert!(sampler.sample("app", "Http5xx", Aggregation::Total, window).await.is_empty());
        assert!(sampler.try_sample("app", "Http5xx", Aggregation::Total, window).await.is_none());
        assert_eq!(
            sampler.try_sample("app", "Requests", Aggregation::Total, window).await.map(|s| s.len()),
            Some(3)
        );
    }
}
