//! Azure CLI execution
//!
//! Every Azure read goes through `az ... --output json`:
//! - one child process per query, killed when the timeout elapses
//! - stdout parsed as JSON, stderr kept for the error
//! - "not found" failures told apart from everything else

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use funcapp_health_core::models::{
    ActivityLevel, ActivityLogEntry, AppServicePlanInfo, AppSetting, DiagnosticSetting, FunctionAppInfo,
    Subscription,
};
use funcapp_health_core::sample::parse_metrics_response;
use funcapp_health_core::{AzureClient, HealthError, MetricQuery, MetricSample, Result, TimeWindow};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Markers the CLI prints to stderr when a resource does not exist
const NOT_FOUND_MARKERS: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "could not be found", "was not found"];

/// Azure CLI backed client
pub struct AzCli {
    program: String,
    leading_args: Vec<String>,
    subscription: Option<String>,
    timeout: Duration,
}

impl AzCli {
    pub fn new(program: impl Into<String>, subscription: Option<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            subscription,
            timeout,
        }
    }

    /// Arguments placed before the az arguments (wrapper scripts)
    pub fn with_leading_args<I, S>(mut self, leading_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = leading_args.into_iter().map(Into::into).collect();
        self
    }

    /// Run one az command and parse its JSON output (`Null` for empty output)
    pub async fn run_json(&self, args: &[&str]) -> Result<Value> {
        let label = command_label(args);
        let start_time = Instant::now();

        let mut command = AsyncCommand::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .args(["--output", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(subscription) = &self.subscription {
            command.args(["--subscription", subscription.as_str()]);
        }

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| HealthError::Timeout {
                command: label.clone(),
                timeout_secs: self.timeout.as_secs(),
            })??;

        debug!(
            command = %label,
            exit_code = ?output.status.code(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "az command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&label, output.status.code(), stderr.trim()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|e| HealthError::Parse(format!("{label}: {e}")))
    }

    async fn run_typed<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let label = command_label(args);
        let value = self.run_json(args).await?;
        serde_json::from_value(value).map_err(|e| HealthError::Parse(format!("{label}: {e}")))
    }

    /// Like `run_typed`, but a missing resource is `None`
    async fn run_optional<T: DeserializeOwned>(&self, args: &[&str]) -> Result<Option<T>> {
        match self.run_json(args).await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| HealthError::Parse(format!("{}: {e}", command_label(args)))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AzureClient for AzCli {
    async fn current_subscription(&self) -> Result<Subscription> {
        self.run_typed(&["account", "show"]).await
    }

    async fn function_app(&self, name: &str, resource_group: &str) -> Result<Option<FunctionAppInfo>> {
        self.run_optional(&["functionapp", "show", "--name", name, "--resource-group", resource_group])
            .await
    }

    async fn app_service_plan(&self, plan_id: &str) -> Result<Option<AppServicePlanInfo>> {
        self.run_optional(&["appservice", "plan", "show", "--ids", plan_id]).await
    }

    async fn app_settings(&self, name: &str, resource_group: &str) -> Result<Vec<AppSetting>> {
        let settings: Option<Vec<AppSetting>> = self
            .run_typed(&[
                "functionapp",
                "config",
                "appsettings",
                "list",
                "--name",
                name,
                "--resource-group",
                resource_group,
            ])
            .await?;
        Ok(settings.unwrap_or_default())
    }

    async fn metrics(&self, query: &MetricQuery) -> Result<Vec<MetricSample>> {
        let start = cli_timestamp(query.window.start);
        let end = cli_timestamp(query.window.end);
        let doc = self
            .run_json(&[
                "monitor",
                "metrics",
                "list",
                "--resource",
                &query.resource_id,
                "--metric",
                &query.metric,
                "--aggregation",
                query.aggregation.as_cli_arg(),
                "--interval",
                &query.interval,
                "--start-time",
                &start,
                "--end-time",
                &end,
            ])
            .await?;
        parse_metrics_response(&doc, query.aggregation)
    }

    async fn activity_log(&self, resource_id: &str, window: &TimeWindow) -> Result<Vec<ActivityLogEntry>> {
        let start = cli_timestamp(window.start);
        let end = cli_timestamp(window.end);
        let doc = self
            .run_json(&[
                "monitor",
                "activity-log",
                "list",
                "--resource-id",
                resource_id,
                "--start-time",
                &start,
                "--end-time",
                &end,
            ])
            .await?;
        parse_activity_log(doc)
    }

    async fn diagnostic_settings(&self, resource_id: &str) -> Result<Vec<DiagnosticSetting>> {
        let doc = self
            .run_json(&["monitor", "diagnostic-settings", "list", "--resource", resource_id])
            .await?;
        parse_diagnostic_settings(doc)
    }
}

/// `az functionapp show` for error messages and logs
fn command_label(args: &[&str]) -> String {
    let words: Vec<&str> = args.iter().take_while(|a| !a.starts_with("--")).copied().collect();
    format!("az {}", words.join(" "))
}

fn cli_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn classify_failure(command: &str, exit_code: Option<i32>, stderr: &str) -> HealthError {
    if NOT_FOUND_MARKERS.iter().any(|m| stderr.contains(m)) {
        return HealthError::NotFound(format!("{command}: {stderr}"));
    }
    HealthError::Command {
        command: command.to_string(),
        exit_code,
        stderr: stderr.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    #[serde(default)]
    operation_name: Option<LocalizedName>,
    #[serde(default)]
    level: Option<ActivityLevel>,
    #[serde(default)]
    status: Option<LocalizedName>,
    #[serde(default)]
    caller: Option<String>,
    #[serde(default)]
    event_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedName {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    localized_value: Option<String>,
}

impl LocalizedName {
    fn text(self) -> Option<String> {
        self.localized_value
            .filter(|v| !v.is_empty())
            .or(self.value)
            .filter(|v| !v.is_empty())
    }
}

/// Flatten `az monitor activity-log list` output; entries without a timestamp are dropped
fn parse_activity_log(doc: Value) -> Result<Vec<ActivityLogEntry>> {
    if doc.is_null() {
        return Ok(Vec::new());
    }
    let raw: Vec<RawActivity> =
        serde_json::from_value(doc).map_err(|e| HealthError::Parse(format!("activity log: {e}")))?;

    Ok(raw
        .into_iter()
        .filter_map(|entry| {
            Some(ActivityLogEntry {
                event_timestamp: entry.event_timestamp?,
                operation_name: entry
                    .operation_name
                    .and_then(LocalizedName::text)
                    .unwrap_or_else(|| "Unknown operation".to_string()),
                level: entry.level.unwrap_or(ActivityLevel::Unknown),
                status: entry.status.and_then(LocalizedName::text),
                caller: entry.caller,
            })
        })
        .collect())
}

/// Older CLI versions wrap the list in `{"value": [...]}`
fn parse_diagnostic_settings(doc: Value) -> Result<Vec<DiagnosticSetting>> {
    let list = match doc {
        Value::Null => return Ok(Vec::new()),
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    serde_json::from_value(list).map_err(|e| HealthError::Parse(format!("diagnostic settings: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_label() {
        assert_eq!(
            command_label(&["functionapp", "show", "--name", "x", "--resource-group", "rg"]),
            "az functionapp show"
        );
        assert_eq!(command_label(&["account", "show"]), "az account show");
    }

    #[test]
    fn test_failure_classification() {
        let err = classify_failure(
            "az functionapp show",
            Some(3),
            "ERROR: (ResourceNotFound) The Resource 'Microsoft.Web/sites/x' under resource group 'rg' was not found.",
        );
        assert!(err.is_not_found());

        let err = classify_failure("az account show", Some(1), "ERROR: Please run 'az login' to setup account.");
        assert!(matches!(err, HealthError::Command { exit_code: Some(1), .. }));
    }

    #[test]
    fn test_parse_activity_log() {
        let doc = json!([
            {
                "operationName": { "value": "Microsoft.Web/sites/restart/action", "localizedValue": "Restart Web App" },
                "level": "Error",
                "status": { "value": "Failed" },
                "caller": "ops@example.com",
                "eventTimestamp": "2024-05-01T10:00:00Z"
            },
            {
                "operationName": { "value": "Microsoft.Web/sites/write" },
                "level": "Informational",
                "eventTimestamp": "2024-05-01T10:05:00Z"
            },
            { "level": "Critical" }
        ]);

        let entries = parse_activity_log(doc).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation_name, "Restart Web App");
        assert_eq!(entries[0].level, ActivityLevel::Error);
        assert_eq!(entries[0].status.as_deref(), Some("Failed"));
        assert_eq!(entries[1].operation_name, "Microsoft.Web/sites/write");
        assert_eq!(entries[1].status, None);

        assert!(parse_activity_log(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_parse_diagnostic_settings_shapes() {
        let wrapped = json!({ "value": [ { "name": "to-law", "workspaceId": "/ws" } ] });
        let settings = parse_diagnostic_settings(wrapped).unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].workspace_id.as_deref(), Some("/ws"));

        assert!(parse_diagnostic_settings(json!([])).unwrap().is_empty());
        assert!(parse_diagnostic_settings(json!({})).unwrap().is_empty());
        assert!(parse_diagnostic_settings(json!("nope")).is_err());
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// `sh -c <script> fake-az <az args...>`, so the script sees the az arguments as `$1..`
        fn fake_az(script: &str, timeout: Duration) -> AzCli {
            AzCli::new("sh", None, timeout).with_leading_args(["-c", script, "fake-az"])
        }

        #[tokio::test]
        async fn test_json_output_is_parsed() {
            let az = fake_az(r#"echo '{"id": "0000-1111", "name": "Production"}'"#, Duration::from_secs(5));
            let subscription = az.current_subscription().await.unwrap();
            assert_eq!(subscription.id, "0000-1111");
            assert_eq!(subscription.name, "Production");
        }

        #[tokio::test]
        async fn test_arguments_are_passed_through() {
            // $1=functionapp $2=show $3=--name $4=<name>
            let az = fake_az(
                r#"echo "{\"id\": \"/sites/$4\", \"name\": \"$4\", \"state\": \"Running\"}""#,
                Duration::from_secs(5),
            );
            let app = az.function_app("orders-fn", "rg-orders").await.unwrap().unwrap();
            assert_eq!(app.name, "orders-fn");
            assert!(app.is_running());
        }

        #[tokio::test]
        async fn test_not_found_becomes_none() {
            let az = fake_az(
                "echo \"ERROR: (ResourceNotFound) The Resource 'Microsoft.Web/sites/ghost' was not found.\" >&2; exit 3",
                Duration::from_secs(5),
            );
            assert!(az.function_app("ghost", "rg").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_command_failure() {
            let az = fake_az("echo 'ERROR: AuthorizationFailed' >&2; exit 1", Duration::from_secs(5));
            let err = az.current_subscription().await.unwrap_err();
            match err {
                HealthError::Command { command, exit_code, stderr } => {
                    assert_eq!(command, "az account show");
                    assert_eq!(exit_code, Some(1));
                    assert!(stderr.contains("AuthorizationFailed"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_command_timeout() {
            let az = fake_az("sleep 10", Duration::from_secs(1));
            let start = Instant::now();
            let err = az.run_json(&["account", "show"]).await.unwrap_err();
            assert!(matches!(err, HealthError::Timeout { timeout_secs: 1, .. }));
            assert!(start.elapsed() < Duration::from_secs(5));
        }

        #[tokio::test]
        async fn test_malformed_output() {
            let az = fake_az("echo 'not json'", Duration::from_secs(5));
            assert!(matches!(
                az.run_json(&["account", "show"]).await.unwrap_err(),
                HealthError::Parse(_)
            ));
        }

        #[tokio::test]
        async fn test_metrics_query() {
            let az = fake_az(
                r#"echo '{"value": [{"timeseries": [{"data": [
                    {"timeStamp": "2024-05-01T10:05:00Z", "average": 90.0},
                    {"timeStamp": "2024-05-01T10:00:00Z", "average": 85.0}
                ]}]}]}'"#,
                Duration::from_secs(5),
            );
            let now = "2024-05-01T10:30:00Z".parse::<DateTime<Utc>>().unwrap();
            let query = MetricQuery {
                resource_id: "/sites/orders-fn".into(),
                metric: "CpuPercentage".into(),
                aggregation: funcapp_health_core::Aggregation::Average,
                window: TimeWindow::last_minutes(now, 30),
                interval: "PT5M".into(),
            };

            let samples = az.metrics(&query).await.unwrap();
            assert_eq!(samples.len(), 2);
            assert_eq!(samples[0].value, Some(85.0));
        }

        #[tokio::test]
        async fn test_empty_settings_output() {
            let az = fake_az("exit 0", Duration::from_secs(5));
            assert!(az.app_settings("orders-fn", "rg").await.unwrap().is_empty());
        }
    }
}
