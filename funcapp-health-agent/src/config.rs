//! Configuration loading
//!
//! Layers, later wins:
//! - built-in defaults
//! - TOML file at `$FUNCAPP_HEALTH_CONFIG` or `<config dir>/funcapp-health/config.toml`
//! - environment variables (a `.env` file is loaded first by `main`)

use anyhow::{anyhow, Context, Result};
use funcapp_health_core::CheckSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const CONFIG_PATH_VAR: &str = "FUNCAPP_HEALTH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub check: CheckSettings,
    pub azure: AzureCliConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureCliConfig {
    /// Path or name of the Azure CLI executable
    pub program: String,
    /// Placed before the az arguments, e.g. when az runs inside a container
    pub leading_args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            check: CheckSettings::default(),
            azure: AzureCliConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for AzureCliConfig {
    fn default() -> Self {
        Self {
            program: "az".to_string(),
            leading_args: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("function_app_health.json"),
        }
    }
}

impl AgentConfig {
    /// File layer + process environment
    pub async fn load() -> Result<Self> {
        let base = match Self::config_file_path() {
            Some(path) if path.exists() => {
                let content = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Self::from_toml(&content).with_context(|| format!("Invalid config file {}", path.display()))?
            }
            _ => Self::default(),
        };

        base.apply_env(|key| std::env::var(key).ok())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Explicit path from the environment, else the OS config directory
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(path));
        }
        let mut path = dirs::config_dir()?;
        path.push("funcapp-health");
        path.push("config.toml");
        Some(path)
    }

    /// Override fields from `lookup` (the process environment in production)
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let check = &mut self.check;
        let thresholds = &mut check.thresholds;

        if let Some(name) = non_empty(&lookup, "FUNCTION_APP_NAME") {
            check.function_app_name = name;
        }
        if let Some(rg) = non_empty(&lookup, "AZ_RESOURCE_GROUP") {
            check.resource_group = rg;
        }
        if let Some(sub) = non_empty(&lookup, "AZURE_RESOURCE_SUBSCRIPTION_ID") {
            check.subscription_id = Some(sub);
        }
        if let Some(interval) = non_empty(&lookup, "METRIC_INTERVAL") {
            check.interval = interval;
        }

        override_with(&lookup, "TIME_PERIOD_MINUTES", &mut check.lookback_minutes)?;
        override_with(&lookup, "CPU_THRESHOLD", &mut thresholds.cpu_percent)?;
        override_with(&lookup, "MEMORY_PERCENT_THRESHOLD", &mut thresholds.memory_percent)?;
        override_with(&lookup, "MEMORY_THRESHOLD_MB", &mut thresholds.memory_mb)?;
        override_with(&lookup, "DURATION_THRESHOLD_MS", &mut thresholds.duration_ms)?;
        override_with(&lookup, "ERROR_RATE_THRESHOLD", &mut thresholds.error_rate_percent)?;
        override_with(&lookup, "HTTP4XX_THRESHOLD", &mut thresholds.client_errors_per_interval)?;
        override_with(&lookup, "HEALTH_CHECK_THRESHOLD", &mut thresholds.health_check_percent)?;
        override_with(&lookup, "COST_CHECK_ENABLED", &mut check.cost.enabled)?;
        override_with(&lookup, "COST_BASELINE_DAYS", &mut check.cost.baseline_days)?;
        override_with(&lookup, "COST_ANOMALY_MULTIPLIER", &mut check.cost.anomaly_multiplier)?;
        override_with(&lookup, "AZ_COMMAND_TIMEOUT_SECS", &mut self.azure.timeout_secs)?;

        if let Some(program) = non_empty(&lookup, "AZ_CLI_PATH") {
            self.azure.program = program;
        }
        if let Some(file) = non_empty(&lookup, "OUTPUT_FILE") {
            self.output.file = PathBuf::from(file);
        }

        Ok(self)
    }

    /// Required identifiers; failing this is a fatal precondition
    pub fn validate(&self) -> Result<()> {
        if self.check.function_app_name.trim().is_empty() {
            return Err(anyhow!("FUNCTION_APP_NAME is required"));
        }
        if self.check.resource_group.trim().is_empty() {
            return Err(anyhow!("AZ_RESOURCE_GROUP is required"));
        }
        if self.check.lookback_minutes == 0 {
            return Err(anyhow!("TIME_PERIOD_MINUTES must be greater than zero"));
        }
        Ok(())
    }
}

fn non_empty<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn override_with<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = non_empty(lookup, key) {
        *target = raw
            .parse()
            .map_err(|e| anyhow!("Invalid value for {key} ({raw:?}): {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.azure.program, "az");
        assert_eq!(config.azure.timeout_secs, 60);
        assert_eq!(config.check.lookback_minutes, 30);
        assert_eq!(config.check.thresholds.cpu_percent, 80.0);
        assert_eq!(config.output.file, PathBuf::from("function_app_health.json"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = AgentConfig::default()
            .apply_env(env(&[
                ("FUNCTION_APP_NAME", "orders-fn"),
                ("AZ_RESOURCE_GROUP", "rg-orders"),
                ("AZURE_RESOURCE_SUBSCRIPTION_ID", "0000-1111"),
                ("TIME_PERIOD_MINUTES", "60"),
                ("CPU_THRESHOLD", "90.5"),
                ("COST_CHECK_ENABLED", "false"),
                ("OUTPUT_FILE", "/tmp/out.json"),
                ("METRIC_INTERVAL", "  "),
            ]))
            .unwrap();

        assert_eq!(config.check.function_app_name, "orders-fn");
        assert_eq!(config.check.resource_group, "rg-orders");
        assert_eq!(config.check.subscription_id.as_deref(), Some("0000-1111"));
        assert_eq!(config.check.lookback_minutes, 60);
        assert_eq!(config.check.thresholds.cpu_percent, 90.5);
        assert!(!config.check.cost.enabled);
        assert_eq!(config.check.interval, "PT5M");
        assert_eq!(config.output.file, PathBuf::from("/tmp/out.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = AgentConfig::default()
            .apply_env(env(&[("CPU_THRESHOLD", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("CPU_THRESHOLD"));
    }

    #[test]
    fn test_toml_layer() {
        let config = AgentConfig::from_toml(
            r#"
            [check]
            function_app_name = "billing-fn"
            resource_group = "rg-billing"
            lookback_minutes = 15

            [check.thresholds]
            duration_ms = 2500.0

            [azure]
            program = "docker"
            leading_args = ["run", "--rm", "mcr.microsoft.com/azure-cli", "az"]
            timeout_secs = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.check.function_app_name, "billing-fn");
        assert_eq!(config.check.lookback_minutes, 15);
        assert_eq!(config.check.thresholds.duration_ms, 2500.0);
        assert_eq!(config.check.thresholds.cpu_percent, 80.0);
        assert_eq!(config.azure.timeout_secs, 20);
        assert_eq!(config.azure.program, "docker");
        assert_eq!(config.azure.leading_args.len(), 4);

        // environment still wins over the file
        let config = config.apply_env(env(&[("TIME_PERIOD_MINUTES", "45")])).unwrap();
        assert_eq!(config.check.lookback_minutes, 45);
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let config = AgentConfig::default()
            .apply_env(env(&[
                ("FUNCTION_APP_NAME", "orders-fn"),
                ("AZ_RESOURCE_GROUP", "rg"),
                ("TIME_PERIOD_MINUTES", "0"),
            ]))
            .unwrap();
        assert!(config.validate().is_err());
    }
}
