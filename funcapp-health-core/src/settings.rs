use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Inputs of one health-check pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub function_app_name: String,
    pub resource_group: String,
    /// Overrides the CLI's default subscription when set
    pub subscription_id: Option<String>,
    pub lookback_minutes: u32,
    /// ISO-8601 metric granularity
    pub interval: String,
    pub thresholds: Thresholds,
    pub cost: CostSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_mb: f64,
    pub duration_ms: f64,
    pub error_rate_percent: f64,
    /// HTTP 4xx responses per interval
    pub client_errors_per_interval: f64,
    pub health_check_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    pub enabled: bool,
    pub baseline_days: u32,
    pub anomaly_multiplier: f64,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            function_app_name: String::new(),
            resource_group: String::new(),
            subscription_id: None,
            lookback_minutes: 30,
            interval: "PT5M".to_string(),
            thresholds: Thresholds::default(),
            cost: CostSettings::default(),
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 80.0,
            memory_percent: 80.0,
            memory_mb: 1024.0,
            duration_ms: 5000.0,
            error_rate_percent: 10.0,
            client_errors_per_interval: 200.0,
            health_check_percent: 100.0,
        }
    }
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            baseline_days: 7,
            anomaly_multiplier: 2.0,
        }
    }
}

impl Thresholds {
    /// Flat view for the report summary
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("cpu_percent".to_string(), self.cpu_percent),
            ("memory_percent".to_string(), self.memory_percent),
            ("memory_mb".to_string(), self.memory_mb),
            ("duration_ms".to_string(), self.duration_ms),
            ("error_rate_percent".to_string(), self.error_rate_percent),
            ("client_errors_per_interval".to_string(), self.client_errors_per_interval),
            ("health_check_percent".to_string(), self.health_check_percent),
        ])
    }
}
