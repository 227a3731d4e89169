//! Threshold rules
//!
//! A rule is a static boundary taken from configuration. Three kinds exist and
//! they are kept apart on purpose:
//! - `Bound`: compare each sample against `limit` (percentages, durations, sizes)
//! - `Detected`: any nonzero sample is a violation
//! - `Excessive`: a sample above the configured per-interval rate `limit`

use serde::{Deserialize, Serialize};

/// Comparison applied by `Bound` rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "==")]
    Equal,
}

impl Comparison {
    pub fn holds(&self, value: f64, limit: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > limit,
            Comparison::LessThan => value < limit,
            Comparison::Equal => (value - limit).abs() < f64::EPSILON,
        }
    }

    /// Verb used in issue details
    pub fn verb(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => "exceeded",
            Comparison::LessThan => "fell below",
            Comparison::Equal => "matched",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Bound,
    Detected,
    Excessive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Key of the series in the sample set
    pub metric_name: String,
    /// Human label used in details ("CPU", "Response time")
    pub label: String,
    pub kind: RuleKind,
    pub comparison: Comparison,
    pub limit: f64,
    /// "%", "MB", "ms" or a count noun such as "requests"
    pub unit: String,
    /// Drop samples without a reading instead of counting them as zero
    #[serde(default)]
    pub skip_missing: bool,
}

impl ThresholdRule {
    /// `value > limit` / `value < limit` style rule
    pub fn bound(
        metric_name: impl Into<String>,
        label: impl Into<String>,
        comparison: Comparison,
        limit: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            label: label.into(),
            kind: RuleKind::Bound,
            comparison,
            limit,
            unit: unit.into(),
            // a missing reading is not a low reading
            skip_missing: comparison == Comparison::LessThan,
        }
    }

    /// Any nonzero count
    pub fn detected(metric_name: impl Into<String>, label: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            label: label.into(),
            kind: RuleKind::Detected,
            comparison: Comparison::GreaterThan,
            limit: 0.0,
            unit: unit.into(),
            skip_missing: false,
        }
    }

    /// Count above a configured rate per interval
    pub fn excessive(
        metric_name: impl Into<String>,
        label: impl Into<String>,
        rate: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            label: label.into(),
            kind: RuleKind::Excessive,
            comparison: Comparison::GreaterThan,
            limit: rate,
            unit: unit.into(),
            skip_missing: false,
        }
    }

    pub fn with_skip_missing(mut self, skip: bool) -> Self {
        self.skip_missing = skip;
        self
    }

    pub fn violates(&self, value: f64) -> bool {
        match self.kind {
            RuleKind::Bound => self.comparison.holds(value, self.limit),
            RuleKind::Detected => value > 0.0,
            RuleKind::Excessive => value > self.limit,
        }
    }

    /// Render a value with this rule's unit: `80%`, `512 MB`, `3 requests`
    pub fn with_unit(&self, value: f64) -> String {
        let number = format_number(value);
        match self.unit.as_str() {
            "" => number,
            "%" => format!("{number}%"),
            unit => format!("{number} {unit}"),
        }
    }
}

/// Integers print without decimals, everything else with two.
pub fn format_number(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_threshold_is_strict() {
        let rule = ThresholdRule::bound("cpu", "CPU", Comparison::GreaterThan, 80.0, "%");
        assert!(rule.violates(80.5));
        assert!(!rule.violates(80.0));
        assert!(!rule.violates(10.0));
    }

    #[test]
    fn test_less_than_and_equal() {
        let below = ThresholdRule::bound("health", "Health check", Comparison::LessThan, 100.0, "%");
        assert!(below.violates(99.0));
        assert!(!below.violates(100.0));

        let equal = ThresholdRule::bound("state", "State", Comparison::Equal, 0.0, "");
        assert!(equal.violates(0.0));
        assert!(!equal.violates(1.0));
    }

    #[test]
    fn test_detected_and_excessive_are_distinct() {
        let detected = ThresholdRule::detected("throttles", "Throttled requests", "requests");
        let excessive = ThresholdRule::excessive("throttles", "Throttled requests", 5.0, "requests");

        assert!(detected.violates(1.0));
        assert!(!excessive.violates(1.0));
        assert!(!excessive.violates(5.0));
        assert!(excessive.violates(6.0));
        assert!(!detected.violates(0.0));
    }

    #[test]
    fn test_only_lower_bounds_skip_missing_readings() {
        let health = ThresholdRule::bound("health", "Health check", Comparison::LessThan, 100.0, "%");
        let cpu = ThresholdRule::bound("cpu", "CPU", Comparison::GreaterThan, 80.0, "%");
        assert!(health.skip_missing);
        assert!(!cpu.skip_missing);
        assert!(!ThresholdRule::detected("5xx", "HTTP 5xx errors", "errors").skip_missing);

        let legacy: ThresholdRule = serde_json::from_str(
            r#"{"metric_name":"cpu","label":"CPU","kind":"bound","comparison":">","limit":80.0,"unit":"%"}"#,
        )
        .unwrap();
        assert!(!legacy.skip_missing);
    }

    #[test]
    fn test_comparison_serializes_as_symbol() {
        assert_eq!(serde_json::to_string(&Comparison::GreaterThan).unwrap(), "\">\"");
        assert_eq!(serde_json::from_str::<Comparison>("\"==\"").unwrap(), Comparison::Equal);
    }

    #[test]
    fn test_units() {
        let rule = ThresholdRule::bound("mem", "Memory", Comparison::GreaterThan, 512.0, "MB");
        assert_eq!(rule.with_unit(512.0), "512 MB");
        assert_eq!(rule.with_unit(12.5), "12.50 MB");
        assert_eq!(format_number(85.0), "85");
    }
}
