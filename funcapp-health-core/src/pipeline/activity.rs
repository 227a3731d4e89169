//! Activity log findings: one issue per level, never one per event

use std::collections::BTreeMap;

use tracing::warn;

use crate::aggregator::{IssueAggregator, IssueTarget};
use crate::client::AzureClient;
use crate::issue::Condition;
use crate::models::{ActivityLevel, ActivityLogEntry};
use crate::sample::TimeWindow;

const REPORTED_LEVELS: &[(ActivityLevel, Condition, &str)] = &[
    (ActivityLevel::Critical, Condition::ActivityLogCritical, "critical"),
    (ActivityLevel::Error, Condition::ActivityLogErrors, "error"),
];

pub async fn check<C: AzureClient + ?Sized>(
    client: &C,
    resource_id: &str,
    window: &TimeWindow,
    target: &IssueTarget,
    aggregator: &mut IssueAggregator,
) {
    let entries = match client.activity_log(resource_id, window).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(resource_id, error = %e, "activity log query failed, skipping");
            return;
        }
    };

    for (level, condition, label) in REPORTED_LEVELS {
        if let Some(details) = summarize(&entries, *level, label, window.minutes()) {
            aggregator.raise(target, *condition, "activity-log", details);
        }
    }
}

/// Details text for all entries of `level`, or `None` when there are none
pub fn summarize(entries: &[ActivityLogEntry], level: ActivityLevel, label: &str, minutes: i64) -> Option<String> {
    let matching: Vec<&ActivityLogEntry> = entries.iter().filter(|e| e.level == level).collect();
    let latest = matching.iter().max_by_key(|e| e.event_timestamp)?;

    let mut operations: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &matching {
        *operations.entry(entry.operation_name.as_str()).or_default() += 1;
    }
    let operations = operations
        .iter()
        .map(|(op, count)| format!("{op} (x{count})"))
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!(
        "{} {label} activity log event(s) in the last {minutes} minute(s): {operations}. Latest: {} by {} at {}.",
        matching.len(),
        latest.operation_name,
        latest.caller.as_deref().unwrap_or("unknown caller"),
        latest.event_timestamp.to_rfc3339(),
    ))
}
