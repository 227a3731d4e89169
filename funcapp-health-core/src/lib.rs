//! Threshold-based health checks for Azure Function Apps
//!
//! A pass runs once per invocation:
//! - [`sampler`] pulls metric series through an injected [`client::AzureClient`]
//! - [`evaluator`] collapses every violating sample of a series into one [`evaluator::Violation`]
//! - [`aggregator`] turns violations into deduplicated [`issue::Issue`]s with a fixed severity policy
//! - [`report`] writes the JSON document, falling back to an empty valid report
//!
//! [`pipeline::HealthCheck`] wires the stages together for one Function App.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod evaluator;
pub mod issue;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod rule;
pub mod sample;
pub mod sampler;
pub mod settings;

pub use aggregator::{IssueAggregator, IssueTarget};
pub use client::{AzureClient, MetricQuery};
pub use error::{HealthError, Result};
pub use issue::{Condition, ConditionCategory, Issue, Severity};
pub use pipeline::{HealthCheck, RunOutcome, RunStatus};
pub use report::{Emitted, Report, ReportEmitter};
pub use sample::{Aggregation, MetricSample, SampleSet, TimeWindow};
pub use settings::{CheckSettings, CostSettings, Thresholds};
