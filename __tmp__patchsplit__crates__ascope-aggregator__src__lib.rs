//! Pure, deterministic folding of a session's event stream into incremental
//! metrics: token usage, tool analytics, a bounded activity timeline, tool
//! latency distributions, a derived task board, context attribution, and
//! truncation detection. Consumes [`ascope_types::Event`] one at a time and
//! never performs I/O itself.

mod aggregator;
mod context;
mod latency;
mod plan;
mod tasks;
mod timeline;
mod tokens;
mod tools;
mod truncation;

pub use aggregator::{Aggregator, AggregatorSnapshot, SNAPSHOT_SCHEMA_VERSION};
pub use context::{is_system_reminder, ContextAttribution, ContextBucket};
pub use latency::{LatencyLog, LatencyRecord, LatencyStats, LATENCY_CAP};
pub use plan::{PlanState, PlanStep, PlanStepStatus};
pub use tasks::{Task, TaskBoard, TaskStatus};
pub use timeline::{NoiseLevel, Timeline, TimelineEvent, TIMELINE_CAP};
pub use tokens::{ModelUsage, TokenState};
pub use tools::{PendingCall, ToolAnalytics, ToolStats};
pub use truncation::contains_truncation_marker;


