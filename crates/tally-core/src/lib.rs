//! Tally Core Library
//!
//! This crate provides the usage telemetry engine for the Tally tool server:
//! in-memory counters for inbound requests and tool invocations, derived
//! usage summaries, and periodic snapshot persistence across restarts.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types
pub use config::TelemetryConfig;
pub use error::{TallyError, TallyResult};
pub use telemetry::{
    RequestContext, SnapshotStore, TelemetryService, ToolCallRecord, ToolUsageDetail, UsageDelta,
    UsageReport, UsageSnapshot,
};
