//! Usage telemetry for the tool server
//!
//! Records inbound requests and tool invocations against a shared aggregate,
//! derives summaries on demand, and persists the aggregate across restarts.

pub mod persistence;
pub mod request;
pub mod service;
pub mod snapshot;
pub mod summary;

pub use persistence::SnapshotStore;
pub use request::RequestContext;
pub use service::{TelemetryService, UsageDelta};
pub use snapshot::{ToolCallRecord, UsageSnapshot};
pub use summary::{
    ClientCount, HourBucket, SummaryLimits, ToolCount, ToolUsageDetail, UsageBreakdown,
    UsageClients, UsageReport, UsageTotals,
};
