//! The telemetry facade owned by the server
//!
//! `TelemetryService` is the only telemetry surface other components depend
//! on. It owns the usage snapshot, drives the periodic save task, and
//! exposes a graceful shutdown hook. Handlers receive it as an injected
//! component rather than reaching for a global.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::persistence::SnapshotStore;
use super::request::RequestContext;
use super::snapshot::UsageSnapshot;
use super::summary::{SummaryLimits, ToolUsageDetail, UsageReport, UsageTotals};
use crate::config::TelemetryConfig;
use crate::error::{TallyError, TallyResult};

/// Externally supplied counts merged into the cumulative totals
///
/// Both fields are optional but at least one must be present, and neither
/// may be negative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageDelta {
    /// Requests to add
    pub total_requests: Option<i64>,
    /// Tool calls to add
    pub total_tool_calls: Option<i64>,
}

/// Telemetry facade for the tool server
pub struct TelemetryService {
    config: TelemetryConfig,
    snapshot: Arc<RwLock<UsageSnapshot>>,
    store: SnapshotStore,
    cancel: CancellationToken,
    save_task: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryService {
    /// Load persisted state and start the periodic save task
    ///
    /// Must be called from within a tokio runtime. Call once per process;
    /// re-invocation is undefined.
    pub fn initialize(config: TelemetryConfig) -> Self {
        let store = SnapshotStore::new(config.snapshot_path());
        let snapshot = Arc::new(RwLock::new(store.load()));
        let cancel = CancellationToken::new();
        let save_task = Self::start_save_task(
            config.save_interval,
            snapshot.clone(),
            store.clone(),
            cancel.clone(),
        );

        debug!(
            "Telemetry service started, snapshot at {}",
            store.path().display()
        );

        Self {
            config,
            snapshot,
            store,
            cancel,
            save_task: Mutex::new(Some(save_task)),
        }
    }

    /// Record one inbound request
    ///
    /// Purely in-memory and infallible; nothing here can abort the
    /// caller's in-flight request handling.
    pub fn record_request(&self, ctx: &RequestContext) {
        self.snapshot.write().record_request(ctx, Utc::now());
    }

    /// Record one tool invocation
    pub fn record_tool_call(&self, tool: &str, ctx: &RequestContext) {
        self.snapshot.write().record_tool_call(
            tool,
            ctx,
            Utc::now(),
            self.config.recent_calls_capacity,
        );
    }

    /// Current usage report
    pub fn summarize(&self) -> UsageReport {
        let limits = SummaryLimits {
            top_clients: self.config.top_clients_limit,
            recent_calls: self.config.summary_calls_limit,
        };
        self.snapshot.read().summarize(limits, Utc::now())
    }

    /// Detail view of recent tool activity
    pub fn recent_tool_usage(&self) -> ToolUsageDetail {
        self.snapshot
            .read()
            .tool_usage_detail(self.config.detail_calls_limit)
    }

    /// Format the current report as a human-readable summary
    pub fn summary_text(&self) -> String {
        self.summarize().render_text()
    }

    /// Merge an external backup into the cumulative totals
    ///
    /// The delta adds, it never replaces; importing the same backup twice
    /// double-counts. On success the snapshot is flushed immediately
    /// (best-effort) and the post-merge totals are returned. A rejected
    /// delta leaves state untouched.
    pub fn import_delta(&self, delta: UsageDelta) -> TallyResult<UsageTotals> {
        let (requests, tool_calls) = validate_delta(&delta)?;

        let totals = {
            let mut snapshot = self.snapshot.write();
            snapshot.apply_delta(requests, tool_calls);
            UsageTotals {
                total_requests: snapshot.total_requests,
                total_tool_calls: snapshot.total_tool_calls,
                unique_clients: snapshot.requests_by_client.len(),
            }
        };

        self.save_now();
        Ok(totals)
    }

    /// Stop the periodic save task and flush once more
    ///
    /// Completes (or gives up with a logged failure) before returning, so
    /// the process may exit afterwards without losing the final state.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let task = self.save_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Usage save task did not stop cleanly: {}", e);
            }
        }

        self.save_now();
        debug!("Telemetry service stopped");
    }

    /// Flush the current snapshot; failures are logged, never raised
    fn save_now(&self) {
        // Copy under the read lock, serialize outside it
        let copy = self.snapshot.read().clone();
        if let Err(e) = self.store.save(&copy) {
            error!("Failed to save usage snapshot: {}", e);
        }
    }

    fn start_save_task(
        period: Duration,
        snapshot: Arc<RwLock<UsageSnapshot>>,
        store: SnapshotStore,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick of a tokio interval fires immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let copy = snapshot.read().clone();
                        if let Err(e) = store.save(&copy) {
                            warn!("Periodic usage save failed: {}", e);
                        }
                    }
                }
            }
        })
    }
}

impl Drop for TelemetryService {
    fn drop(&mut self) {
        // Stop the save task even if shutdown() was never called
        self.cancel.cancel();
    }
}

/// Check a delta for presence and sign; returns the amounts to add
fn validate_delta(delta: &UsageDelta) -> TallyResult<(u64, u64)> {
    if delta.total_requests.is_none() && delta.total_tool_calls.is_none() {
        return Err(TallyError::invalid_delta(
            "at least one of total_requests or total_tool_calls is required",
        ));
    }
    let requests = non_negative(delta.total_requests, "total_requests")?;
    let tool_calls = non_negative(delta.total_tool_calls, "total_tool_calls")?;
    Ok((requests, tool_calls))
}

fn non_negative(value: Option<i64>, name: &str) -> TallyResult<u64> {
    match value {
        None => Ok(0),
        Some(v) if v < 0 => Err(TallyError::invalid_delta(format!(
            "{name} must be non-negative, got {v}"
        ))),
        Some(v) => Ok(v as u64),
    }
}
