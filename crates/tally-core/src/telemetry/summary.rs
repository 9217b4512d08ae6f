//! Derived read-only views over the usage aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::snapshot::{ToolCallRecord, UsageSnapshot};

/// Hour buckets included in a summary
const HOURLY_WINDOW: usize = 24;

/// Caps applied when deriving a summary
#[derive(Debug, Clone, Copy)]
pub struct SummaryLimits {
    /// Top clients included
    pub top_clients: usize,
    /// Recent tool calls included
    pub recent_calls: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            top_clients: 20,
            recent_calls: 20,
        }
    }
}

/// Cumulative totals of a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_requests: u64,
    pub total_tool_calls: u64,
    pub unique_clients: usize,
}

/// One tool's invocation count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCount {
    pub tool: String,
    pub count: u64,
}

/// One client's request count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCount {
    pub client: String,
    pub count: u64,
}

/// One calendar hour's request count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: String,
    pub count: u64,
}

/// Per-dimension request breakdowns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub by_method: HashMap<String, u64>,
    pub by_endpoint: HashMap<String, u64>,
    /// Sorted descending by count
    pub by_tool: Vec<ToolCount>,
}

/// Client-facing activity breakdowns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageClients {
    /// Top clients, sorted descending by count
    pub by_ip: Vec<ClientCount>,
    pub by_user_agent: HashMap<String, u64>,
}

/// Usage report served to the HTTP layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageReport {
    pub server_start_time: DateTime<Utc>,
    /// Human-readable time since `server_start_time`
    pub uptime: String,
    pub summary: UsageTotals,
    pub breakdown: UsageBreakdown,
    pub clients: UsageClients,
    /// Most recent 24 hour buckets, oldest first
    pub hourly_requests: Vec<HourBucket>,
    /// Newest first
    pub recent_tool_calls: Vec<ToolCallRecord>,
}

impl UsageReport {
    /// Format the report as a compact human-readable summary
    pub fn render_text(&self) -> String {
        let top_tool = self
            .breakdown
            .by_tool
            .first()
            .map(|t| format!("{} ({} calls)", t.tool, t.count))
            .unwrap_or_else(|| "none".to_string());

        format!(
            "Usage summary (uptime: {})\n\
             Requests: {} total across {} endpoints, {} unique clients\n\
             Tool calls: {} total, most used: {}\n\
             Recent tool calls tracked: {}",
            self.uptime,
            self.summary.total_requests,
            self.breakdown.by_endpoint.len(),
            self.summary.unique_clients,
            self.summary.total_tool_calls,
            top_tool,
            self.recent_tool_calls.len(),
        )
    }
}

/// Detail view of recent tool activity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageDetail {
    pub total_tool_calls: u64,
    /// Sorted descending by count
    pub by_tool: Vec<ToolCount>,
    /// Newest first
    pub recent_calls: Vec<ToolCallRecord>,
}

impl UsageSnapshot {
    /// Derive the usage report
    ///
    /// Never mutates; safe to call concurrently with recording as long as
    /// the caller holds the read side of the snapshot lock.
    pub fn summarize(&self, limits: SummaryLimits, now: DateTime<Utc>) -> UsageReport {
        let mut top_clients: Vec<ClientCount> = sorted_counts(&self.requests_by_client)
            .into_iter()
            .map(|(client, count)| ClientCount { client, count })
            .collect();
        top_clients.truncate(limits.top_clients);

        UsageReport {
            server_start_time: self.start_time,
            uptime: format_uptime(self.start_time, now),
            summary: UsageTotals {
                total_requests: self.total_requests,
                total_tool_calls: self.total_tool_calls,
                unique_clients: self.requests_by_client.len(),
            },
            breakdown: UsageBreakdown {
                by_method: self.requests_by_method.clone(),
                by_endpoint: self.requests_by_endpoint.clone(),
                by_tool: sorted_counts(&self.tool_calls_by_tool)
                    .into_iter()
                    .map(|(tool, count)| ToolCount { tool, count })
                    .collect(),
            },
            clients: UsageClients {
                by_ip: top_clients,
                by_user_agent: self.requests_by_user_agent.clone(),
            },
            hourly_requests: recent_hours(&self.requests_by_hour, HOURLY_WINDOW),
            recent_tool_calls: self
                .recent_tool_calls
                .iter()
                .take(limits.recent_calls)
                .cloned()
                .collect(),
        }
    }

    /// Derive the tool activity detail view
    pub fn tool_usage_detail(&self, recent_limit: usize) -> ToolUsageDetail {
        ToolUsageDetail {
            total_tool_calls: self.total_tool_calls,
            by_tool: sorted_counts(&self.tool_calls_by_tool)
                .into_iter()
                .map(|(tool, count)| ToolCount { tool, count })
                .collect(),
            recent_calls: self
                .recent_tool_calls
                .iter()
                .take(recent_limit)
                .cloned()
                .collect(),
        }
    }
}

/// Sort a tally map into descending (key, count) pairs; ties break by key
fn sorted_counts(map: &HashMap<String, u64>) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> =
        map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries
}

/// Most recent `window` hour buckets in chronological order
///
/// Hour keys are ISO-8601 prefixes, so lexicographic order is
/// chronological order.
fn recent_hours(map: &HashMap<String, u64>, window: usize) -> Vec<HourBucket> {
    let mut hours: Vec<(String, u64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    hours.sort_by(|a, b| a.0.cmp(&b.0));
    if hours.len() > window {
        hours.drain(..hours.len() - window);
    }
    hours
        .into_iter()
        .map(|(hour, count)| HourBucket { hour, count })
        .collect()
}

/// Time since `start`, coarsest non-zero unit first
///
/// Collapses to minutes when under an hour; a clock reading before `start`
/// reports `"0m"`.
pub fn format_uptime(start: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_minutes = (now - start).num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}
