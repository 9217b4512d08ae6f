//! The in-memory usage aggregate and its mutation operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::request::RequestContext;

/// One recorded tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Invoked tool name
    pub tool: String,
    /// When the call was recorded
    pub timestamp: DateTime<Utc>,
    /// Client identity the call was attributed to
    pub client: String,
    /// Truncated user agent
    pub user_agent: String,
}

/// The complete usage aggregate at a point in time
///
/// This is both the live in-memory state and the persisted document. Every
/// field other than `start_time` starts at its zero value; a field missing
/// from a persisted document deserializes to that zero value, so schema
/// drift never aborts a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSnapshot {
    /// When this service lifetime began; preserved across restarts so
    /// uptime reflects cumulative service life, not process age
    pub start_time: DateTime<Utc>,
    /// Total inbound requests recorded
    pub total_requests: u64,
    /// Total tool invocations recorded
    pub total_tool_calls: u64,
    /// Request counts keyed by HTTP method
    pub requests_by_method: HashMap<String, u64>,
    /// Request counts keyed by logical endpoint
    pub requests_by_endpoint: HashMap<String, u64>,
    /// Tool invocation counts keyed by tool name
    pub tool_calls_by_tool: HashMap<String, u64>,
    /// Request counts keyed by client identity
    pub requests_by_client: HashMap<String, u64>,
    /// Request counts keyed by truncated user agent
    pub requests_by_user_agent: HashMap<String, u64>,
    /// Request counts keyed by UTC calendar hour (`YYYY-MM-DDTHH`)
    pub requests_by_hour: HashMap<String, u64>,
    /// Most recent tool calls, newest first, bounded by the configured
    /// capacity
    pub recent_tool_calls: VecDeque<ToolCallRecord>,
}

impl Default for UsageSnapshot {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            total_requests: 0,
            total_tool_calls: 0,
            requests_by_method: HashMap::new(),
            requests_by_endpoint: HashMap::new(),
            tool_calls_by_tool: HashMap::new(),
            requests_by_client: HashMap::new(),
            requests_by_user_agent: HashMap::new(),
            requests_by_hour: HashMap::new(),
            recent_tool_calls: VecDeque::new(),
        }
    }
}

impl UsageSnapshot {
    /// Hour bucket key for a timestamp, e.g. `"2026-08-07T14"`
    pub fn hour_key(at: DateTime<Utc>) -> String {
        at.format("%Y-%m-%dT%H").to_string()
    }

    /// Record one inbound request
    ///
    /// Every increment is unconditional; no dedup across calls happens at
    /// this layer.
    pub fn record_request(&mut self, ctx: &RequestContext, now: DateTime<Utc>) {
        self.total_requests += 1;
        bump(&mut self.requests_by_method, &ctx.method);
        bump(&mut self.requests_by_endpoint, &ctx.endpoint);
        bump(&mut self.requests_by_client, &ctx.client_identity());
        bump(&mut self.requests_by_user_agent, &ctx.user_agent_prefix());
        bump(&mut self.requests_by_hour, &Self::hour_key(now));
    }

    /// Record one tool invocation and keep the recent ring bounded
    ///
    /// The prepend and the eviction are one step; the caller holds the lock
    /// for the whole call.
    pub fn record_tool_call(
        &mut self,
        tool: &str,
        ctx: &RequestContext,
        now: DateTime<Utc>,
        capacity: usize,
    ) {
        self.total_tool_calls += 1;
        bump(&mut self.tool_calls_by_tool, tool);
        self.recent_tool_calls.push_front(ToolCallRecord {
            tool: tool.to_string(),
            timestamp: now,
            client: ctx.client_identity(),
            user_agent: ctx.user_agent_prefix(),
        });
        self.recent_tool_calls.truncate(capacity);
    }

    /// Add externally supplied counts to the cumulative totals
    ///
    /// Keyed tallies are untouched; a delta merges an external backup on
    /// top of current state, it never replaces it.
    pub fn apply_delta(&mut self, requests: u64, tool_calls: u64) {
        self.total_requests += requests;
        self.total_tool_calls += tool_calls;
    }
}

fn bump(map: &mut HashMap<String, u64>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}
