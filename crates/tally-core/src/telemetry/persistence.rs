//! Snapshot persistence
//!
//! Stores the usage aggregate as a pretty-printed JSON document. Loading is
//! best-effort: a missing or damaged file yields a fresh default snapshot,
//! and an individually damaged field falls back to its zero value while the
//! rest of the document is kept.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::snapshot::UsageSnapshot;
use crate::error::{TallyError, TallyResult};

/// Durable storage for the usage snapshot
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted snapshot, falling back to defaults
    ///
    /// Never fails: persistence problems are logged and startup proceeds
    /// with a fresh snapshot. An absent file is a valid fresh start.
    pub fn load(&self) -> UsageSnapshot {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No usage snapshot at {}, starting fresh", self.path.display());
                return UsageSnapshot::default();
            }
            Err(e) => {
                warn!(
                    "Failed to read usage snapshot {}: {}",
                    self.path.display(),
                    e
                );
                return UsageSnapshot::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(doc)) => merge_fields(doc),
            Ok(_) => {
                warn!(
                    "Usage snapshot {} is not a JSON object, starting fresh",
                    self.path.display()
                );
                UsageSnapshot::default()
            }
            Err(e) => {
                warn!(
                    "Failed to parse usage snapshot {}: {}",
                    self.path.display(),
                    e
                );
                UsageSnapshot::default()
            }
        }
    }

    /// Write the full snapshot, creating the data directory if needed
    ///
    /// A failed write leaves the previous file (if any) in place; the
    /// caller keeps its in-memory state and the next flush retries.
    pub fn save(&self, snapshot: &UsageSnapshot) -> TallyResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    TallyError::save(
                        &self.path,
                        format!("failed to create {}: {}", parent.display(), e),
                    )
                })?;
            }
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| TallyError::save(&self.path, format!("serialization failed: {e}")))?;

        fs::write(&self.path, content)
            .map_err(|e| TallyError::save(&self.path, e.to_string()))?;

        debug!("Saved usage snapshot to {}", self.path.display());
        Ok(())
    }
}

/// Merge recovered fields over defaults, one field at a time
fn merge_fields(mut doc: serde_json::Map<String, Value>) -> UsageSnapshot {
    let defaults = UsageSnapshot::default();
    UsageSnapshot {
        start_time: field(&mut doc, "start_time", defaults.start_time),
        total_requests: field(&mut doc, "total_requests", 0),
        total_tool_calls: field(&mut doc, "total_tool_calls", 0),
        requests_by_method: field(&mut doc, "requests_by_method", Default::default()),
        requests_by_endpoint: field(&mut doc, "requests_by_endpoint", Default::default()),
        tool_calls_by_tool: field(&mut doc, "tool_calls_by_tool", Default::default()),
        requests_by_client: field(&mut doc, "requests_by_client", Default::default()),
        requests_by_user_agent: field(&mut doc, "requests_by_user_agent", Default::default()),
        requests_by_hour: field(&mut doc, "requests_by_hour", Default::default()),
        recent_tool_calls: field(&mut doc, "recent_tool_calls", Default::default()),
    }
}

/// Extract one field, keeping the fallback when absent or malformed
fn field<T: DeserializeOwned>(
    doc: &mut serde_json::Map<String, Value>,
    key: &str,
    fallback: T,
) -> T {
    match doc.remove(key) {
        None | Some(Value::Null) => fallback,
        Some(value) => match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Ignoring malformed snapshot field {}: {}", key, e);
                fallback
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::request::RequestContext;
    use chrono::{DateTime, Duration, Utc};
    use tempfile::tempdir;

    fn populated_snapshot() -> UsageSnapshot {
        let mut snapshot = UsageSnapshot::default();
        let ctx = RequestContext::new("POST", "/mcp")
            .with_peer_addr("10.0.0.1")
            .with_user_agent("curl/8.5.0");
        let now = Utc::now();
        for _ in 0..5 {
            snapshot.record_request(&ctx, now);
        }
        snapshot.record_tool_call("search", &ctx, now, 100);
        snapshot
    }

    #[test]
    fn test_load_absent_file_defaults() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("analytics.json"));

        let snapshot = store.load();

        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_tool_calls, 0);
        assert!(snapshot.recent_tool_calls.is_empty());
        assert!((Utc::now() - snapshot.start_time) < Duration::seconds(5));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("analytics.json"));
        let snapshot = populated_snapshot();

        store.save(&snapshot).unwrap();
        let loaded = store.load();

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_idempotent_recovery() {
        let dir = tempdir().unwrap();
        let first = SnapshotStore::new(dir.path().join("analytics.json"));
        let second = SnapshotStore::new(dir.path().join("resaved.json"));

        first.save(&populated_snapshot()).unwrap();
        let recovered = first.load();
        second.save(&recovered).unwrap();

        // Field-for-field identical content, independent of map ordering
        let a: Value =
            serde_json::from_str(&fs::read_to_string(first.path()).unwrap()).unwrap();
        let b: Value =
            serde_json::from_str(&fs::read_to_string(second.path()).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(second.load(), recovered);
    }

    #[test]
    fn test_load_tolerates_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.json");
        fs::write(
            &path,
            r#"{"total_requests": 12, "requests_by_method": {"POST": 12}}"#,
        )
        .unwrap();

        let snapshot = SnapshotStore::new(&path).load();

        assert_eq!(snapshot.total_requests, 12);
        assert_eq!(snapshot.requests_by_method["POST"], 12);
        assert!(snapshot.recent_tool_calls.is_empty());
        assert!(snapshot.requests_by_hour.is_empty());
    }

    #[test]
    fn test_load_tolerates_malformed_field() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.json");
        fs::write(
            &path,
            r#"{"total_requests": "many", "total_tool_calls": 4}"#,
        )
        .unwrap();

        let snapshot = SnapshotStore::new(&path).load();

        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.total_tool_calls, 4);
    }

    #[test]
    fn test_load_tolerates_garbage_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.json");
        fs::write(&path, "not json at all {{{").unwrap();

        let snapshot = SnapshotStore::new(&path).load();

        assert_eq!(snapshot.total_requests, 0);
    }

    #[test]
    fn test_load_preserves_start_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analytics.json");
        let started: DateTime<Utc> = "2025-11-02T08:00:00Z".parse().unwrap();
        fs::write(
            &path,
            format!(r#"{{"start_time": "{}", "total_requests": 1}}"#, started.to_rfc3339()),
        )
        .unwrap();

        let snapshot = SnapshotStore::new(&path).load();

        assert_eq!(snapshot.start_time, started);
    }

    #[test]
    fn test_save_creates_data_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data").join("analytics.json");
        let store = SnapshotStore::new(&path);

        store.save(&UsageSnapshot::default()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_save_overwrites_previous_file() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("analytics.json"));

        let mut snapshot = UsageSnapshot::default();
        store.save(&snapshot).unwrap();
        snapshot.apply_delta(9, 3);
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().total_requests, 9);
    }
}
