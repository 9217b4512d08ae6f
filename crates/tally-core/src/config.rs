//! Telemetry configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// File name of the persisted usage snapshot inside the data directory
pub const SNAPSHOT_FILE: &str = "analytics.json";

/// Telemetry engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Directory holding persisted state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// How often the snapshot is flushed to disk
    #[serde(default = "default_save_interval", with = "humantime_serde")]
    pub save_interval: Duration,
    /// Maximum number of recent tool calls kept in memory
    #[serde(default = "default_recent_calls_capacity")]
    pub recent_calls_capacity: usize,
    /// Number of top clients included in a summary
    #[serde(default = "default_top_clients_limit")]
    pub top_clients_limit: usize,
    /// Number of recent tool calls included in a summary
    #[serde(default = "default_summary_calls_limit")]
    pub summary_calls_limit: usize,
    /// Number of recent tool calls included in the detail view
    #[serde(default = "default_detail_calls_limit")]
    pub detail_calls_limit: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_save_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_recent_calls_capacity() -> usize {
    100
}

fn default_top_clients_limit() -> usize {
    20
}

fn default_summary_calls_limit() -> usize {
    20
}

fn default_detail_calls_limit() -> usize {
    50
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            save_interval: default_save_interval(),
            recent_calls_capacity: default_recent_calls_capacity(),
            top_clients_limit: default_top_clients_limit(),
            summary_calls_limit: default_summary_calls_limit(),
            detail_calls_limit: default_detail_calls_limit(),
        }
    }
}

impl TelemetryConfig {
    /// Create a configuration rooted at the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the save interval
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Set the recent tool call capacity
    pub fn with_recent_calls_capacity(mut self, capacity: usize) -> Self {
        self.recent_calls_capacity = capacity;
        self
    }

    /// Path of the snapshot file inside the data directory
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.save_interval, Duration::from_secs(60));
        assert_eq!(config.recent_calls_capacity, 100);
        assert_eq!(config.top_clients_limit, 20);
        assert_eq!(config.summary_calls_limit, 20);
        assert_eq!(config.detail_calls_limit, 50);
    }

    #[test]
    fn test_snapshot_path() {
        let config = TelemetryConfig::new("/var/lib/tally");
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/tally/analytics.json")
        );
    }

    #[test]
    fn test_builder() {
        let config = TelemetryConfig::new("state")
            .with_save_interval(Duration::from_secs(5))
            .with_recent_calls_capacity(10);
        assert_eq!(config.data_dir, PathBuf::from("state"));
        assert_eq!(config.save_interval, Duration::from_secs(5));
        assert_eq!(config.recent_calls_capacity, 10);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: TelemetryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.save_interval, Duration::from_secs(60));
        assert_eq!(config.recent_calls_capacity, 100);
    }

    #[test]
    fn test_deserialize_humantime_interval() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"save_interval": "2m"}"#).unwrap();
        assert_eq!(config.save_interval, Duration::from_secs(120));
    }
}
