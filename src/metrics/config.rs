//! Collector and publisher cadences.

use crate::metrics::ranking::DEFAULT_TOP_N;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and feature switches for the sampling engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Snapshot event period on `/metrics`
    pub publish_interval_ms: u64,
    /// CPU, per-core, memory and disk collectors
    pub fast_metrics_interval_ms: u64,
    /// Top CPU / memory / network process rankings
    pub top_processes_interval_ms: u64,
    pub wifi_interval_ms: u64,
    /// Full process table
    pub process_table_interval_ms: u64,
    pub network_speed_interval_ms: u64,
    /// Event period on `/cpu-processes`
    pub process_stream_interval_ms: u64,
    /// Entries kept per ranking
    pub top_n: usize,
    pub enable_speed_test: bool,
    pub speed_test: SpeedTestConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: crate::DEFAULT_INTERVAL_MS,
            fast_metrics_interval_ms: crate::DEFAULT_INTERVAL_MS,
            top_processes_interval_ms: 5_000,
            wifi_interval_ms: 5_000,
            process_table_interval_ms: 50,
            network_speed_interval_ms: 10_000,
            process_stream_interval_ms: 2_000,
            top_n: DEFAULT_TOP_N,
            enable_speed_test: true,
            speed_test: SpeedTestConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Set the snapshot period; fast collectors follow the same cadence.
    pub fn with_publish_interval_ms(mut self, ms: u64) -> Self {
        self.publish_interval_ms = ms;
        self.fast_metrics_interval_ms = ms;
        self
    }

    pub fn with_process_table_interval_ms(mut self, ms: u64) -> Self {
        self.process_table_interval_ms = ms;
        self
    }

    pub fn with_top_processes_interval_ms(mut self, ms: u64) -> Self {
        self.top_processes_interval_ms = ms;
        self
    }

    pub fn with_process_stream_interval_ms(mut self, ms: u64) -> Self {
        self.process_stream_interval_ms = ms;
        self
    }

    pub fn with_speed_test(mut self, enabled: bool) -> Self {
        self.enable_speed_test = enabled;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn fast_metrics_interval(&self) -> Duration {
        Duration::from_millis(self.fast_metrics_interval_ms)
    }

    pub fn top_processes_interval(&self) -> Duration {
        Duration::from_millis(self.top_processes_interval_ms)
    }

    pub fn wifi_interval(&self) -> Duration {
        Duration::from_millis(self.wifi_interval_ms)
    }

    pub fn process_table_interval(&self) -> Duration {
        Duration::from_millis(self.process_table_interval_ms)
    }

    pub fn network_speed_interval(&self) -> Duration {
        Duration::from_millis(self.network_speed_interval_ms)
    }

    pub fn process_stream_interval(&self) -> Duration {
        Duration::from_millis(self.process_stream_interval_ms)
    }

    /// Reject zero periods, which would spin a task.
    pub fn validate(&self) -> crate::Result<()> {
        let periods = [
            ("publish_interval_ms", self.publish_interval_ms),
            ("fast_metrics_interval_ms", self.fast_metrics_interval_ms),
            ("top_processes_interval_ms", self.top_processes_interval_ms),
            ("wifi_interval_ms", self.wifi_interval_ms),
            ("process_table_interval_ms", self.process_table_interval_ms),
            ("network_speed_interval_ms", self.network_speed_interval_ms),
            ("process_stream_interval_ms", self.process_stream_interval_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(crate::SystemError::config_error(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if self.top_n == 0 || self.top_n > DEFAULT_TOP_N {
            return Err(crate::SystemError::config_error(format!(
                "top_n must be between 1 and {DEFAULT_TOP_N}"
            )));
        }
        Ok(())
    }
}

/// Endpoints used by the HTTP speed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestConfig {
    /// Streamed and timed for the download figure
    pub download_url: String,
    /// Receives `upload_bytes` of zeros for the upload figure
    pub upload_url: String,
    pub upload_bytes: usize,
    /// Small request used for latency; the fastest of three counts
    pub ping_url: String,
    pub timeout_secs: u64,
}

impl Default for SpeedTestConfig {
    fn default() -> Self {
        Self {
            download_url: "https://speed.cloudflare.com/__down?bytes=10000000".to_string(),
            upload_url: "https://speed.cloudflare.com/__up".to_string(),
            upload_bytes: 2_000_000,
            ping_url: "https://speed.cloudflare.com/__down?bytes=0".to_string(),
            timeout_secs: 30,
        }
    }
}

impl SpeedTestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadences() {
        let config = MonitorConfig::default();
        assert_eq!(config.publish_interval(), Duration::from_secs(1));
        assert_eq!(config.top_processes_interval(), Duration::from_secs(5));
        assert_eq!(config.process_table_interval(), Duration::from_millis(50));
        assert_eq!(config.network_speed_interval(), Duration::from_secs(10));
        assert_eq!(config.process_stream_interval(), Duration::from_secs(2));
        assert_eq!(config.top_n, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_validation() {
        let config = MonitorConfig::default()
            .with_publish_interval_ms(250)
            .with_speed_test(false);
        assert_eq!(config.fast_metrics_interval_ms, 250);
        assert!(!config.enable_speed_test);

        assert!(MonitorConfig::default().with_process_table_interval_ms(0).validate().is_err());
        assert!(MonitorConfig::default().with_top_n(0).validate().is_err());
        assert!(MonitorConfig::default().with_top_n(3).validate().is_ok());
        assert!(MonitorConfig::default().with_top_n(DEFAULT_TOP_N + 1).validate().is_err());
    }

    #[test]
    fn test_deserialized_top_n_is_validated() {
        let mut value = serde_json::to_value(MonitorConfig::default()).unwrap();
        value["top_n"] = serde_json::json!(10);
        let parsed: MonitorConfig = serde_json::from_value(value).unwrap();
        assert!(parsed.validate().is_err());
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let config = MonitorConfig::default().with_top_n(3);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: MonitorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
