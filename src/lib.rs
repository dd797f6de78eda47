//! # hostpulse - Host Telemetry Aggregator
//!
//! Samples operating-system metrics (CPU, memory, disk, network, Wi-Fi, process
//! tables) at independent cadences and republishes a merged snapshot to remote
//! viewers as a server-sent event stream.
//!
//! ## Features
//!
//! - **Independent collectors**: one periodic task per metric key, each writing
//!   only its own key
//! - **Lock-light state store**: whole-value replacement per key, readers never
//!   see a half-written value
//! - **Platform probes**: Windows, Linux and macOS adapters over native commands,
//!   failing closed
//! - **Event streams**: `/metrics` snapshots every second, `/cpu-processes`
//!   process tables every two seconds
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostpulse::{shutdown_channel, start_web_server, MonitorConfig, SystemMonitor, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = SystemMonitor::new(MonitorConfig::default())?;
//!     let (trigger, signal) = shutdown_channel();
//!     let _collectors = monitor.start(signal.clone())?;
//!
//!     start_web_server(WebConfig::default(), &monitor, signal).await?;
//!     drop(trigger);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod metrics;
pub mod probe;
pub mod web;

// Re-export public API
pub use error::{Result, SystemError};
pub use metrics::{
    collector::{Collector, Sampler},
    data::{MetricsSnapshot, NetworkSpeed, ProcessRecord, RankedProcessList, WifiInfo},
    lifecycle::{shutdown_channel, ShutdownSignal, ShutdownTrigger},
    monitor::{MonitorHandle, SystemMonitor},
    publisher::StreamPublisher,
    store::{MetricKey, MetricValue, SharedStateStore},
    MonitorConfig,
};
pub use probe::{Platform, PlatformProbe};

pub use web::{start_web_server, WebConfig};

/// The default snapshot interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8123;
