//! Concurrent sampling engine.
//!
//! Independent [`Collector`]s each own one metric key and periodically overwrite
//! it in the [`SharedStateStore`]; a [`StreamPublisher`] reads a snapshot of every
//! key on its own cadence and emits it to stream consumers.

pub mod collector;
pub mod config;
pub mod data;
pub mod lifecycle;
pub mod monitor;
pub mod publisher;
pub mod ranking;
pub mod samplers;
pub mod speedtest;
pub mod store;

// Re-export commonly used items
pub use collector::{Collector, CycleOutcome, FnSampler, Sampler};
pub use config::{MonitorConfig, SpeedTestConfig};
pub use data::MetricsSnapshot;
pub use lifecycle::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use monitor::{MonitorHandle, SystemMonitor};
pub use publisher::{PayloadKind, StreamPublisher};
pub use store::{KeyWriter, MetricKey, MetricValue, SharedStateStore};
