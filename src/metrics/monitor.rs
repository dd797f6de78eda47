//! Wiring of the standard collectors around one shared store.

use crate::error::Result;
use crate::metrics::collector::{Collector, Sampler};
use crate::metrics::config::MonitorConfig;
use crate::metrics::lifecycle::ShutdownSignal;
use crate::metrics::publisher::{PayloadKind, StreamPublisher};
use crate::metrics::samplers::*;
use crate::metrics::speedtest::{HttpSpeedTest, SpeedTester};
use crate::metrics::store::{MetricKey, SharedStateStore};
use crate::probe::{detect_probe, PlatformProbe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Owns the store and knows how to build one collector per metric key.
pub struct SystemMonitor {
    config: MonitorConfig,
    store: Arc<SharedStateStore>,
    probe: Arc<dyn PlatformProbe>,
    speed_tester: Arc<dyn SpeedTester>,
}

impl SystemMonitor {
    /// Monitor for this host with the detected platform probe and HTTP speed test.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let speed_tester = Arc::new(HttpSpeedTest::new(config.speed_test.clone())?);
        Self::with_parts(config, detect_probe(), speed_tester)
    }

    /// Monitor with injected probe and speed tester.
    pub fn with_parts(
        config: MonitorConfig,
        probe: Arc<dyn PlatformProbe>,
        speed_tester: Arc<dyn SpeedTester>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: Arc::new(SharedStateStore::new()),
            probe,
            speed_tester,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<SharedStateStore> {
        Arc::clone(&self.store)
    }

    pub fn probe(&self) -> Arc<dyn PlatformProbe> {
        Arc::clone(&self.probe)
    }

    /// Claim every key and build its collector.
    ///
    /// Fails if any key is already owned, e.g. when called twice while the first
    /// set of collectors is alive.
    pub fn collectors(&self) -> Result<Vec<Collector>> {
        let config = &self.config;
        let top_n = config.top_n;
        let fast = config.fast_metrics_interval();
        let heavy = config.top_processes_interval();

        let mut collectors = vec![
            self.collector(MetricKey::CpuUsage, fast, CpuUsageSampler::new())?,
            self.collector(MetricKey::PerCoreUsage, fast, PerCoreUsageSampler::new())?,
            self.collector(MetricKey::MemoryUsage, fast, MemoryUsageSampler::new())?,
            self.collector(MetricKey::DiskUsage, fast, DiskUsageSampler::new())?,
            self.collector(
                MetricKey::WifiDetails,
                config.wifi_interval(),
                WifiSampler::new(self.probe()),
            )?,
            self.collector(
                MetricKey::TopCpuProcesses,
                heavy,
                TopProcessesSampler::by_cpu(top_n),
            )?,
            self.collector(
                MetricKey::TopMemoryProcesses,
                heavy,
                TopProcessesSampler::by_memory(top_n),
            )?,
            self.collector(
                MetricKey::TopNetworkProcesses,
                heavy,
                TopProcessesSampler::by_connections(self.probe(), top_n),
            )?,
            self.collector(
                MetricKey::ProcessDetails,
                config.process_table_interval(),
                ProcessTableSampler::new(self.probe()),
            )?,
        ];

        if config.enable_speed_test {
            collectors.push(self.collector(
                MetricKey::NetworkSpeed,
                config.network_speed_interval(),
                NetworkSpeedSampler::new(Arc::clone(&self.speed_tester)),
            )?);
        } else {
            info!("network speed test disabled; network_speed stays at its default");
        }

        Ok(collectors)
    }

    fn collector(
        &self,
        key: MetricKey,
        interval: Duration,
        sampler: impl Sampler + 'static,
    ) -> Result<Collector> {
        Ok(Collector::new(self.store.claim(key)?, interval, sampler))
    }

    /// Publisher for the `/metrics` snapshot stream.
    pub fn snapshot_publisher(&self) -> Arc<StreamPublisher> {
        Arc::new(StreamPublisher::new(
            self.store(),
            PayloadKind::Snapshot,
            self.config.publish_interval(),
        ))
    }

    /// Publisher for the `/cpu-processes` process table stream.
    pub fn process_publisher(&self) -> Arc<StreamPublisher> {
        Arc::new(StreamPublisher::new(
            self.store(),
            PayloadKind::ProcessTable,
            self.config.process_stream_interval(),
        ))
    }

    /// Spawn every collector.
    pub fn start(&self, shutdown: ShutdownSignal) -> Result<MonitorHandle> {
        let collectors = self.collectors()?;
        info!(collectors = collectors.len(), "starting collectors");

        let tasks = collectors
            .into_iter()
            .map(|collector| collector.spawn(shutdown.clone()))
            .collect();

        Ok(MonitorHandle { tasks })
    }
}

/// Running collector tasks.
pub struct MonitorHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every collector to exit after shutdown was triggered.
    pub async fn join(self) {
        for result in futures_util::future::join_all(self.tasks).await {
            match result {
                Err(e) if e.is_panic() => tracing::error!(error = %e, "collector task panicked"),
                _ => {}
            }
        }
    }

    /// Stop every collector immediately.
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
