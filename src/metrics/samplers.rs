//! Sampling functions backing each collector.
//!
//! Host metrics come from `sysinfo`; Wi-Fi, the process table and connection
//! counts come from the [`PlatformProbe`]; throughput from a [`SpeedTester`].

use crate::error::{Result, SystemError};
use crate::metrics::collector::Sampler;
use crate::metrics::data::*;
use crate::metrics::ranking::rank_top;
use crate::metrics::speedtest::SpeedTester;
use crate::metrics::store::MetricValue;
use crate::probe::PlatformProbe;
use async_trait::async_trait;
use std::sync::Arc;
use sysinfo::{Disks, Pid, System};
use tracing::warn;

/// Overall CPU usage, the mean over all cores.
pub struct CpuUsageSampler {
    system: System,
}

impl CpuUsageSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for CpuUsageSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for CpuUsageSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        self.system.refresh_cpu_usage();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(SystemError::sampling_error("No CPU information available"));
        }
        let total: f64 = cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum();
        Ok(MetricValue::Scalar(round_to(total / cpus.len() as f64, 1)))
    }
}

/// Usage per core, ordered by core index.
pub struct PerCoreUsageSampler {
    system: System,
}

impl PerCoreUsageSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for PerCoreUsageSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for PerCoreUsageSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        self.system.refresh_cpu_usage();
        let cores: Vec<f64> = self
            .system
            .cpus()
            .iter()
            .map(|cpu| round_to(cpu.cpu_usage() as f64, 1))
            .collect();
        if cores.is_empty() {
            return Err(SystemError::sampling_error("No CPU information available"));
        }
        Ok(MetricValue::Vector(cores))
    }
}

/// Used physical memory as a percentage of total.
pub struct MemoryUsageSampler {
    system: System,
}

impl MemoryUsageSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemoryUsageSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for MemoryUsageSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(SystemError::sampling_error("Total memory reported as zero"));
        }
        let used = self.system.used_memory();
        Ok(MetricValue::Scalar(round_to(
            used as f64 / total as f64 * 100.0,
            1,
        )))
    }
}

/// Used space summed over every mounted disk, as a percentage.
pub struct DiskUsageSampler {
    disks: Disks,
}

impl DiskUsageSampler {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskUsageSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for DiskUsageSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        self.disks.refresh_list();
        let usage = disk_usage_percent(
            self.disks
                .iter()
                .map(|disk| (disk.total_space(), disk.available_space())),
        );
        Ok(MetricValue::Scalar(usage))
    }
}

/// Percentage of used space over `(total, available)` pairs, 0 when nothing
/// reports a size.
pub fn disk_usage_percent(disks: impl IntoIterator<Item = (u64, u64)>) -> f64 {
    let (total, used) = disks
        .into_iter()
        .fold((0u64, 0u64), |(total, used), (disk_total, available)| {
            (
                total.saturating_add(disk_total),
                used.saturating_add(disk_total.saturating_sub(available)),
            )
        });
    if total == 0 {
        return 0.0;
    }
    round_to(used as f64 / total as f64 * 100.0, 2)
}

/// Which ranking a [`TopProcessesSampler`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRanking {
    Cpu,
    Memory,
    Connections,
}

/// Top-N processes by CPU, memory or open connections.
pub struct TopProcessesSampler {
    ranking: ProcessRanking,
    system: System,
    probe: Option<Arc<dyn PlatformProbe>>,
    top_n: usize,
}

impl TopProcessesSampler {
    pub fn by_cpu(top_n: usize) -> Self {
        Self::new(ProcessRanking::Cpu, None, top_n)
    }

    pub fn by_memory(top_n: usize) -> Self {
        Self::new(ProcessRanking::Memory, None, top_n)
    }

    /// Connection counts come from `probe`; on restricted accounts processes the
    /// probe cannot inspect are missing from the ranking.
    pub fn by_connections(probe: Arc<dyn PlatformProbe>, top_n: usize) -> Self {
        Self::new(ProcessRanking::Connections, Some(probe), top_n)
    }

    fn new(ranking: ProcessRanking, probe: Option<Arc<dyn PlatformProbe>>, top_n: usize) -> Self {
        let mut system = System::new();
        system.refresh_all();
        Self {
            ranking,
            system,
            probe,
            top_n,
        }
    }

    /// Full process refresh off the async workers.
    async fn refresh(&mut self) -> Result<()> {
        let mut system = std::mem::replace(&mut self.system, System::new());
        self.system = tokio::task::spawn_blocking(move || {
            system.refresh_all();
            system
        })
        .await
        .map_err(|e| SystemError::sampling_error(format!("process refresh task failed: {}", e)))?;
        Ok(())
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        self.system
            .process(Pid::from_u32(pid))
            .map(|process| process.name().to_string_lossy().into_owned())
    }
}

#[async_trait]
impl Sampler for TopProcessesSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        self.refresh().await?;

        let list = match (self.ranking, &self.probe) {
            (ProcessRanking::Cpu, _) => {
                let samples = sorted_by_pid(self.system.processes().iter().map(|(pid, p)| {
                    RankedProcess {
                        pid: pid.as_u32(),
                        name: p.name().to_string_lossy().into_owned(),
                        value: round_to(p.cpu_usage() as f64, 1),
                    }
                }));
                rank_top(RankMetric::Cpu, samples, self.top_n)
            }
            (ProcessRanking::Memory, _) => {
                let total = self.system.total_memory();
                if total == 0 {
                    return Err(SystemError::sampling_error("Total memory reported as zero"));
                }
                let samples = sorted_by_pid(self.system.processes().iter().map(|(pid, p)| {
                    RankedProcess {
                        pid: pid.as_u32(),
                        name: p.name().to_string_lossy().into_owned(),
                        value: round_to(p.memory() as f64 / total as f64 * 100.0, 2),
                    }
                }));
                rank_top(RankMetric::Memory, samples, self.top_n)
            }
            (ProcessRanking::Connections, Some(probe)) => {
                let counts = probe.query_connection_counts().await;
                let samples = sorted_by_pid(counts.into_iter().filter_map(|(pid, count)| {
                    // a pid without a name has exited since the scan
                    self.process_name(pid).map(|name| RankedProcess {
                        pid,
                        name,
                        value: count as f64,
                    })
                }));
                rank_top(RankMetric::Connections, samples, self.top_n)
            }
            (ProcessRanking::Connections, None) => {
                return Err(SystemError::sampling_error(
                    "connection ranking requires a platform probe",
                ));
            }
        };

        Ok(MetricValue::Ranked(list))
    }
}

/// Enumeration order for tie-breaking is ascending PID.
fn sorted_by_pid(samples: impl Iterator<Item = RankedProcess>) -> Vec<RankedProcess> {
    let mut samples: Vec<RankedProcess> = samples.collect();
    samples.sort_by_key(|sample| sample.pid);
    samples
}

/// Wi-Fi details through the platform probe.
pub struct WifiSampler {
    probe: Arc<dyn PlatformProbe>,
}

impl WifiSampler {
    pub fn new(probe: Arc<dyn PlatformProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Sampler for WifiSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        Ok(MetricValue::Wifi(self.probe.query_wifi().await))
    }
}

/// Full process table through the platform probe.
pub struct ProcessTableSampler {
    probe: Arc<dyn PlatformProbe>,
}

impl ProcessTableSampler {
    pub fn new(probe: Arc<dyn PlatformProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Sampler for ProcessTableSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        let table = self.probe.query_process_table().await;
        Ok(MetricValue::ProcessTable(Some(table)))
    }
}

/// Network throughput; a failed measurement is written as zero speeds with no
/// ping.
pub struct NetworkSpeedSampler {
    tester: Arc<dyn SpeedTester>,
}

impl NetworkSpeedSampler {
    pub fn new(tester: Arc<dyn SpeedTester>) -> Self {
        Self { tester }
    }
}

#[async_trait]
impl Sampler for NetworkSpeedSampler {
    async fn sample(&mut self) -> Result<MetricValue> {
        let speed = match self.tester.measure().await {
            Ok(speed) => speed,
            Err(e) => {
                warn!(error = %e, "network speed measurement failed");
                NetworkSpeed::failed()
            }
        };
        Ok(MetricValue::Network(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{CannedCommandRunner, LinuxProbe, Platform};
    use std::collections::HashMap;

    struct FixedSpeed(Option<NetworkSpeed>);

    #[async_trait]
    impl SpeedTester for FixedSpeed {
        async fn measure(&self) -> Result<NetworkSpeed> {
            self.0
                .clone()
                .ok_or_else(|| SystemError::network_error("speed test server unreachable"))
        }
    }

    struct SelfConnections;

    #[async_trait]
    impl PlatformProbe for SelfConnections {
        fn platform(&self) -> Platform {
            Platform::Unsupported
        }

        async fn query_wifi(&self) -> WifiInfo {
            WifiInfo::absent()
        }

        async fn query_process_table(&self) -> ProcessTableSnapshot {
            Vec::new()
        }

        async fn query_connection_counts(&self) -> HashMap<u32, usize> {
            // our own pid plus one that cannot exist
            HashMap::from([(std::process::id(), 4), (u32::MAX - 1, 9)])
        }
    }

    #[test]
    fn test_disk_usage_percent() {
        assert_eq!(disk_usage_percent(vec![(100, 25), (300, 75)]), 75.0);
        assert_eq!(disk_usage_percent(vec![(3, 2)]), 33.33);
        assert_eq!(disk_usage_percent(Vec::new()), 0.0);
        // available larger than total must not underflow
        assert_eq!(disk_usage_percent(vec![(10, 20)]), 0.0);
    }

    #[tokio::test]
    async fn test_host_samplers_produce_expected_shapes() {
        let mut cpu = CpuUsageSampler::new();
        match cpu.sample().await.unwrap() {
            MetricValue::Scalar(v) => assert!((0.0..=100.0).contains(&v)),
            other => panic!("unexpected value {:?}", other),
        }

        let mut cores = PerCoreUsageSampler::new();
        match cores.sample().await.unwrap() {
            MetricValue::Vector(v) => assert!(!v.is_empty()),
            other => panic!("unexpected value {:?}", other),
        }

        let mut memory = MemoryUsageSampler::new();
        match memory.sample().await.unwrap() {
            MetricValue::Scalar(v) => assert!(v > 0.0 && v <= 100.0),
            other => panic!("unexpected value {:?}", other),
        }

        let mut disk = DiskUsageSampler::new();
        match disk.sample().await.unwrap() {
            MetricValue::Scalar(v) => assert!((0.0..=100.0).contains(&v)),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_top_memory_processes_bounded() {
        let mut sampler = TopProcessesSampler::by_memory(5);
        match sampler.sample().await.unwrap() {
            MetricValue::Ranked(list) => {
                assert_eq!(list.metric(), RankMetric::Memory);
                assert!(list.len() <= 5);
                let values: Vec<f64> = list.entries().iter().map(|e| e.value).collect();
                assert!(values.windows(2).all(|w| w[0] >= w[1]));
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_process_names_resolve() {
        let mut sampler = TopProcessesSampler::by_cpu(5);
        sampler.sample().await.unwrap();

        let name = sampler.process_name(std::process::id()).unwrap();
        assert!(!name.is_empty());
        assert!(sampler.process_name(u32::MAX - 1).is_none());
    }

    #[tokio::test]
    async fn test_oversized_top_n_is_capped() {
        let mut sampler = TopProcessesSampler::by_cpu(50);
        match sampler.sample().await.unwrap() {
            MetricValue::Ranked(list) => assert!(list.len() <= crate::metrics::ranking::DEFAULT_TOP_N),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_ranking_drops_unknown_pids() {
        let mut sampler = TopProcessesSampler::by_connections(Arc::new(SelfConnections), 5);
        match sampler.sample().await.unwrap() {
            MetricValue::Ranked(list) => {
                assert_eq!(list.metric(), RankMetric::Connections);
                assert_eq!(list.len(), 1);
                assert_eq!(list.entries()[0].pid, std::process::id());
                assert_eq!(list.entries()[0].value, 4.0);
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_speed_failure_writes_sentinel() {
        let mut failing = NetworkSpeedSampler::new(Arc::new(FixedSpeed(None)));
        assert_eq!(
            failing.sample().await.unwrap(),
            MetricValue::Network(NetworkSpeed {
                download: 0.0,
                upload: 0.0,
                ping: None,
            })
        );

        let measured = NetworkSpeed {
            download: 10.0,
            upload: 2.0,
            ping: Some(30.0),
        };
        let mut ok = NetworkSpeedSampler::new(Arc::new(FixedSpeed(Some(measured.clone()))));
        assert_eq!(ok.sample().await.unwrap(), MetricValue::Network(measured));
    }

    #[tokio::test]
    async fn test_probe_backed_samplers() {
        let runner = Arc::new(
            CannedCommandRunner::new()
                .with_output("nmcli", "yes:lab:64\n")
                .with_output("top", "PID USER %CPU COMMAND\n9 root 1.0 init\n"),
        );
        let probe: Arc<dyn PlatformProbe> = Arc::new(LinuxProbe::new(runner));

        let mut wifi = WifiSampler::new(probe.clone());
        match wifi.sample().await.unwrap() {
            MetricValue::Wifi(info) => assert_eq!(info.ssid.as_deref(), Some("lab")),
            other => panic!("unexpected value {:?}", other),
        }

        let mut table = ProcessTableSampler::new(probe);
        match table.sample().await.unwrap() {
            MetricValue::ProcessTable(Some(rows)) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].id, 9);
                assert_eq!(rows[0].name, "init");
            }
            other => panic!("unexpected value {:?}", other),
        }
    }
}
