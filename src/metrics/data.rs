//! Data structures for sampled metrics and the published snapshot.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};

/// A single percentage in the range 0.0 to 100.0.
pub type ScalarMetric = f64;

/// Per-unit percentages, ordered by unit index (e.g. one entry per core).
pub type VectorMetric = Vec<f64>;

/// Latest process table; every record uses the same schema on every platform.
pub type ProcessTableSnapshot = Vec<ProcessRecord>;

/// Round `value` to `decimals` places, mapping non-finite input to 0.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Result of an active throughput measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpeed {
    /// Download throughput in Mbps
    #[serde(rename = "download_speed")]
    pub download: f64,
    /// Upload throughput in Mbps
    #[serde(rename = "upload_speed")]
    pub upload: f64,
    /// Round-trip latency in milliseconds, `None` when the measurement failed
    pub ping: Option<f64>,
}

impl NetworkSpeed {
    /// The value written when a measurement fails.
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Active Wi-Fi network as reported by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiInfo {
    #[serde(rename = "SSID")]
    pub ssid: Option<String>,
    /// Signal indicator in the platform's own unit (percent, dBm, ...)
    #[serde(rename = "Signal Strength")]
    pub signal_strength: Option<String>,
}

impl WifiInfo {
    /// Both fields absent: unsupported platform or failed query.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        self.ssid.is_none() && self.signal_strength.is_none()
    }
}

/// Per-process quantity a [`RankedProcessList`] is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Cpu,
    Memory,
    Connections,
}

impl RankMetric {
    /// JSON field name carrying the ranking value.
    pub fn field_name(self) -> &'static str {
        match self {
            RankMetric::Cpu => "cpu_percent",
            RankMetric::Memory => "memory_percent",
            RankMetric::Connections => "connections",
        }
    }
}

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProcess {
    pub pid: u32,
    pub name: String,
    pub value: f64,
}

/// Bounded top-N view over a per-process metric, sorted descending by `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedProcessList {
    metric: RankMetric,
    entries: Vec<RankedProcess>,
}

impl RankedProcessList {
    pub fn empty(metric: RankMetric) -> Self {
        Self {
            metric,
            entries: Vec::new(),
        }
    }

    /// Build a list from already ranked entries. Use [`crate::metrics::ranking::rank_top`]
    /// to rank raw samples.
    pub(crate) fn from_ranked(metric: RankMetric, entries: Vec<RankedProcess>) -> Self {
        Self { metric, entries }
    }

    pub fn metric(&self) -> RankMetric {
        self.metric
    }

    pub fn entries(&self) -> &[RankedProcess] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct RankedEntry<'a> {
    metric: RankMetric,
    entry: &'a RankedProcess,
}

impl Serialize for RankedEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("pid", &self.entry.pid)?;
        map.serialize_entry("name", &self.entry.name)?;
        match self.metric {
            // counts stay integral on the wire
            RankMetric::Connections => {
                map.serialize_entry(self.metric.field_name(), &(self.entry.value as u64))?
            }
            _ => map.serialize_entry(self.metric.field_name(), &self.entry.value)?,
        }
        map.end()
    }
}

impl Serialize for RankedProcessList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(&RankedEntry {
                metric: self.metric,
                entry,
            })?;
        }
        seq.end()
    }
}

/// One row of the process table.
///
/// Field names on the wire follow the Windows `Get-Process` projection. Fields a
/// platform cannot provide are zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    #[serde(rename = "Id")]
    pub id: u32,
    #[serde(rename = "SI")]
    pub session_id: u32,
    #[serde(rename = "ProcessName")]
    pub name: String,
    /// CPU time in seconds on Windows, CPU percent on Linux and macOS
    #[serde(rename = "CPU")]
    pub cpu_time: f64,
    #[serde(rename = "Handles")]
    pub handle_count: u64,
    #[serde(rename = "NPM")]
    pub non_paged_memory: u64,
    #[serde(rename = "PM")]
    pub paged_memory: u64,
    /// Resident set size in bytes
    #[serde(rename = "WS")]
    pub working_set: u64,
}

/// A composite read across every tracked metric key.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cpu_usage: ScalarMetric,
    pub per_core_usage: VectorMetric,
    pub memory_usage: ScalarMetric,
    pub disk_usage: ScalarMetric,
    pub network_speed: NetworkSpeed,
    pub wifi_details: WifiInfo,
    pub top_cpu_processes: RankedProcessList,
    pub top_memory_processes: RankedProcessList,
    pub top_network_processes: RankedProcessList,
    /// `None` until the process table has been sampled once
    pub process_details: Option<ProcessTableSnapshot>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        Self {
            cpu_usage: 0.0,
            per_core_usage: Vec::new(),
            memory_usage: 0.0,
            disk_usage: 0.0,
            network_speed: NetworkSpeed::default(),
            wifi_details: WifiInfo::default(),
            top_cpu_processes: RankedProcessList::empty(RankMetric::Cpu),
            top_memory_processes: RankedProcessList::empty(RankMetric::Memory),
            top_network_processes: RankedProcessList::empty(RankMetric::Connections),
            process_details: None,
        }
    }
}
