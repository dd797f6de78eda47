//! Shared state store holding the latest value of every metric key.
//!
//! Each key lives in its own `tokio::sync::watch` slot. A write swaps the whole
//! value in one step, so readers only ever see complete values, and writes to
//! different keys never contend. Reads and writes are synchronous and never hold a
//! lock across an `.await`.

use crate::error::{Result, SystemError};
use crate::metrics::data::*;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Every metric tracked by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKey {
    CpuUsage,
    PerCoreUsage,
    MemoryUsage,
    DiskUsage,
    NetworkSpeed,
    WifiDetails,
    TopCpuProcesses,
    TopMemoryProcesses,
    TopNetworkProcesses,
    ProcessDetails,
}

impl MetricKey {
    pub const ALL: [MetricKey; 10] = [
        MetricKey::CpuUsage,
        MetricKey::PerCoreUsage,
        MetricKey::MemoryUsage,
        MetricKey::DiskUsage,
        MetricKey::NetworkSpeed,
        MetricKey::WifiDetails,
        MetricKey::TopCpuProcesses,
        MetricKey::TopMemoryProcesses,
        MetricKey::TopNetworkProcesses,
        MetricKey::ProcessDetails,
    ];

    /// Name used as the snapshot field.
    pub fn name(self) -> &'static str {
        match self {
            MetricKey::CpuUsage => "cpu_usage",
            MetricKey::PerCoreUsage => "per_core_usage",
            MetricKey::MemoryUsage => "memory_usage",
            MetricKey::DiskUsage => "disk_usage",
            MetricKey::NetworkSpeed => "network_speed",
            MetricKey::WifiDetails => "wifi_details",
            MetricKey::TopCpuProcesses => "top_cpu_processes",
            MetricKey::TopMemoryProcesses => "top_memory_processes",
            MetricKey::TopNetworkProcesses => "top_network_processes",
            MetricKey::ProcessDetails => "process_details",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Value present before the owning collector's first successful cycle.
    pub fn initial_value(self) -> MetricValue {
        match self {
            MetricKey::CpuUsage | MetricKey::MemoryUsage | MetricKey::DiskUsage => {
                MetricValue::Scalar(0.0)
            }
            MetricKey::PerCoreUsage => MetricValue::Vector(Vec::new()),
            MetricKey::NetworkSpeed => MetricValue::Network(NetworkSpeed::default()),
            MetricKey::WifiDetails => MetricValue::Wifi(WifiInfo::absent()),
            MetricKey::TopCpuProcesses => {
                MetricValue::Ranked(RankedProcessList::empty(RankMetric::Cpu))
            }
            MetricKey::TopMemoryProcesses => {
                MetricValue::Ranked(RankedProcessList::empty(RankMetric::Memory))
            }
            MetricKey::TopNetworkProcesses => {
                MetricValue::Ranked(RankedProcessList::empty(RankMetric::Connections))
            }
            MetricKey::ProcessDetails => MetricValue::ProcessTable(None),
        }
    }

    /// Whether `value` has the shape this key stores.
    pub fn accepts(self, value: &MetricValue) -> bool {
        match (self, value) {
            (
                MetricKey::CpuUsage | MetricKey::MemoryUsage | MetricKey::DiskUsage,
                MetricValue::Scalar(_),
            ) => true,
            (MetricKey::PerCoreUsage, MetricValue::Vector(_)) => true,
            (MetricKey::NetworkSpeed, MetricValue::Network(_)) => true,
            (MetricKey::WifiDetails, MetricValue::Wifi(_)) => true,
            (MetricKey::TopCpuProcesses, MetricValue::Ranked(list)) => {
                list.metric() == RankMetric::Cpu
            }
            (MetricKey::TopMemoryProcesses, MetricValue::Ranked(list)) => {
                list.metric() == RankMetric::Memory
            }
            (MetricKey::TopNetworkProcesses, MetricValue::Ranked(list)) => {
                list.metric() == RankMetric::Connections
            }
            (MetricKey::ProcessDetails, MetricValue::ProcessTable(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete value for one metric key.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Scalar(ScalarMetric),
    Vector(VectorMetric),
    Network(NetworkSpeed),
    Wifi(WifiInfo),
    Ranked(RankedProcessList),
    /// `None` until the first process table sample
    ProcessTable(Option<ProcessTableSnapshot>),
}

impl MetricValue {
    fn kind(&self) -> &'static str {
        match self {
            MetricValue::Scalar(_) => "scalar",
            MetricValue::Vector(_) => "vector",
            MetricValue::Network(_) => "network speed",
            MetricValue::Wifi(_) => "wifi info",
            MetricValue::Ranked(_) => "ranked process list",
            MetricValue::ProcessTable(_) => "process table",
        }
    }
}

/// Mapping from metric key to latest value.
pub struct SharedStateStore {
    slots: Vec<watch::Sender<MetricValue>>,
    owned: Vec<AtomicBool>,
}

impl Default for SharedStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStateStore {
    /// Create a store with every key at its initial value.
    pub fn new() -> Self {
        let slots = MetricKey::ALL
            .iter()
            .map(|key| watch::Sender::new(key.initial_value()))
            .collect();
        let owned = MetricKey::ALL.iter().map(|_| AtomicBool::new(false)).collect();
        Self { slots, owned }
    }

    /// Atomically replace the value stored for `key`.
    ///
    /// Outside the crate writes go through the [`KeyWriter`] returned by
    /// [`SharedStateStore::claim`].
    pub(crate) fn set(&self, key: MetricKey, value: MetricValue) -> Result<()> {
        if !key.accepts(&value) {
            return Err(SystemError::store_error(format!(
                "{} cannot hold a {} value",
                key,
                value.kind()
            )));
        }
        self.slots[key.index()].send_replace(value);
        Ok(())
    }

    /// Current value for `key`, or its initial value if never set.
    pub fn get(&self, key: MetricKey) -> MetricValue {
        self.slots[key.index()].borrow().clone()
    }

    /// Watch `key` for changes.
    pub fn subscribe(&self, key: MetricKey) -> watch::Receiver<MetricValue> {
        self.slots[key.index()].subscribe()
    }

    /// Take exclusive write access to `key`.
    ///
    /// Fails if another writer currently owns the key. The key is released when the
    /// returned writer is dropped.
    pub fn claim(self: &Arc<Self>, key: MetricKey) -> Result<KeyWriter> {
        self.owned[key.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SystemError::store_error(format!("{} already has an owner", key)))?;

        Ok(KeyWriter {
            store: Arc::clone(self),
            key,
        })
    }

    /// Read every key once and assemble a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::default();

        for key in MetricKey::ALL {
            match (key, self.get(key)) {
                (MetricKey::CpuUsage, MetricValue::Scalar(v)) => snapshot.cpu_usage = v,
                (MetricKey::MemoryUsage, MetricValue::Scalar(v)) => snapshot.memory_usage = v,
                (MetricKey::DiskUsage, MetricValue::Scalar(v)) => snapshot.disk_usage = v,
                (MetricKey::PerCoreUsage, MetricValue::Vector(v)) => snapshot.per_core_usage = v,
                (MetricKey::NetworkSpeed, MetricValue::Network(v)) => snapshot.network_speed = v,
                (MetricKey::WifiDetails, MetricValue::Wifi(v)) => snapshot.wifi_details = v,
                (MetricKey::TopCpuProcesses, MetricValue::Ranked(v)) => {
                    snapshot.top_cpu_processes = v
                }
                (MetricKey::TopMemoryProcesses, MetricValue::Ranked(v)) => {
                    snapshot.top_memory_processes = v
                }
                (MetricKey::TopNetworkProcesses, MetricValue::Ranked(v)) => {
                    snapshot.top_network_processes = v
                }
                (MetricKey::ProcessDetails, MetricValue::ProcessTable(v)) => {
                    snapshot.process_details = v
                }
                // `set` rejects mismatched shapes
                _ => {}
            }
        }

        snapshot
    }

    /// Latest process table, `None` if not yet sampled.
    pub fn process_table(&self) -> Option<ProcessTableSnapshot> {
        match self.get(MetricKey::ProcessDetails) {
            MetricValue::ProcessTable(table) => table,
            _ => None,
        }
    }
}

/// Exclusive write handle for one metric key.
pub struct KeyWriter {
    store: Arc<SharedStateStore>,
    key: MetricKey,
}

impl KeyWriter {
    pub fn key(&self) -> MetricKey {
        self.key
    }

    pub fn set(&self, value: MetricValue) -> Result<()> {
        self.store.set(self.key, value)
    }
}

impl fmt::Debug for KeyWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyWriter").field("key", &self.key).finish()
    }
}

impl Drop for KeyWriter {
    fn drop(&mut self) {
        self.store.owned[self.key.index()].store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_initial_values() {
        let store = SharedStateStore::new();
        for key in MetricKey::ALL {
            assert_eq!(store.get(key), key.initial_value());
        }
        assert!(store.process_table().is_none());
    }

    #[test]
    fn test_set_replaces_value() {
        let store = SharedStateStore::new();
        assert_ok!(store.set(MetricKey::CpuUsage, MetricValue::Scalar(42.0)));
        assert_ok!(store.set(MetricKey::CpuUsage, MetricValue::Scalar(43.5)));
        assert_eq!(store.get(MetricKey::CpuUsage), MetricValue::Scalar(43.5));
    }

    #[test]
    fn test_set_rejects_wrong_shape() {
        let store = SharedStateStore::new();
        assert_err!(store.set(MetricKey::CpuUsage, MetricValue::Vector(vec![1.0])));
        assert_err!(store.set(
            MetricKey::TopCpuProcesses,
            MetricValue::Ranked(RankedProcessList::empty(RankMetric::Memory))
        ));
        assert_eq!(store.get(MetricKey::CpuUsage), MetricValue::Scalar(0.0));
    }

    #[test]
    fn test_single_owner_per_key() {
        let store = Arc::new(SharedStateStore::new());
        let writer = store.claim(MetricKey::DiskUsage).unwrap();
        assert!(store.claim(MetricKey::DiskUsage).is_err());
        assert!(store.claim(MetricKey::MemoryUsage).is_ok());

        writer.set(MetricValue::Scalar(12.5)).unwrap();
        drop(writer);

        assert!(store.claim(MetricKey::DiskUsage).is_ok());
        assert_eq!(store.get(MetricKey::DiskUsage), MetricValue::Scalar(12.5));
    }

    #[test]
    fn test_snapshot_reads_every_key() {
        let store = SharedStateStore::new();
        store.set(MetricKey::MemoryUsage, MetricValue::Scalar(71.5)).unwrap();
        store
            .set(MetricKey::PerCoreUsage, MetricValue::Vector(vec![1.0, 2.0]))
            .unwrap();
        store
            .set(MetricKey::ProcessDetails, MetricValue::ProcessTable(Some(Vec::new())))
            .unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.memory_usage, 71.5);
        assert_eq!(snapshot.per_core_usage, vec![1.0, 2.0]);
        assert_eq!(snapshot.cpu_usage, 0.0);
        assert_eq!(snapshot.process_details, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_subscribe_sees_latest_write() {
        let store = SharedStateStore::new();
        let mut rx = store.subscribe(MetricKey::CpuUsage);
        store.set(MetricKey::CpuUsage, MetricValue::Scalar(9.0)).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), MetricValue::Scalar(9.0));
    }
}
