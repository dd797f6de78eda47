//! Periodic snapshot publishing to every connected stream consumer.
//!
//! On each tick the publisher reads the store, serializes one payload and sends
//! it through a `broadcast` channel. Each consumer holds its own receiver, so
//! every consumer sees identical content, and a slow consumer only lags its own
//! receiver.

use crate::error::Result;
use crate::metrics::lifecycle::ShutdownSignal;
use crate::metrics::store::SharedStateStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Events buffered per consumer before it starts lagging.
pub const STREAM_BUFFER: usize = 16;

/// Serialized event payload shared by all consumers.
pub type Payload = Arc<str>;

/// What a publisher emits on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// All metric keys as one JSON object
    Snapshot,
    /// Only the process table
    ProcessTable,
}

pub struct StreamPublisher {
    store: Arc<SharedStateStore>,
    kind: PayloadKind,
    period: Duration,
    tx: broadcast::Sender<Payload>,
}

impl StreamPublisher {
    pub fn new(store: Arc<SharedStateStore>, kind: PayloadKind, period: Duration) -> Self {
        let (tx, _rx) = broadcast::channel(STREAM_BUFFER);
        Self {
            store,
            kind,
            period,
            tx,
        }
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Register a new consumer; it receives every payload published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Payload> {
        self.tx.subscribe()
    }

    pub fn consumer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Serialize the current payload without publishing it.
    pub fn compose(&self) -> Result<String> {
        let payload = match self.kind {
            PayloadKind::Snapshot => serde_json::to_string(&self.store.snapshot())?,
            PayloadKind::ProcessTable => serde_json::to_string(&process_document(&self.store))?,
        };
        Ok(payload)
    }

    /// Publish one payload; returns the number of consumers it reached.
    pub fn publish_once(&self) -> Result<usize> {
        let payload: Payload = Arc::from(self.compose()?);
        // no consumers is not an error
        Ok(self.tx.send(payload).unwrap_or(0))
    }

    /// Publish every `period` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(kind = ?self.kind, period_ms = self.period.as_millis() as u64, "publisher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.wait() => break,
            }

            match self.publish_once() {
                Ok(reached) => debug!(kind = ?self.kind, consumers = reached, "published"),
                Err(e) => error!(kind = ?self.kind, error = %e, "failed to compose payload"),
            }
        }

        info!(kind = ?self.kind, "publisher stopped");
    }

    /// Spawn [`StreamPublisher::run`] on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run(shutdown))
    }
}

/// The latest process table as a JSON document.
///
/// Degrades to `{"error": ...}` when the table is not yet sampled or cannot be
/// encoded.
pub fn process_document(store: &SharedStateStore) -> serde_json::Value {
    match store.process_table() {
        Some(table) => serde_json::to_value(&table)
            .unwrap_or_else(|e| json!({ "error": e.to_string() })),
        None => json!({ "error": "process table not yet sampled" }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::{NetworkSpeed, ProcessRecord};
    use crate::metrics::lifecycle::shutdown_channel;
    use crate::metrics::store::{MetricKey, MetricValue};

    fn parse(payload: &str) -> serde_json::Value {
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_publish_without_consumers() {
        let store = Arc::new(SharedStateStore::new());
        let publisher = StreamPublisher::new(store, PayloadKind::Snapshot, Duration::from_secs(1));
        assert_eq!(publisher.publish_once().unwrap(), 0);
    }

    #[test]
    fn test_consumers_receive_identical_payloads() {
        let store = Arc::new(SharedStateStore::new());
        store.set(MetricKey::CpuUsage, MetricValue::Scalar(42.0)).unwrap();
        let publisher =
            StreamPublisher::new(store.clone(), PayloadKind::Snapshot, Duration::from_secs(1));

        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();
        assert_eq!(publisher.consumer_count(), 2);
        assert_eq!(publisher.publish_once().unwrap(), 2);

        let a = first.try_recv().unwrap();
        let b = second.try_recv().unwrap();
        assert_eq!(a, b);
        assert_eq!(parse(&a)["cpu_usage"], 42.0);
    }

    #[test]
    fn test_process_payload() {
        let store = Arc::new(SharedStateStore::new());
        let publisher = StreamPublisher::new(
            store.clone(),
            PayloadKind::ProcessTable,
            Duration::from_secs(2),
        );
        assert_eq!(
            parse(&publisher.compose().unwrap()),
            json!({"error": "process table not yet sampled"})
        );

        let record = ProcessRecord {
            id: 3,
            name: "init".to_string(),
            ..ProcessRecord::default()
        };
        store
            .set(MetricKey::ProcessDetails, MetricValue::ProcessTable(Some(vec![record])))
            .unwrap();
        let value = parse(&publisher.compose().unwrap());
        assert_eq!(value[0]["Id"], 3);
        assert_eq!(value[0]["ProcessName"], "init");
        assert_eq!(value[0]["WS"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_independently_of_writes() {
        let store = Arc::new(SharedStateStore::new());
        let publisher = Arc::new(StreamPublisher::new(
            store.clone(),
            PayloadKind::Snapshot,
            Duration::from_secs(1),
        ));
        let mut rx = publisher.subscribe();

        let (trigger, signal) = shutdown_channel();
        let handle = publisher.spawn(signal);

        // first tick fires immediately with startup defaults
        let first = parse(&rx.recv().await.unwrap());
        assert!(first["network_speed"]["ping"].is_null());

        store
            .set(
                MetricKey::NetworkSpeed,
                MetricValue::Network(NetworkSpeed {
                    download: 10.0,
                    upload: 2.0,
                    ping: Some(30.0),
                }),
            )
            .unwrap();
        let second = parse(&rx.recv().await.unwrap());
        assert_eq!(second["network_speed"]["download_speed"], 10.0);
        assert_eq!(second["network_speed"]["ping"], 30.0);

        trigger.trigger();
        handle.await.unwrap();
    }
}
