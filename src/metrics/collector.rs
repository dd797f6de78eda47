//! Periodic collectors: one sampling function bound to one metric key.

use crate::error::Result;
use crate::metrics::lifecycle::ShutdownSignal;
use crate::metrics::store::{KeyWriter, MetricKey, MetricValue};
use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A sampling function producing the next value for one key.
///
/// Returning `Err` leaves the stored value untouched for this cycle.
#[async_trait]
pub trait Sampler: Send {
    async fn sample(&mut self) -> Result<MetricValue>;
}

/// Adapter turning a synchronous closure into a [`Sampler`].
pub struct FnSampler<F>(pub F);

#[async_trait]
impl<F> Sampler for FnSampler<F>
where
    F: FnMut() -> Result<MetricValue> + Send,
{
    async fn sample(&mut self) -> Result<MetricValue> {
        (self.0)()
    }
}

/// What a single collector cycle did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Written,
    Skipped,
}

/// A periodic sampling task owning exactly one metric key.
pub struct Collector {
    writer: KeyWriter,
    interval: Duration,
    sampler: Box<dyn Sampler>,
}

impl Collector {
    pub fn new(writer: KeyWriter, interval: Duration, sampler: impl Sampler + 'static) -> Self {
        Self {
            writer,
            interval,
            sampler: Box::new(sampler),
        }
    }

    pub fn key(&self) -> MetricKey {
        self.writer.key()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sample once and write the result, or log and skip on failure.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let key = self.writer.key();

        let value = match self.sampler.sample().await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "sampling failed, keeping previous value");
                return CycleOutcome::Skipped;
            }
        };

        match self.writer.set(value) {
            Ok(()) => CycleOutcome::Written,
            Err(e) => {
                warn!(key = %key, error = %e, "sampled value rejected by store");
                CycleOutcome::Skipped
            }
        }
    }

    /// Run cycles until `shutdown` fires: sample, write, sleep `interval`.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        let key = self.writer.key();
        info!(key = %key, interval_ms = self.interval.as_millis() as u64, "collector started");

        while !shutdown.is_triggered() {
            let outcome = tokio::select! {
                outcome = self.run_cycle() => outcome,
                _ = shutdown.wait() => break,
            };
            debug!(key = %key, ?outcome, "collector cycle finished");

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!(key = %key, "collector stopped");
    }

    /// Spawn [`Collector::run`] on the current runtime.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
