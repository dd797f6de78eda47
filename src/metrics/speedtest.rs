//! Active network throughput measurement over HTTP.

use crate::error::{Result, SystemError};
use crate::metrics::config::SpeedTestConfig;
use crate::metrics::data::{round_to, NetworkSpeed};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;

/// Produces one download/upload/ping measurement.
#[async_trait]
pub trait SpeedTester: Send + Sync {
    async fn measure(&self) -> Result<NetworkSpeed>;
}

/// Speed test against plain HTTP download/upload endpoints.
pub struct HttpSpeedTest {
    client: reqwest::Client,
    config: SpeedTestConfig,
}

impl HttpSpeedTest {
    pub fn new(config: SpeedTestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("hostpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SystemError::config_error(format!("Invalid speed test client: {}", e)))?;
        Ok(Self { client, config })
    }

    async fn measure_ping(&self) -> Result<f64> {
        let mut best: Option<Duration> = None;
        for _ in 0..3 {
            let started = Instant::now();
            self.client
                .get(&self.config.ping_url)
                .send()
                .await?
                .error_for_status()?;
            let elapsed = started.elapsed();
            best = Some(best.map_or(elapsed, |b| b.min(elapsed)));
        }
        let best = best.unwrap_or_default();
        Ok(round_to(best.as_secs_f64() * 1000.0, 2))
    }

    async fn measure_download(&self) -> Result<f64> {
        let started = Instant::now();
        let mut response = self
            .client
            .get(&self.config.download_url)
            .send()
            .await?
            .error_for_status()?;

        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len() as u64;
        }
        debug!(bytes = received, "download leg finished");
        Ok(megabits_per_second(received, started.elapsed()))
    }

    async fn measure_upload(&self) -> Result<f64> {
        let body = vec![0u8; self.config.upload_bytes];
        let started = Instant::now();
        self.client
            .post(&self.config.upload_url)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(megabits_per_second(
            self.config.upload_bytes as u64,
            started.elapsed(),
        ))
    }
}

#[async_trait]
impl SpeedTester for HttpSpeedTest {
    async fn measure(&self) -> Result<NetworkSpeed> {
        let ping = self.measure_ping().await?;
        let download = self.measure_download().await?;
        let upload = self.measure_upload().await?;
        Ok(NetworkSpeed {
            download,
            upload,
            ping: Some(ping),
        })
    }
}

/// Throughput in Mbps rounded to two decimals; 0 for an empty interval.
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    round_to(bytes as f64 * 8.0 / secs / 1_000_000.0, 2)
}
