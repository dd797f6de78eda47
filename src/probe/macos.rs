//! macOS probe: `airport`, `ps` and `lsof`.

use super::columnar::parse_columnar;
use super::{parse_decimal, parse_scaled_size, CommandRunner, Platform, PlatformProbe};
use crate::metrics::data::{ProcessRecord, ProcessTableSnapshot, WifiInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const AIRPORT: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";

pub struct MacOsProbe {
    runner: Arc<dyn CommandRunner>,
}

impl MacOsProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PlatformProbe for MacOsProbe {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn query_wifi(&self) -> WifiInfo {
        match self.runner.run(AIRPORT, &["-I"]).await {
            Ok(output) => parse_airport_info(&output),
            Err(e) => {
                warn!(error = %e, "WiFi details error");
                WifiInfo::absent()
            }
        }
    }

    async fn query_process_table(&self) -> ProcessTableSnapshot {
        match self.runner.run("ps", &["-axo", "pid,%cpu,rss,command"]).await {
            Ok(output) => parse_ps_processes(&output),
            Err(e) => {
                warn!(error = %e, "process table query failed");
                Vec::new()
            }
        }
    }

    async fn query_connection_counts(&self) -> HashMap<u32, usize> {
        match self.runner.run("lsof", &["-i", "-n", "-P"]).await {
            Ok(output) => parse_lsof_pids(&output),
            Err(e) => {
                warn!(error = %e, "connection query failed");
                HashMap::new()
            }
        }
    }
}

/// Parse `airport -I`; signal is the RSSI in dBm.
pub fn parse_airport_info(output: &str) -> WifiInfo {
    let mut wifi = WifiInfo::absent();

    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match label.trim() {
            "SSID" => wifi.ssid = Some(value.to_string()),
            "agrCtlRSSI" => wifi.signal_strength = Some(value.to_string()),
            _ => {}
        }
    }

    wifi
}

/// Parse `ps -axo pid,%cpu,rss,command` (RSS in KiB).
pub fn parse_ps_processes(output: &str) -> ProcessTableSnapshot {
    parse_columnar(output, ["PID", "COMMAND"])
        .iter()
        .filter_map(|row| {
            let id = row.get("PID")?.parse::<u32>().ok()?;
            Some(ProcessRecord {
                id,
                name: row.get("COMMAND").cloned().unwrap_or_default(),
                cpu_time: row.get("%CPU").and_then(|v| parse_decimal(v)).unwrap_or(0.0),
                working_set: row
                    .get("RSS")
                    .and_then(|v| parse_scaled_size(v, 1024))
                    .unwrap_or(0),
                ..ProcessRecord::default()
            })
        })
        .collect()
}

/// Count `lsof -i` rows per PID.
pub fn parse_lsof_pids(output: &str) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for row in parse_columnar(output, ["COMMAND", "PID"]) {
        if let Some(pid) = row.get("PID").and_then(|p| p.parse::<u32>().ok()) {
            *counts.entry(pid).or_insert(0) += 1;
        }
    }
    counts
}
