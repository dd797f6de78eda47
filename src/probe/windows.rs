//! Windows probe: `netsh`, PowerShell `Get-Process` and `netstat`.

use super::{CommandRunner, Platform, PlatformProbe};
use crate::error::{Result, SystemError};
use crate::metrics::data::{ProcessRecord, ProcessTableSnapshot, WifiInfo};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const GET_PROCESS_SCRIPT: &str =
    "Get-Process | Select-Object Id, SI, ProcessName, CPU, Handles, NPM, PM, WS | ConvertTo-Json -Depth 10";

pub struct WindowsProbe {
    runner: Arc<dyn CommandRunner>,
}

impl WindowsProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PlatformProbe for WindowsProbe {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn query_wifi(&self) -> WifiInfo {
        match self.runner.run("netsh", &["wlan", "show", "interfaces"]).await {
            Ok(output) => parse_netsh_wlan(&output),
            Err(e) => {
                warn!(error = %e, "WiFi details error");
                WifiInfo::absent()
            }
        }
    }

    async fn query_process_table(&self) -> ProcessTableSnapshot {
        let output = match self
            .runner
            .run("powershell", &["-command", GET_PROCESS_SCRIPT])
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "process table query failed");
                return Vec::new();
            }
        };

        parse_get_process_json(&output).unwrap_or_else(|e| {
            warn!(error = %e, "unexpected Get-Process output");
            Vec::new()
        })
    }

    async fn query_connection_counts(&self) -> HashMap<u32, usize> {
        match self.runner.run("netstat", &["-ano"]).await {
            Ok(output) => parse_netstat_pids(&output),
            Err(e) => {
                warn!(error = %e, "connection query failed");
                HashMap::new()
            }
        }
    }
}

/// Parse `netsh wlan show interfaces`.
pub fn parse_netsh_wlan(output: &str) -> WifiInfo {
    let mut wifi = WifiInfo::absent();

    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if label == "SSID" {
            wifi.ssid = Some(value.to_string());
        } else if label == "Signal" {
            wifi.signal_strength = Some(value.to_string());
        }
    }

    wifi
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsProcess {
    id: Option<u32>,
    #[serde(rename = "SI")]
    si: Option<u32>,
    process_name: Option<String>,
    #[serde(rename = "CPU")]
    cpu: Option<f64>,
    handles: Option<u64>,
    #[serde(rename = "NPM")]
    npm: Option<u64>,
    #[serde(rename = "PM")]
    pm: Option<u64>,
    #[serde(rename = "WS")]
    ws: Option<u64>,
}

impl From<PsProcess> for ProcessRecord {
    fn from(p: PsProcess) -> Self {
        ProcessRecord {
            id: p.id.unwrap_or(0),
            session_id: p.si.unwrap_or(0),
            name: p.process_name.unwrap_or_default(),
            cpu_time: p.cpu.unwrap_or(0.0),
            handle_count: p.handles.unwrap_or(0),
            non_paged_memory: p.npm.unwrap_or(0),
            paged_memory: p.pm.unwrap_or(0),
            working_set: p.ws.unwrap_or(0),
        }
    }
}

/// Parse `ConvertTo-Json` output, which is a bare object for a single process.
pub fn parse_get_process_json(output: &str) -> Result<ProcessTableSnapshot> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(SystemError::parse_error("empty Get-Process output"));
    }

    let parsed: OneOrMany<PsProcess> = serde_json::from_str(trimmed)?;
    let records = match parsed {
        OneOrMany::Many(list) => list.into_iter().map(ProcessRecord::from).collect(),
        OneOrMany::One(single) => vec![ProcessRecord::from(single)],
    };
    Ok(records)
}

/// Count `netstat -ano` rows per owning PID (last column). PID 0 is skipped.
pub fn parse_netstat_pids(output: &str) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();

    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        let proto = tokens.next().unwrap_or_default();
        if !proto.eq_ignore_ascii_case("TCP") && !proto.eq_ignore_ascii_case("UDP") {
            continue;
        }
        if let Some(pid) = tokens.last().and_then(|t| t.parse::<u32>().ok()) {
            if pid != 0 {
                *counts.entry(pid).or_insert(0) += 1;
            }
        }
    }

    counts
}
