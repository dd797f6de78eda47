//! OS-specific probes translating native command output into structured records.
//!
//! One [`PlatformProbe`] implementation exists per supported operating system and
//! is chosen once at startup. Probes fail closed: on any command or parse failure
//! they log and return an empty or absent-filled record.

pub mod columnar;
pub mod command;
pub mod linux;
pub mod macos;
pub mod windows;

pub use command::{CannedCommandRunner, CommandRunner, SystemCommandRunner};
pub use linux::LinuxProbe;
pub use macos::MacOsProbe;
pub use windows::WindowsProbe;

use crate::metrics::data::{ProcessTableSnapshot, WifiInfo};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Operating system families with a dedicated probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unsupported,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unsupported
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Windows => "Windows",
            Platform::Linux => "Linux",
            Platform::MacOs => "macOS",
            Platform::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Platform capability used by the probe-backed collectors.
#[async_trait]
pub trait PlatformProbe: Send + Sync {
    fn platform(&self) -> Platform;

    /// Active Wi-Fi network, both fields absent on failure.
    async fn query_wifi(&self) -> WifiInfo;

    /// Uniform process table, empty on failure.
    async fn query_process_table(&self) -> ProcessTableSnapshot;

    /// Open network connections per PID. Processes the current account may not
    /// inspect are missing rather than reported as errors.
    async fn query_connection_counts(&self) -> HashMap<u32, usize>;
}

/// Probe for platforms without native support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProbe;

#[async_trait]
impl PlatformProbe for UnsupportedProbe {
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
        HashMap::new()
    }
}

/// Build the probe for `platform` on top of `runner`.
pub fn probe_for(platform: Platform, runner: Arc<dyn CommandRunner>) -> Arc<dyn PlatformProbe> {
    match platform {
        Platform::Windows => Arc::new(WindowsProbe::new(runner)),
        Platform::Linux => Arc::new(LinuxProbe::new(runner)),
        Platform::MacOs => Arc::new(MacOsProbe::new(runner)),
        Platform::Unsupported => Arc::new(UnsupportedProbe),
    }
}

/// Probe for the host, running real commands.
pub fn detect_probe() -> Arc<dyn PlatformProbe> {
    let platform = Platform::detect();
    tracing::info!(%platform, "selected platform probe");
    probe_for(platform, Arc::new(SystemCommandRunner::default()))
}

/// Parse a size such as `51200`, `1.2g` or `512m` given in `unit` bytes.
pub(crate) fn parse_scaled_size(value: &str, unit: u64) -> Option<u64> {
    let value = value.trim().replace(',', ".");
    let (number, multiplier) = match value.chars().last()?.to_ascii_lowercase() {
        'k' => (&value[..value.len() - 1], 1024),
        'm' => (&value[..value.len() - 1], 1024 * 1024),
        'g' => (&value[..value.len() - 1], 1024 * 1024 * 1024),
        't' => (&value[..value.len() - 1], 1024u64.pow(4)),
        _ => (value.as_str(), unit),
    };
    let number: f64 = number.parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some((number * multiplier as f64) as u64)
}

/// Parse a decimal that may use a locale comma.
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}
