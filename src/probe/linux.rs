//! Linux probe: `nmcli`, `top` and the `/proc` file descriptor tables.

use super::columnar::{parse_columnar, ColumnRecord};
use super::{parse_decimal, parse_scaled_size, CommandRunner, Platform, PlatformProbe};
use crate::metrics::data::{ProcessRecord, ProcessTableSnapshot, WifiInfo};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct LinuxProbe {
    runner: Arc<dyn CommandRunner>,
    proc_root: PathBuf,
}

impl LinuxProbe {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_proc_root(runner, "/proc")
    }

    /// Use an alternative procfs mount for the connection scan.
    pub fn with_proc_root(runner: Arc<dyn CommandRunner>, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            proc_root: proc_root.into(),
        }
    }
}

#[async_trait]
impl PlatformProbe for LinuxProbe {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    async fn query_wifi(&self) -> WifiInfo {
        match self
            .runner
            .run("nmcli", &["-t", "-f", "active,ssid,signal", "dev", "wifi"])
            .await
        {
            Ok(output) => parse_nmcli_wifi(&output),
            Err(e) => {
                warn!(error = %e, "WiFi details error");
                WifiInfo::absent()
            }
        }
    }

    async fn query_process_table(&self) -> ProcessTableSnapshot {
        match self.runner.run("top", &["-b", "-n", "1"]).await {
            Ok(output) => parse_top_processes(&output),
            Err(e) => {
                warn!(error = %e, "process table query failed");
                Vec::new()
            }
        }
    }

    async fn query_connection_counts(&self) -> HashMap<u32, usize> {
        let root = self.proc_root.clone();
        match tokio::task::spawn_blocking(move || count_proc_sockets(&root)).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!(error = %e, "connection scan task failed");
                HashMap::new()
            }
        }
    }
}

/// Parse `nmcli -t -f active,ssid,signal dev wifi`; the active row wins.
pub fn parse_nmcli_wifi(output: &str) -> WifiInfo {
    for line in output.lines() {
        let fields = split_terse(line);
        if fields.first().map(String::as_str) != Some("yes") {
            continue;
        }
        let non_empty = |field: Option<&String>| {
            field
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        return WifiInfo {
            ssid: non_empty(fields.get(1)),
            signal_strength: non_empty(fields.get(2)),
        };
    }
    WifiInfo::absent()
}

/// Split an nmcli terse line on `:` honouring `\:` and `\\` escapes.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = vec![String::new()];
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    if let Some(field) = fields.last_mut() {
                        field.push(escaped);
                    }
                }
            }
            ':' => fields.push(String::new()),
            _ => {
                if let Some(field) = fields.last_mut() {
                    field.push(c);
                }
            }
        }
    }
    fields
}

/// Transform `top -b -n 1` output into process records.
///
/// Only `PID`, `COMMAND`, `%CPU` and `RES` exist in top's default columns; the
/// remaining fields stay zero. Rows whose PID is not numeric are dropped.
pub fn parse_top_processes(output: &str) -> ProcessTableSnapshot {
    parse_columnar(output, ["PID", "COMMAND"])
        .iter()
        .filter_map(top_record)
        .collect()
}

fn top_record(row: &ColumnRecord) -> Option<ProcessRecord> {
    let id = match row.get("PID")?.parse::<u32>() {
        Ok(id) => id,
        Err(_) => {
            debug!(row = ?row, "skipping top row with invalid PID");
            return None;
        }
    };

    Some(ProcessRecord {
        id,
        name: row.get("COMMAND").cloned().unwrap_or_default(),
        cpu_time: row
            .get("%CPU")
            .and_then(|v| parse_decimal(v))
            .unwrap_or(0.0),
        working_set: row
            .get("RES")
            .and_then(|v| parse_scaled_size(v, 1024))
            .unwrap_or(0),
        ..ProcessRecord::default()
    })
}

/// Socket tables listing inet connections.
const INET_TABLES: [&str; 4] = ["tcp", "tcp6", "udp", "udp6"];

/// Count inet socket descriptors per process under `proc_root`.
///
/// Unix-domain and netlink sockets are not connections, so only descriptors whose
/// `socket:[inode]` appears in one of the `net/` inet tables count.
pub fn count_proc_sockets(proc_root: &Path) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();

    let inodes = inet_socket_inodes(proc_root);
    if inodes.is_empty() {
        return counts;
    }

    let entries = match fs::read_dir(proc_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %proc_root.display(), error = %e, "cannot list processes");
            return counts;
        }
    };

    for entry in entries.flatten() {
        let pid = match entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) {
            Some(pid) => pid,
            None => continue,
        };

        // permission denied for other users' processes is expected
        let fds = match fs::read_dir(entry.path().join("fd")) {
            Ok(fds) => fds,
            Err(_) => continue,
        };

        let sockets = fds
            .flatten()
            .filter_map(|fd| fs::read_link(fd.path()).ok())
            .filter_map(|target| socket_inode(&target.to_string_lossy()))
            .filter(|inode| inodes.contains(inode))
            .count();

        if sockets > 0 {
            counts.insert(pid, sockets);
        }
    }

    counts
}

/// Inodes of every socket in the inet tables under `proc_root/net`.
fn inet_socket_inodes(proc_root: &Path) -> HashSet<u64> {
    let mut inodes = HashSet::new();
    for table in INET_TABLES {
        let path = proc_root.join("net").join(table);
        match fs::read_to_string(&path) {
            Ok(contents) => inodes.extend(parse_socket_table(&contents)),
            // tcp6/udp6 are absent when IPv6 is disabled
            Err(e) => debug!(path = %path.display(), error = %e, "socket table unreadable"),
        }
    }
    inodes
}

/// Inode column of a `/proc/net/{tcp,udp}` style table.
fn parse_socket_table(contents: &str) -> impl Iterator<Item = u64> + '_ {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(9)?.parse::<u64>().ok())
        .filter(|inode| *inode != 0)
}

/// `socket:[12345]` -> `12345`
fn socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}
