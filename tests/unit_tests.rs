use hostpulse::{
    error::SystemError,
    metrics::{
        data::*,
        ranking::rank_top,
        store::{MetricKey, MetricValue, SharedStateStore},
    },
    probe::{columnar::parse_columnar, Platform, PlatformProbe},
    WebConfig,
};
use serde_json::json;
use std::sync::Arc;

/// Startup snapshot carries the documented sentinels for every key
#[test]
fn test_startup_snapshot_sentinels() {
    let store = SharedStateStore::new();
    let value = serde_json::to_value(store.snapshot()).expect("Should serialize snapshot");

    assert_eq!(
        value,
        json!({
            "cpu_usage": 0.0,
            "per_core_usage": [],
            "memory_usage": 0.0,
            "disk_usage": 0.0,
            "network_speed": {"download_speed": 0.0, "upload_speed": 0.0, "ping": null},
            "wifi_details": {"SSID": null, "Signal Strength": null},
            "top_cpu_processes": [],
            "top_memory_processes": [],
            "top_network_processes": [],
            "process_details": null
        })
    );
}

/// A written value is the value read back, for every key shape
#[test]
fn test_store_set_then_get() {
    let store = Arc::new(SharedStateStore::new());
    let cases = vec![
        (MetricKey::CpuUsage, MetricValue::Scalar(42.0)),
        (MetricKey::PerCoreUsage, MetricValue::Vector(vec![10.0, 20.0])),
        (
            MetricKey::WifiDetails,
            MetricValue::Wifi(WifiInfo {
                ssid: Some("lab".to_string()),
                signal_strength: Some("-61".to_string()),
            }),
        ),
        (MetricKey::ProcessDetails, MetricValue::ProcessTable(Some(Vec::new()))),
    ];

    for (key, value) in cases {
        let writer = store.claim(key).expect("Key should be unowned");
        writer.set(value.clone()).expect("Should accept matching shape");
        assert_eq!(store.get(key), value);
    }
}

#[test]
fn test_store_rejects_mismatched_shape() {
    let store = Arc::new(SharedStateStore::new());
    let writer = store.claim(MetricKey::CpuUsage).expect("Key should be unowned");
    let result = writer.set(MetricValue::Vector(vec![1.0]));
    assert!(matches!(result, Err(SystemError::Store(_))));
    assert_eq!(store.get(MetricKey::CpuUsage), MetricValue::Scalar(0.0));
}

#[test]
fn test_single_writer_per_key() {
    let store = Arc::new(SharedStateStore::new());
    let writer = store.claim(MetricKey::MemoryUsage).expect("First claim should succeed");
    assert!(store.claim(MetricKey::MemoryUsage).is_err());
    assert!(store.claim(MetricKey::DiskUsage).is_ok());

    writer.set(MetricValue::Scalar(71.5)).expect("Owner should write");
    assert_eq!(store.get(MetricKey::MemoryUsage), MetricValue::Scalar(71.5));

    drop(writer);
    // released key keeps its last value for the next owner
    let next = store.claim(MetricKey::MemoryUsage).expect("Released key can be claimed");
    assert_eq!(store.get(next.key()), MetricValue::Scalar(71.5));
}

/// Ranked lists are ordered descending, capped and serialized with per-list fields
#[test]
fn test_rankings_on_the_wire() {
    let samples = (1..=8).map(|pid| RankedProcess {
        pid,
        name: format!("worker{pid}"),
        value: (pid % 4) as f64,
    });
    let ranked = rank_top(RankMetric::Connections, samples, 5);

    assert_eq!(ranked.len(), 5);
    let values: Vec<f64> = ranked.entries().iter().map(|e| e.value).collect();
    assert_eq!(values, vec![3.0, 3.0, 2.0, 2.0, 1.0]);
    // ties keep enumeration order
    assert_eq!(ranked.entries()[0].pid, 3);
    assert_eq!(ranked.entries()[1].pid, 7);

    let value = serde_json::to_value(&ranked).expect("Should serialize ranking");
    assert_eq!(value[0], json!({"pid": 3, "name": "worker3", "connections": 3}));
}

#[test]
fn test_columnar_skips_short_lines() {
    let output = "noise line\nPID USER %CPU COMMAND\n123 root 5.0\n124 root 3.2 sshd\n";
    let rows = parse_columnar(output, ["PID", "COMMAND"]);

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["PID"], "124");
    assert_eq!(rows[0]["%CPU"], "3.2");
    assert_eq!(rows[0]["COMMAND"], "sshd");
}

#[tokio::test]
async fn test_unsupported_platform_fails_closed() {
    let probe = hostpulse::probe::probe_for(
        Platform::Unsupported,
        Arc::new(hostpulse::probe::CannedCommandRunner::new()),
    );
    assert_eq!(probe.platform(), Platform::Unsupported);
    assert!(probe.query_wifi().await.is_absent());
    assert!(probe.query_process_table().await.is_empty());
    assert!(probe.query_connection_counts().await.is_empty());
}

#[test]
fn test_web_config_serialization() {
    let config = WebConfig::default().with_port(9000);
    let json = serde_json::to_string(&config).expect("Should serialize config");
    let parsed: WebConfig = serde_json::from_str(&json).expect("Should deserialize config");
    assert_eq!(parsed, config);
}
