//! hostpulse - host telemetry aggregator binary
//!
//! Runs the collectors and serves the merged snapshot stream over HTTP.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use hostpulse::metrics::MonitorConfig;
use hostpulse::probe::detect_probe;
use hostpulse::PlatformProbe;
use hostpulse::{
    shutdown_channel, start_web_server, MetricsSnapshot, SystemMonitor, WebConfig,
    DEFAULT_INTERVAL_MS, DEFAULT_WEB_PORT,
};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "hostpulse")]
#[command(about = "Host telemetry aggregator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Samples CPU, memory, disk, network, Wi-Fi and process metrics and streams merged snapshots as server-sent events")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Snapshot publish interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
    interval: u64,

    /// Process table stream interval in milliseconds
    #[arg(long, default_value_t = 2000)]
    process_interval: u64,

    /// Skip the periodic network speed test
    #[arg(long)]
    no_speed_test: bool,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,

    /// Do not serve the /cpu-processes stream
    #[arg(long)]
    no_process_stream: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve,

    /// Sample for a short warm-up, print one snapshot and exit
    Snapshot(SnapshotArgs),

    /// Show what the platform probe reports
    Probe,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,

    /// Warm-up before reading the store, in milliseconds
    #[arg(long, default_value_t = 1500)]
    warmup: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await?,
        Some(Commands::Probe) => probe_command().await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    // RUST_LOG wins when set, otherwise the flags pick the level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(log_level(cli)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

fn default_filter(level: Level) -> EnvFilter {
    EnvFilter::new(level.as_str())
}

fn monitor_config(cli: &Cli) -> MonitorConfig {
    MonitorConfig::default()
        .with_publish_interval_ms(cli.interval)
        .with_process_stream_interval_ms(cli.process_interval)
        .with_speed_test(!cli.no_speed_test)
}

fn web_config(cli: &Cli) -> WebConfig {
    WebConfig::new(&cli.host, cli.port)
        .with_cors(!cli.no_cors)
        .with_process_stream(!cli.no_process_stream)
}

async fn serve_command(cli: &Cli) -> anyhow::Result<()> {
    let monitor = SystemMonitor::new(monitor_config(cli)).context("failed to build monitor")?;
    info!(platform = %monitor.probe().platform(), "monitor initialized");

    let (trigger, signal) = shutdown_channel();
    let collectors = monitor.start(signal.clone())?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C, shutting down"),
        }
        trigger.trigger();
    });

    let web = web_config(cli);
    info!("Web server configuration:");
    info!("  - Bind address: {}", web.bind_address());
    info!("  - CORS enabled: {}", web.enable_cors);
    info!("  - Process stream: {}", web.enable_process_stream);
    info!("  - Publish interval: {}ms", cli.interval);

    let served = start_web_server(web, &monitor, signal).await;
    if served.is_err() {
        // bind or serve failure, shutdown was never triggered
        collectors.abort();
    }
    collectors.join().await;
    served?;

    Ok(())
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let config = monitor_config(cli);
    let monitor = SystemMonitor::new(config)?;
    let (trigger, signal) = shutdown_channel();
    let collectors = monitor.start(signal)?;

    tokio::time::sleep(Duration::from_millis(args.warmup)).await;
    let snapshot = monitor.store().snapshot();

    trigger.trigger();
    collectors.join().await;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        "pretty" => print_pretty_snapshot(&snapshot),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn probe_command() -> anyhow::Result<()> {
    let probe = detect_probe();
    println!("Platform: {}", probe.platform());

    let wifi = probe.query_wifi().await;
    println!(
        "Wi-Fi: {} ({})",
        wifi.ssid.as_deref().unwrap_or("not connected"),
        wifi.signal_strength.as_deref().unwrap_or("no signal")
    );

    let table = probe.query_process_table().await;
    println!("Processes: {}", table.len());
    for record in table.iter().take(10) {
        println!(
            "  {:>7}  {:>8.2}  {:>12}  {}",
            record.id, record.cpu_time, record.working_set, record.name
        );
    }

    let connections = probe.query_connection_counts().await;
    println!("Processes with open connections: {}", connections.len());

    Ok(())
}

fn print_pretty_snapshot(snapshot: &MetricsSnapshot) {
    println!("System Snapshot ({})", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("==========================================");
    println!();

    println!("CPU: {:.1}%", snapshot.cpu_usage);
    let cores: Vec<String> = snapshot
        .per_core_usage
        .iter()
        .map(|usage| format!("{:.0}", usage))
        .collect();
    println!("  Cores: [{}]", cores.join(", "));
    println!("Memory: {:.1}%", snapshot.memory_usage);
    println!("Disk: {:.1}%", snapshot.disk_usage);
    println!();

    let speed = &snapshot.network_speed;
    match speed.ping {
        Some(ping) => println!(
            "Network: {:.2} Mbps down, {:.2} Mbps up, {:.1} ms ping",
            speed.download, speed.upload, ping
        ),
        None => println!("Network: not measured"),
    }
    println!(
        "Wi-Fi: {} ({})",
        snapshot.wifi_details.ssid.as_deref().unwrap_or("not connected"),
        snapshot
            .wifi_details
            .signal_strength
            .as_deref()
            .unwrap_or("no signal")
    );
    println!();

    for (title, list) in [
        ("Top CPU", &snapshot.top_cpu_processes),
        ("Top memory", &snapshot.top_memory_processes),
        ("Top network", &snapshot.top_network_processes),
    ] {
        println!("{}:", title);
        for entry in list.entries() {
            println!("  {:>7}  {:>8.2}  {}", entry.pid, entry.value, entry.name);
        }
    }

    match &snapshot.process_details {
        Some(table) => println!("Process table: {} rows", table.len()),
        None => println!("Process table: not yet sampled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["hostpulse", "--port", "9090", "--no-speed-test"]).unwrap();
        assert_eq!(cli.port, 9090);
        assert!(monitor_config(&cli).validate().is_ok());
        assert!(!monitor_config(&cli).enable_speed_test);
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["hostpulse"]).unwrap();
        assert_eq!(cli.port, DEFAULT_WEB_PORT);
        assert_eq!(cli.interval, DEFAULT_INTERVAL_MS);
        assert_eq!(cli.host, "0.0.0.0");
        assert!(cli.command.is_none());

        let web = web_config(&cli);
        assert!(web.enable_cors);
        assert!(web.enable_process_stream);
    }

    #[test]
    fn test_log_level_flags() {
        let quiet = Cli::try_parse_from(["hostpulse"]).unwrap();
        let verbose = Cli::try_parse_from(["hostpulse", "--verbose"]).unwrap();
        let debug = Cli::try_parse_from(["hostpulse", "-d"]).unwrap();
        assert_eq!(log_level(&quiet), Level::WARN);
        assert_eq!(log_level(&verbose), Level::INFO);
        assert_eq!(log_level(&debug), Level::DEBUG);
    }

    #[test]
    fn test_default_filter_enables_selected_level() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(default_filter(Level::WARN))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
        });

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(default_filter(Level::DEBUG))
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }

    #[test]
    fn test_subcommands() {
        let cli = Cli::try_parse_from(["hostpulse", "snapshot", "--format", "json"]).unwrap();
        match cli.command {
            Some(Commands::Snapshot(args)) => assert_eq!(args.format, "json"),
            _ => panic!("expected snapshot subcommand"),
        }

        let cli = Cli::try_parse_from(["hostpulse", "--no-process-stream", "probe"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Probe)));
        assert!(!web_config(&cli).enable_process_stream);
    }
}
