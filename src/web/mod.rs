//! HTTP surface: event streams, the process document and a health probe.

pub mod config;
pub mod handlers;
pub mod router;
pub mod stream;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::error::{Result, SystemError};
use crate::metrics::lifecycle::ShutdownSignal;
use crate::metrics::monitor::SystemMonitor;
use crate::metrics::publisher::StreamPublisher;
use crate::metrics::store::SharedStateStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SharedStateStore>,
    pub metrics: Arc<StreamPublisher>,
    /// `None` when the `/cpu-processes` stream is disabled
    pub processes: Option<Arc<StreamPublisher>>,
    /// Ends open event streams
    pub shutdown: ShutdownSignal,
}

impl AppState {
    pub fn new(monitor: &SystemMonitor, config: &WebConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            store: monitor.store(),
            metrics: monitor.snapshot_publisher(),
            processes: config
                .enable_process_stream
                .then(|| monitor.process_publisher()),
            shutdown,
        }
    }
}

/// Serve the monitor's store until `shutdown` fires.
///
/// Spawns the publishers; collectors are started separately with
/// [`SystemMonitor::start`].
pub async fn start_web_server(
    config: WebConfig,
    monitor: &SystemMonitor,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let state = AppState::new(monitor, &config, shutdown.clone());
    let app = create_app(state.clone(), &config)?;

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| SystemError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("hostpulse listening on http://{}", addr);
    info!("Metrics stream: http://{}/metrics", addr);
    if state.processes.is_some() {
        info!("Process stream: http://{}/cpu-processes", addr);
    }

    let metrics_task = state.metrics.spawn(shutdown.clone());
    let process_task = state
        .processes
        .as_ref()
        .map(|publisher| publisher.spawn(shutdown.clone()));

    let mut stop = shutdown;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { stop.wait().await })
        .await
        .map_err(|e| SystemError::web_server_error(format!("Server error: {}", e)))?;

    let _ = metrics_task.await;
    if let Some(task) = process_task {
        let _ = task.await;
    }
    info!("web server stopped");

    Ok(())
}
