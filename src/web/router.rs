//! Web application router and middleware setup.

use crate::error::{Result, SystemError};
use crate::web::config::WebConfig;
use crate::web::{handlers, stream, AppState};
use axum::{http::HeaderValue, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Create the axum application with all routes and middleware.
pub fn create_app(state: AppState, config: &WebConfig) -> Result<Router> {
    let mut app = Router::new()
        .route("/metrics", get(stream::metrics_stream))
        .route("/process", get(handlers::get_process))
        .route("/health", get(handlers::health_check));

    if state.processes.is_some() {
        app = app.route("/cpu-processes", get(stream::process_stream));
    }

    let mut app = app.with_state(state);

    if config.enable_cors {
        app = app.layer(cors_layer(&config.cors_origins)?);
    }

    app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    Ok(app)
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        info!("CORS allows any origin");
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| {
                SystemError::config_error(format!("Invalid CORS origin {:?}: {}", origin, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::ProcessRecord;
    use crate::metrics::lifecycle::{shutdown_channel, ShutdownTrigger};
    use crate::metrics::publisher::{PayloadKind, StreamPublisher};
    use crate::metrics::store::{MetricKey, MetricValue, SharedStateStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(with_process_stream: bool) -> (AppState, ShutdownTrigger) {
        let store = Arc::new(SharedStateStore::new());
        let (trigger, shutdown) = shutdown_channel();
        let publisher = |kind, ms| {
            Arc::new(StreamPublisher::new(
                store.clone(),
                kind,
                Duration::from_millis(ms),
            ))
        };
        let state = AppState {
            metrics: publisher(PayloadKind::Snapshot, 1000),
            processes: with_process_stream.then(|| publisher(PayloadKind::ProcessTable, 2000)),
            store,
            shutdown,
        };
        (state, trigger)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _trigger) = test_state(true);
        let app = create_app(state, &WebConfig::default()).unwrap();
        let (status, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "hostpulse");
    }

    #[tokio::test]
    async fn test_process_before_and_after_sampling() {
        let (state, _trigger) = test_state(true);
        let store = state.store.clone();
        let app = create_app(state, &WebConfig::default()).unwrap();

        let (status, body) = get_json(app.clone(), "/process").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());

        let record = ProcessRecord {
            id: 42,
            name: "sshd".to_string(),
            cpu_time: 3.2,
            ..ProcessRecord::default()
        };
        store
            .set(MetricKey::ProcessDetails, MetricValue::ProcessTable(Some(vec![record])))
            .unwrap();

        let (_, body) = get_json(app, "/process").await;
        assert_eq!(body[0]["Id"], 42);
        assert_eq!(body[0]["ProcessName"], "sshd");
        assert_eq!(body[0]["CPU"], 3.2);
    }

    #[tokio::test]
    async fn test_metrics_is_an_event_stream() {
        let (state, _trigger) = test_state(true);
        let app = create_app(state, &WebConfig::default()).unwrap();
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
    }

    #[tokio::test]
    async fn test_process_stream_toggle() {
        let (state, _trigger) = test_state(false);
        let app = create_app(state, &WebConfig::default()).unwrap();
        let response = app
            .oneshot(Request::builder().uri("/cpu-processes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let (state, _trigger) = test_state(true);
        let app = create_app(state, &WebConfig::default()).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }

    #[test]
    fn test_invalid_origin_is_rejected() {
        let config = WebConfig::default().with_cors_origins(["bad\norigin"]);
        let (state, _trigger) = test_state(true);
        assert!(create_app(state, &config).is_err());
    }
}
