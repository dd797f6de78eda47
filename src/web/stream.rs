//! Server-sent event streams fed by the publishers.

use crate::metrics::lifecycle::ShutdownSignal;
use crate::metrics::publisher::StreamPublisher;
use crate::web::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures_util::Stream;
use std::convert::Infallible;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

/// `GET /metrics`: one full snapshot per publisher tick.
pub async fn metrics_stream(State(state): State<AppState>) -> Response {
    event_stream("metrics", &state.metrics, state.shutdown.clone()).into_response()
}

/// `GET /cpu-processes`: the process table only, on its own cadence.
pub async fn process_stream(State(state): State<AppState>) -> Response {
    match &state.processes {
        Some(publisher) => {
            event_stream("cpu-processes", publisher, state.shutdown.clone()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Logs the disconnect when the response stream is dropped.
struct ConsumerGuard {
    client_id: Uuid,
    channel: &'static str,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        info!(client_id = %self.client_id, channel = self.channel, "stream consumer disconnected");
    }
}

fn event_stream(
    channel: &'static str,
    publisher: &StreamPublisher,
    mut shutdown: ShutdownSignal,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let guard = ConsumerGuard {
        client_id: Uuid::new_v4(),
        channel,
    };
    info!(client_id = %guard.client_id, channel, "stream consumer connected");

    let events = BroadcastStream::new(publisher.subscribe()).filter_map(move |item| match item {
        Ok(payload) => Some(Ok(Event::default().data(payload.as_ref()))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            // a slow consumer misses ticks, the next one carries fresh state
            warn!(client_id = %guard.client_id, skipped, "stream consumer lagging");
            None
        }
    });

    // end the response on shutdown so graceful shutdown is not held open
    let events = futures_util::StreamExt::take_until(events, async move { shutdown.wait().await });

    Sse::new(events).keep_alive(KeepAlive::default())
}
