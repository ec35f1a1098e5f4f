//! HTTP endpoint the hosting platform delivers alert events to.

use std::future::Future;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use forwarder::EventForwarder;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::cloud_event::read_cloud_event;
use crate::ListenerError;

/// Builds the router: `POST /` receives events, `GET /healthz` answers `ok`.
pub fn router(forwarder: EventForwarder) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(health))
        .with_state(forwarder)
}

/// Serves events on `listener` until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn serve<F>(
    listener: TcpListener,
    forwarder: EventForwarder,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, dispatch_target = %forwarder.target(), "Listening for tester device events");
    }
    axum::serve(listener, router(forwarder))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn receive_event(
    State(forwarder): State<EventForwarder>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ListenerError> {
    let (encoding, cloud_event) = read_cloud_event(&headers, &body)?;
    debug!(
        id = %cloud_event.id,
        source = %cloud_event.source,
        event_type = %cloud_event.event_type,
        ?encoding,
        "Received CloudEvent"
    );

    if !cloud_event.is_new_tester_ios_device() {
        warn!(
            id = %cloud_event.id,
            alert_type = cloud_event.alert_type.as_deref(),
            "Ignoring alert that is not a new tester iOS device"
        );
        return Ok(StatusCode::ACCEPTED);
    }

    let event = cloud_event.device_registration()?;
    forwarder.forward(&event).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
