//! HTTP surface: the SSE stream endpoint, the message endpoint and CORS.
//!
//! | Request                         | Response                                  |
//! |---------------------------------|-------------------------------------------|
//! | `GET <sse_path>`                | SSE stream, `endpoint` event first        |
//! | `POST <message_path>?sessionId` | 202 and the result on the session stream  |
//! | `OPTIONS` on either path        | 204 preflight                             |
//! | anything else                   | 404                                       |
//!
//! Every response allows any origin.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::error::{BridgeError, SessionError};
use crate::mcp::bridge::TransportBridge;
use crate::mcp::session::OpenedSession;

/// Interval between SSE keep-alive comments.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Builds the router serving `sse_path` and the bridge's message path.
pub fn router(bridge: TransportBridge, sse_path: &str) -> Router {
    let message_path = bridge.message_path().to_string();

    Router::new()
        .route(
            sse_path,
            get(open_stream).options(preflight).fallback(not_found),
        )
        .route(
            &message_path,
            post(post_message).options(preflight).fallback(not_found),
        )
        .fallback(not_found)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(bridge)
}

/// Serves `router` on `listener` until `shutdown` completes.
///
/// Open streams never finish on their own, so every session is closed as
/// soon as the shutdown signal fires; in-flight requests then drain.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve<F>(
    listener: TcpListener,
    bridge: TransportBridge,
    sse_path: &str,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(bridge.clone(), sse_path);
    let signal = async move {
        shutdown.await;
        tracing::info!("Shutdown signal received, closing sessions");
        bridge.shutdown();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
}

async fn open_stream(State(bridge): State<TransportBridge>) -> Response {
    let OpenedSession { events, guard, .. } = match bridge.open_stream() {
        Ok(opened) => opened,
        Err(e) => {
            tracing::error!(error = %e, "Failed to establish SSE connection");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to establish SSE connection",
            )
                .into_response();
        }
    };

    // The guard lives as long as the body; dropping the body closes the session.
    let stream = ReceiverStream::new(events).map(move |event| {
        tracing::trace!(session_id = %guard.id(), event = event.name(), "Sending event");
        Ok::<_, Infallible>(event.into_sse())
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response()
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

async fn post_message(
    State(bridge): State<TransportBridge>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let (status, message) = match query.session_id.filter(|id| !id.is_empty()) {
        None => (
            StatusCode::BAD_REQUEST,
            "Missing sessionId query parameter".to_string(),
        ),
        Some(session_id) => deliver(&bridge, &session_id, &body).await,
    };

    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_HEADERS, "content-type")],
        message,
    )
        .into_response()
}

async fn deliver(bridge: &TransportBridge, session_id: &str, body: &[u8]) -> (StatusCode, String) {
    match bridge.post_command(session_id, body).await {
        Ok(_) => (StatusCode::ACCEPTED, "Accepted".to_string()),
        Err(BridgeError::Session(SessionError::UnknownSession { .. })) => {
            tracing::debug!(session_id = %session_id, "Message for unknown session");
            (StatusCode::NOT_FOUND, "Unknown session".to_string())
        }
        Err(BridgeError::BadRequest(message)) => {
            tracing::debug!(session_id = %session_id, error = %message, "Malformed message");
            (StatusCode::BAD_REQUEST, message)
        }
        Err(BridgeError::Session(SessionError::Transport { .. })) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to process message".to_string(),
        ),
    }
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "content-type"),
        ],
    )
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
