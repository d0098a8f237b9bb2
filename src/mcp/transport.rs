//! SSE transport for MCP server.
//!
//! This module implements the outbound half of the HTTP+SSE transport:
//!
//! - The first event on a stream is `endpoint`, whose data is the URL the
//!   client must POST its messages to (including the `sessionId` parameter)
//! - Every JSON-RPC response is sent as a `message` event
//! - Messages are UTF-8 encoded JSON and must not contain embedded newlines
//!
//! # Thread Safety
//!
//! Writers push events into a bounded channel; the HTTP layer drains the
//! channel into the response body. Dropping every writer ends the stream.

use axum::response::sse::Event;
use tokio::sync::mpsc;

use crate::error::SessionError;
use crate::mcp::protocol::OutgoingMessage;

/// Capacity of the per-session outbound channel.
pub const OUTBOUND_CAPACITY: usize = 64;

/// An event queued for a session's outbound stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Tells the client where to post its messages.
    Endpoint(String),
    /// A serialised JSON-RPC message.
    Message(String),
}

impl ServerEvent {
    /// Returns the SSE event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Endpoint(_) => "endpoint",
            Self::Message(_) => "message",
        }
    }

    /// Returns the event payload.
    #[must_use]
    pub fn data(&self) -> &str {
        match self {
            Self::Endpoint(data) | Self::Message(data) => data,
        }
    }

    /// Converts into an axum SSE event.
    #[must_use]
    pub fn into_sse(self) -> Event {
        let name = self.name();
        match self {
            Self::Endpoint(data) | Self::Message(data) => Event::default().event(name).data(data),
        }
    }
}

/// The writing side of one session's outbound stream.
#[derive(Debug, Clone)]
pub struct SseTransport {
    session_id: String,
    sender: mpsc::Sender<ServerEvent>,
}

impl SseTransport {
    /// Creates a transport and the receiver that feeds the stream body.
    #[must_use]
    pub fn channel(session_id: impl Into<String>) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_CAPACITY);
        let transport = Self {
            session_id: session_id.into(),
            sender,
        };
        (transport, receiver)
    }

    /// Returns whether the stream side has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queues the `endpoint` event without waiting.
    ///
    /// Used during the handshake, when the channel is known to be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream side is already gone.
    pub fn announce_endpoint(&self, endpoint: String) -> Result<(), SessionError> {
        self.sender
            .try_send(ServerEvent::Endpoint(endpoint))
            .map_err(|e| self.transport_error(format!("failed to send endpoint event: {e}")))
    }

    /// Writes a JSON-RPC message to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails or the stream has closed.
    pub async fn write_message(&self, message: &OutgoingMessage) -> Result<(), SessionError> {
        let json = serde_json::to_string(message)
            .map_err(|e| self.transport_error(format!("failed to serialise message: {e}")))?;

        self.write_raw(json).await
    }

    /// Writes a raw JSON string as a `message` event.
    async fn write_raw(&self, json: String) -> Result<(), SessionError> {
        // SSE data lines must not contain embedded newlines
        debug_assert!(
            !json.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.sender
            .send(ServerEvent::Message(json))
            .await
            .map_err(|_| self.transport_error("outbound stream closed".to_string()))
    }

    fn transport_error(&self, message: String) -> SessionError {
        SessionError::Transport {
            id: self.session_id.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

    #[tokio::test]
    async fn endpoint_then_message_in_order() {
        let (transport, mut rx) = SseTransport::channel("s1");
        transport
            .announce_endpoint("/mcp/messages?sessionId=s1".to_string())
            .unwrap();
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "message": "hello world",
                "nested": {"key": "value"}
            }),
        );
        transport.write_message(&response.into()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name(), "endpoint");
        assert_eq!(first.data(), "/mcp/messages?sessionId=s1");

        let second = rx.recv().await.unwrap();
        assert_eq!(second.name(), "message");
        assert!(!second.data().contains('\n'));
        assert!(second.data().contains("hello world"));
    }

    #[tokio::test]
    async fn write_after_receiver_dropped_fails() {
        let (transport, rx) = SseTransport::channel("s2");
        drop(rx);
        assert!(transport.is_closed());

        let error = JsonRpcError::method_not_found(RequestId::Number(1), "test/method");
        let err = transport.write_message(&error.into()).await.unwrap_err();
        assert!(matches!(err, SessionError::Transport { ref id, .. } if id == "s2"));
    }

    #[test]
    fn handshake_fails_on_closed_stream() {
        let (transport, rx) = SseTransport::channel("s3");
        drop(rx);
        assert!(transport.announce_endpoint("/x".to_string()).is_err());
    }
}
