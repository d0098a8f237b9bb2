//! Couples the outbound SSE stream with the inbound POST channel.
//!
//! A command arrives on one channel and its result leaves on another: the
//! POST handler only learns whether the command was accepted, while the
//! JSON-RPC response travels over the session's stream. The bridge never
//! keeps a session around between calls; it looks the id up every time.

use crate::error::{BridgeError, SessionError};
use crate::mcp::protocol::{parse_message, IncomingMessage};
use crate::mcp::session::{CloseReason, Delivery, OpenedSession, Session, SessionManager};

/// Session-correlated entry points for the HTTP layer.
#[derive(Debug, Clone)]
pub struct TransportBridge {
    sessions: SessionManager,
    message_path: String,
}

impl TransportBridge {
    /// Creates a bridge that advertises `message_path` to new sessions.
    pub fn new(sessions: SessionManager, message_path: impl Into<String>) -> Self {
        Self {
            sessions,
            message_path: message_path.into(),
        }
    }

    /// Returns the session table.
    #[must_use]
    pub const fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Returns the path clients post their messages to.
    #[must_use]
    pub fn message_path(&self) -> &str {
        &self.message_path
    }

    /// Opens a new streaming session.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails; no session is left behind.
    pub fn open_stream(&self) -> Result<OpenedSession, SessionError> {
        self.sessions.open(&self.message_path)
    }

    /// Forwards a posted command into its session.
    ///
    /// The session is resolved before the payload is decoded, so an unknown
    /// id is reported as such even when the payload is also malformed.
    ///
    /// The command runs on its own task: if the poster goes away, the
    /// response is still written to the stream. Only closing the session
    /// abandons the work, in which case nothing is written.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnknownSession`] for unknown or closed sessions
    /// - [`BridgeError::BadRequest`] for payloads that are not UTF-8 JSON-RPC
    /// - [`SessionError::Transport`] if the response could not be written,
    ///   in which case the session is torn down, or if the command panicked
    pub async fn post_command(
        &self,
        session_id: &str,
        payload: &[u8],
    ) -> Result<Delivery, BridgeError> {
        let session = self.sessions.resolve(session_id)?;

        let payload = std::str::from_utf8(payload)
            .map_err(|e| BridgeError::BadRequest(format!("Payload is not valid UTF-8: {e}")))?;
        let msg = parse_message(payload).map_err(|e| BridgeError::BadRequest(e.error.message))?;

        let sessions = self.sessions.clone();
        let task = tokio::spawn(async move { run_command(&sessions, &session, msg).await });

        match task.await {
            Ok(outcome) => outcome.map_err(BridgeError::from),
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Command task failed");
                Err(SessionError::Transport {
                    id: session_id.to_string(),
                    message: format!("command task failed: {e}"),
                }
                .into())
            }
        }
    }

    /// Closes every session.
    pub fn shutdown(&self) {
        self.sessions.shutdown();
    }
}

/// Runs one command under the session lock, racing it against closure.
async fn run_command(
    sessions: &SessionManager,
    session: &Session,
    msg: IncomingMessage,
) -> Result<Delivery, SessionError> {
    let method = msg.method().to_string();

    let outcome = tokio::select! {
        biased;
        () = session.closed() => {
            tracing::debug!(session_id = %session.id(), method = %method, "Session closed mid-command, discarding result");
            Err(SessionError::UnknownSession { id: session.id().to_string() })
        }
        result = session.process(msg) => result,
    };

    if let Err(error @ SessionError::Transport { .. }) = &outcome {
        tracing::error!(session_id = %session.id(), error = %error, "Failed to deliver response");
        sessions.close(session.id(), CloseReason::TransportError);
    }
    outcome
}
