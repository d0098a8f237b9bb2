//! Session table: one protocol instance and outbound stream per connection.
//!
//! A session moves through `Created -> Active -> Closed`. It is created and
//! activated by [`SessionManager::open`], and closed when
//!
//! - the caller drops its stream (the [`SessionGuard`] travels with the
//!   stream body and closes the session on drop),
//! - writing to the stream fails, or
//! - the server shuts down.
//!
//! Closing removes the table entry, cancels the session's token so in-flight
//! work is abandoned, and drops the table's outbound sender so the stream
//! ends once the last in-flight writer lets go.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::SessionError;
use crate::mcp::catalog::Catalog;
use crate::mcp::protocol::IncomingMessage;
use crate::mcp::server::McpServer;
use crate::mcp::transport::{ServerEvent, SseTransport};

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The caller closed its stream.
    StreamClosed,
    /// Writing to the stream failed.
    TransportError,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamClosed => write!(f, "stream closed"),
            Self::TransportError => write!(f, "transport error"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// One live conversation.
pub struct Session {
    id: String,
    /// The protocol instance. The lock serialises commands per session.
    server: Mutex<McpServer>,
    transport: SseTransport,
    closed: CancellationToken,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Result of running one command through a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A response was written to the outbound stream.
    Delivered,
    /// The command was a notification; nothing to write.
    NoResponse,
}

impl Session {
    /// Returns the session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Completes once the session is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Runs `msg` through the protocol instance and writes any response to
    /// the outbound stream, holding the session lock for both steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the session closed before the response could be
    /// written, or if the write itself failed.
    pub async fn process(&self, msg: IncomingMessage) -> Result<Delivery, SessionError> {
        let mut server = self.server.lock().await;
        let Some(outgoing) = server.handle_message(msg).await else {
            return Ok(Delivery::NoResponse);
        };

        if self.is_closed() {
            return Err(SessionError::UnknownSession {
                id: self.id.clone(),
            });
        }

        self.transport.write_message(&outgoing).await?;
        Ok(Delivery::Delivered)
    }
}

/// A freshly opened session: its id, the stream of outbound events and the
/// guard that closes it when dropped.
#[derive(Debug)]
pub struct OpenedSession {
    /// The new session's identifier.
    pub id: String,
    /// Outbound events, starting with `endpoint`.
    pub events: mpsc::Receiver<ServerEvent>,
    /// Closes the session when dropped.
    pub guard: SessionGuard,
}

/// Closes its session when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    id: String,
    manager: SessionManager,
}

impl SessionGuard {
    /// Returns the guarded session's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.manager.close(&self.id, CloseReason::StreamClosed);
    }
}

struct SessionTable {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    catalog: Arc<Catalog>,
}

/// Owns every active session. Cheap to clone.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionTable>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates an empty session table serving `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            inner: Arc::new(SessionTable {
                sessions: RwLock::new(HashMap::new()),
                catalog,
            }),
        }
    }

    /// Opens a session and queues the `endpoint` event pointing the client
    /// at `message_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake event cannot be queued; the session
    /// is removed again before returning.
    pub fn open(&self, message_path: &str) -> Result<OpenedSession, SessionError> {
        let (session, events) = {
            let mut sessions = self
                .inner
                .sessions
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            let mut id = Uuid::new_v4().to_string();
            while sessions.contains_key(&id) {
                id = Uuid::new_v4().to_string();
            }

            let (transport, events) = SseTransport::channel(id.clone());
            let session = Arc::new(Session {
                id: id.clone(),
                server: Mutex::new(McpServer::new(Arc::clone(&self.inner.catalog))),
                transport,
                closed: CancellationToken::new(),
            });
            sessions.insert(id, Arc::clone(&session));
            (session, events)
        };

        let guard = SessionGuard {
            id: session.id.clone(),
            manager: self.clone(),
        };

        let endpoint = format!("{message_path}?sessionId={}", session.id);
        if let Err(e) = session.transport.announce_endpoint(endpoint) {
            tracing::error!(session_id = %session.id, error = %e, "Failed to start SSE session");
            drop(guard);
            return Err(e);
        }

        tracing::info!(session_id = %session.id, "Session opened");

        Ok(OpenedSession {
            id: session.id.clone(),
            events,
            guard,
        })
    }

    /// Looks up an active session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UnknownSession`] for unknown or closed ids.
    pub fn resolve(&self, id: &str) -> Result<Arc<Session>, SessionError> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .filter(|session| !session.is_closed())
            .cloned()
            .ok_or_else(|| SessionError::UnknownSession { id: id.to_string() })
    }

    /// Closes a session. Returns `false` if it was not active.
    pub fn close(&self, id: &str, reason: CloseReason) -> bool {
        let removed = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);

        match removed {
            Some(session) => {
                session.closed.cancel();
                tracing::info!(session_id = %id, reason = %reason, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Closes every active session.
    pub fn shutdown(&self) {
        let drained: Vec<Arc<Session>> = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in &drained {
            session.closed.cancel();
        }
        tracing::info!(count = drained.len(), "Closed all sessions");
    }

    /// Returns the number of active sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
