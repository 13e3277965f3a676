//! Connection registry (C4): per-connection state machine, handshake timer,
//! and the single-shot guard on the `New -> Initializing` transition.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use mcp_types::Implementation;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::InitializeContext;

/// `New -> Initializing -> Ready`, plus the abort paths `New -> Closed` and
/// `Initializing -> Closed` (spec.md §3). All other transitions are bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Initializing,
    Ready,
    Closed,
}

impl ConnectionState {
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::New => "New",
            ConnectionState::Initializing => "Initializing",
            ConnectionState::Ready => "Ready",
            ConnectionState::Closed => "Closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake already started for this connection")]
    AlreadyStarted,
    #[error("connection is not in a state that permits this transition")]
    InvalidState,
    #[error("no such connection")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("connection `{0}` already exists")]
pub struct DuplicateConnection(pub String);

struct ConnectionInner {
    state: ConnectionState,
    handshake_started_at: Option<Instant>,
    protocol_version: Option<String>,
    client_info: Option<Implementation>,
}

/// Owned exclusively by the registry; handlers are only ever given a
/// shared, read-only `Arc<Connection>` (spec.md §3: "a connection is owned
/// exclusively by the registry; handlers receive a non-owning capability").
pub struct Connection {
    id: String,
    handshake_timeout: Duration,
    handshake_once: AtomicBool,
    inner: Mutex<ConnectionInner>,
    handshake_cancel: Mutex<Option<CancellationToken>>,
}

impl Connection {
    fn new(id: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            id: id.into(),
            handshake_timeout,
            handshake_once: AtomicBool::new(false),
            inner: Mutex::new(ConnectionInner {
                state: ConnectionState::New,
                handshake_started_at: None,
                protocol_version: None,
                client_info: None,
            }),
            handshake_cancel: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cheap snapshot read; does not serialize against concurrent writers
    /// beyond the mutex itself (spec.md §4.4: "a cheap snapshot read").
    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    pub async fn is_ready(&self) -> bool {
        matches!(self.state().await, ConnectionState::Ready)
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.inner.lock().await.protocol_version.clone()
    }

    pub async fn client_info(&self) -> Option<Implementation> {
        self.inner.lock().await.client_info.clone()
    }

    /// `New -> Initializing`, guarded so at most one caller wins even under
    /// concurrent invocation (spec.md §8 invariant 2, scenario S6). Arms a
    /// one-shot timer that races the handshake; if it fires first, the
    /// connection is CAS'd to `Closed` and `on_timeout` runs.
    pub async fn start_handshake<F>(self: &Arc<Self>, on_timeout: F) -> Result<(), HandshakeError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .handshake_once
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(HandshakeError::AlreadyStarted);
        }

        {
            let mut guard = self.inner.lock().await;
            if guard.state != ConnectionState::New {
                return Err(HandshakeError::InvalidState);
            }
            guard.state = ConnectionState::Initializing;
            guard.handshake_started_at = Some(Instant::now());
        }

        let cancel = CancellationToken::new();
        *self.handshake_cancel.lock().await = Some(cancel.clone());

        let connection = Arc::clone(self);
        let timeout = self.handshake_timeout;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    if connection.fire_handshake_timeout().await {
                        on_timeout();
                    }
                }
                () = cancel.cancelled() => {}
            }
        });

        Ok(())
    }

    /// Race-safe no-op if the handshake already moved past `Initializing`.
    /// Returns whether this call actually closed the connection.
    async fn fire_handshake_timeout(&self) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.state == ConnectionState::Initializing {
            guard.state = ConnectionState::Closed;
            true
        } else {
            false
        }
    }

    /// `Initializing -> Ready`; cancels the handshake timer and records the
    /// negotiated protocol version and client metadata carried by `ctx`
    /// (spec.md REDESIGN FLAGS item 2: a typed token instead of a shared
    /// request-id-keyed map between `BeforeInitialize`/`AfterInitialize`).
    pub async fn complete_handshake(&self, ctx: InitializeContext) -> Result<(), HandshakeError> {
        if let Some(cancel) = self.handshake_cancel.lock().await.as_ref() {
            cancel.cancel();
        }

        let mut guard = self.inner.lock().await;
        if guard.state != ConnectionState::Initializing {
            return Err(HandshakeError::InvalidState);
        }
        guard.state = ConnectionState::Ready;
        guard.protocol_version = Some(ctx.protocol_version);
        guard.client_info = Some(ctx.client_info);
        Ok(())
    }

    /// Idempotent: cancels the handshake timer (if armed) and transitions to
    /// `Closed` regardless of current state.
    pub async fn close(&self) {
        if let Some(cancel) = self.handshake_cancel.lock().await.take() {
            cancel.cancel();
        }
        self.inner.lock().await.state = ConnectionState::Closed;
    }
}

/// `map<id, Connection>` guarded by a concurrent map for the map structure
/// itself; each `Connection` holds its own mutex for state fields (spec.md
/// §5 shared-resource policy — the two lock domains never nest in the
/// opposite order, since registry operations never hold the map entry while
/// awaiting a connection's own mutex held by another task).
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<Connection>>,
    default_handshake_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(default_handshake_timeout: Duration) -> Self {
        Self {
            connections: DashMap::new(),
            default_handshake_timeout,
        }
    }

    pub fn create(&self, id: impl Into<String>) -> Result<Arc<Connection>, DuplicateConnection> {
        let id = id.into();
        if self.connections.contains_key(&id) {
            return Err(DuplicateConnection(id));
        }
        let connection = Arc::new(Connection::new(id.clone(), self.default_handshake_timeout));
        self.connections.insert(id, Arc::clone(&connection));
        Ok(connection)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Idempotent: a second `remove` of the same id is a no-op.
    pub async fn remove(&self, id: &str) {
        if let Some((_, connection)) = self.connections.remove(id) {
            connection.close().await;
        }
    }

    pub async fn start_handshake<F>(&self, id: &str, on_timeout: F) -> Result<(), HandshakeError>
    where
        F: FnOnce() + Send + 'static,
    {
        let connection = self.get(id).ok_or(HandshakeError::NotFound)?;
        connection.start_handshake(on_timeout).await
    }

    pub async fn complete_handshake(&self, id: &str, ctx: InitializeContext) -> Result<(), HandshakeError> {
        let connection = self.get(id).ok_or(HandshakeError::NotFound)?;
        connection.complete_handshake(ctx).await
    }

    pub async fn is_ready(&self, id: &str) -> bool {
        match self.get(id) {
            Some(connection) => connection.is_ready().await,
            None => false,
        }
    }
}
