//! Session management module
//!
//! Manages viewer sessions including:
//! - Session lifecycle (creation, tracking, cleanup)
//! - Session state machine (connected -> viewing -> disconnected)
//! - Per-session outbound packet queue
//! - Thread-safe session registry, exposed to entities as a viewer directory

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::error::{NetworkError, PhantomError, Result};
use crate::game::viewer::{ViewerDirectory, ViewerId};
use crate::protocol::packets::EncodedPacket;

/// Unique session identifier
pub type SessionId = u64;

/// Session state in the connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Socket accepted, not yet announced to the stage
    Connected,
    /// Receiving virtual entity packets
    Viewing,
    /// Session is disconnecting
    Disconnecting,
    /// Session has been disconnected
    Disconnected,
}

impl SessionState {
    /// Check if the session should be addressed as a viewer
    pub fn is_viewing(&self) -> bool {
        matches!(self, SessionState::Viewing)
    }

    /// Check if the session is still active (not disconnecting/disconnected)
    pub fn is_active(&self) -> bool {
        !matches!(
            self,
            SessionState::Disconnecting | SessionState::Disconnected
        )
    }

    /// Get a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Connected => "Connected",
            SessionState::Viewing => "Viewing",
            SessionState::Disconnecting => "Disconnecting",
            SessionState::Disconnected => "Disconnected",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A connected client session
pub struct Session {
    /// Unique session identifier
    pub id: SessionId,
    /// Remote address of the client
    pub address: SocketAddr,
    /// Current session state
    state: RwLock<SessionState>,
    /// Time of session creation
    pub created_at: Instant,
    /// Time of last activity
    last_activity: RwLock<Instant>,
    /// Outbound packet channel, drained by the connection's writer task
    outbound_tx: Option<mpsc::Sender<EncodedPacket>>,
}

impl Session {
    /// Create a new session
    pub fn new(id: SessionId, address: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            address,
            state: RwLock::new(SessionState::Connected),
            created_at: now,
            last_activity: RwLock::new(now),
            outbound_tx: None,
        }
    }

    /// Create a new session with an outbound channel
    pub fn with_channel(
        id: SessionId,
        address: SocketAddr,
        outbound_tx: mpsc::Sender<EncodedPacket>,
    ) -> Self {
        let mut session = Self::new(id, address);
        session.outbound_tx = Some(outbound_tx);
        session
    }

    /// Viewer identity of this session
    pub fn viewer_id(&self) -> ViewerId {
        ViewerId::of_session(self.id)
    }

    /// Get the IP address as a string (without port)
    pub fn ip(&self) -> String {
        self.address.ip().to_string()
    }

    /// Get the current session state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Set the session state
    pub fn set_state(&self, new_state: SessionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };
        debug!(
            session_id = self.id,
            old_state = %old_state,
            new_state = %new_state,
            "Session state changed"
        );
    }

    /// Transition to a new state if currently in the expected state
    pub fn transition_state(&self, expected: SessionState, new_state: SessionState) -> bool {
        let mut state = self.state.write();
        if *state == expected {
            *state = new_state;
            true
        } else {
            false
        }
    }

    /// Check if session is active
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Update the last activity timestamp
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    /// Get the last activity time
    pub fn last_activity(&self) -> Instant {
        *self.last_activity.read()
    }

    /// Get the duration since last activity
    pub fn idle_duration(&self) -> Duration {
        self.last_activity().elapsed()
    }

    /// Queue a packet without blocking
    ///
    /// Sessions without a channel accept and drop everything.
    pub fn try_send(&self, packet: EncodedPacket) -> std::result::Result<(), NetworkError> {
        if let Some(tx) = &self.outbound_tx {
            tx.try_send(packet).map_err(|e| match e {
                TrySendError::Full(_) => NetworkError::WriteBufferFull,
                TrySendError::Closed(_) => NetworkError::ConnectionClosed,
            })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("created_at", &self.created_at)
            .field("idle_duration", &self.idle_duration())
            .finish()
    }
}

/// Thread-safe session manager
pub struct SessionManager {
    /// Map of session ID to session
    sessions: DashMap<SessionId, Arc<Session>>,
    /// Map of IP address to list of session IDs (for connection limiting)
    ip_to_sessions: DashMap<String, Vec<SessionId>>,
    /// Next session ID to assign
    next_id: AtomicU64,
    /// Maximum sessions per IP
    max_per_ip: usize,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new() -> Self {
        Self::with_limits(10)
    }

    /// Create a session manager with a custom per-IP limit
    pub fn with_limits(max_per_ip: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            ip_to_sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
            max_per_ip,
        }
    }

    /// Create a new session and register it
    pub fn create_session(&self, address: SocketAddr) -> Result<Arc<Session>> {
        self.register(address, None)
    }

    /// Create a session with an outbound channel
    pub fn create_session_with_channel(
        &self,
        address: SocketAddr,
        outbound_tx: mpsc::Sender<EncodedPacket>,
    ) -> Result<Arc<Session>> {
        self.register(address, Some(outbound_tx))
    }

    fn register(
        &self,
        address: SocketAddr,
        outbound_tx: Option<mpsc::Sender<EncodedPacket>>,
    ) -> Result<Arc<Session>> {
        let ip = address.ip().to_string();

        // Check connection limit per IP
        let current_count = self.ip_to_sessions.get(&ip).map(|v| v.len()).unwrap_or(0);

        if current_count >= self.max_per_ip {
            warn!(
                ip = %ip,
                count = current_count,
                max = self.max_per_ip,
                "Connection limit exceeded for IP"
            );
            return Err(PhantomError::Network(NetworkError::TooManyConnections(ip)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let has_channel = outbound_tx.is_some();
        let session = Arc::new(match outbound_tx {
            Some(tx) => Session::with_channel(id, address, tx),
            None => Session::new(id, address),
        });

        self.sessions.insert(id, session.clone());
        self.ip_to_sessions.entry(ip).or_default().push(id);

        info!(
            session_id = id,
            address = %address,
            has_channel = has_channel,
            "Session created"
        );

        Ok(session)
    }

    /// Get a session by ID
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|r| r.clone())
    }

    /// Remove a session
    pub fn remove(&self, id: SessionId) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.set_state(SessionState::Disconnected);

            let ip = session.ip();
            if let Some(mut sessions) = self.ip_to_sessions.get_mut(&ip) {
                sessions.retain(|&sid| sid != id);
            }

            // Clean up empty IP entries
            self.ip_to_sessions.retain(|_, v| !v.is_empty());

            info!(
                session_id = id,
                connected_for = ?session.created_at.elapsed(),
                "Session removed"
            );
        }
    }

    /// Get the count of sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Get the count of sessions receiving entity packets
    pub fn viewer_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state().is_viewing())
            .count()
    }

    /// Mark every session as disconnecting
    pub fn disconnect_all(&self) {
        for session in self.sessions.iter() {
            session.set_state(SessionState::Disconnecting);
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewerDirectory for SessionManager {
    fn connected_viewers(&self) -> Vec<ViewerId> {
        let mut viewers: Vec<ViewerId> = self
            .sessions
            .iter()
            .filter(|s| s.state().is_viewing())
            .map(|s| s.viewer_id())
            .collect();
        viewers.sort_unstable();
        viewers
    }

    fn send(
        &self,
        viewer: ViewerId,
        packet: EncodedPacket,
    ) -> std::result::Result<(), NetworkError> {
        let session = self
            .get(viewer.session_id())
            .ok_or(NetworkError::ViewerNotFound(viewer.0))?;
        if !session.state().is_viewing() {
            return Err(NetworkError::ConnectionClosed);
        }
        session.try_send(packet)
    }

    fn is_connected(&self, viewer: ViewerId) -> bool {
        self.get(viewer.session_id())
            .map(|s| s.state().is_viewing())
            .unwrap_or(false)
    }
}
