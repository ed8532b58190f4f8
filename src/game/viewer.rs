//! Viewer directory
//!
//! Virtual entities never talk to sockets directly. They address viewers by id and
//! hand encoded packets to a [`ViewerDirectory`], which knows who is connected and
//! how to reach them.

use std::fmt;

use crate::error::NetworkError;
use crate::net::session::SessionId;
use crate::protocol::packets::EncodedPacket;

/// Stable identity of a connected viewer for the lifetime of its session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewerId(pub u64);

impl ViewerId {
    /// Viewer id of a session
    pub fn of_session(session: SessionId) -> Self {
        Self(session)
    }

    /// Session id backing this viewer
    pub fn session_id(self) -> SessionId {
        self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "viewer#{}", self.0)
    }
}

/// Directory of connected viewers and their outbound packet queues
pub trait ViewerDirectory: Send + Sync {
    /// Currently connected viewers
    fn connected_viewers(&self) -> Vec<ViewerId>;

    /// Queue a packet for one viewer without blocking
    ///
    /// Packets queued for the same viewer are delivered in call order.
    fn send(&self, viewer: ViewerId, packet: EncodedPacket) -> Result<(), NetworkError>;

    /// Stable viewer identity for a session
    fn viewer_id_of(&self, session: SessionId) -> ViewerId {
        ViewerId::of_session(session)
    }

    /// Check if a viewer is connected
    fn is_connected(&self, viewer: ViewerId) -> bool {
        self.connected_viewers().contains(&viewer)
    }
}
