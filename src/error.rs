//! Error handling module
//!
//! Defines custom error types for the Phantom server.

use std::io;

use thiserror::Error;

use crate::game::equipment::EquipmentSlot;
use crate::game::pose::BodyPart;
use crate::protocol::version::ProtocolVersion;

/// Main error type for the Phantom server
#[derive(Error, Debug)]
pub enum PhantomError {
    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Protocol-related errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Registry resolution errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Game logic errors
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Network-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Too many connections from {0}")]
    TooManyConnections(String),

    #[error("Viewer not connected: {0}")]
    ViewerNotFound(u64),

    #[error("Outbound queue full")]
    WriteBufferFull,

    #[error("Write error: {0}")]
    WriteError(String),
}

impl NetworkError {
    /// Whether the viewer can no longer receive anything. A full queue is not.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::ViewerNotFound(_))
    }
}

/// Protocol-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(i32),

    #[error("Unknown protocol version name: {0}")]
    UnknownVersionName(String),

    #[error("Metadata type {wire} is not available on protocol {version}")]
    MissingTypeTag {
        wire: &'static str,
        version: ProtocolVersion,
    },

    #[error("Metadata field {index} expects {expected}, got {actual}")]
    FieldTypeMismatch {
        index: u8,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Packet too large: {size} bytes (max: {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
}

/// Registry resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Equipment slot {slot:?} is not supported on protocol {version}")]
    UnsupportedSlot {
        slot: EquipmentSlot,
        version: ProtocolVersion,
    },

    #[error("No rotation field for {part:?} on protocol {version}")]
    MissingPoseField {
        part: BodyPart,
        version: ProtocolVersion,
    },
}

/// Game logic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Line index {index} out of range (size {size})")]
    LineOutOfRange { index: usize, size: usize },

    #[error("Entity id space exhausted")]
    EntityIdsExhausted,

    #[error("Hologram not found: {0}")]
    HologramNotFound(u64),
}

/// Result type alias for Phantom operations
pub type Result<T> = std::result::Result<T, PhantomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NetworkError::ConnectionClosed;
        assert_eq!(err.to_string(), "Connection closed");

        let err = GameError::LineOutOfRange { index: 4, size: 2 };
        assert_eq!(err.to_string(), "Line index 4 out of range (size 2)");

        let err = RegistryError::UnsupportedSlot {
            slot: EquipmentSlot::OffHand,
            version: ProtocolVersion::V1_8,
        };
        assert_eq!(
            err.to_string(),
            "Equipment slot OffHand is not supported on protocol 1.8 (47)"
        );
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(NetworkError::ConnectionClosed.is_disconnect());
        assert!(NetworkError::ViewerNotFound(3).is_disconnect());
        assert!(!NetworkError::WriteBufferFull.is_disconnect());
    }

    #[test]
    fn test_error_conversion() {
        let err: PhantomError = GameError::EntityIdsExhausted.into();
        assert!(matches!(err, PhantomError::Game(GameError::EntityIdsExhausted)));

        let err: PhantomError = ProtocolError::UnsupportedVersion(5).into();
        assert_eq!(
            err.to_string(),
            "Protocol error: Unsupported protocol version: 5"
        );
    }
}
