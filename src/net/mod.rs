//! Networking module
//!
//! This module handles all network-related functionality for the Phantom server:
//! - Packet buffers and VarInt encoding
//! - Session management and the viewer directory
//! - Framing outbound packets onto the socket
//! - Connection lifecycle

pub mod buffer;
pub mod handler;
pub mod session;
pub mod transport;
