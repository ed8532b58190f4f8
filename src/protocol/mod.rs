//! Protocol module
//!
//! This module contains the clientbound wire format for virtual entities:
//! - Version tables (packet ids, spawn/equipment/item shapes)
//! - Metadata layouts and type tags
//! - Packet encoders for spawn, equipment, metadata, teleport and destroy

pub mod metadata;
pub mod packets;
pub mod tables;
pub mod version;

pub use packets::{EncodedPacket, OutgoingPacket};
pub use tables::ProtocolTables;
pub use version::{PacketKind, ProtocolVersion};
