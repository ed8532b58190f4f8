//! Shared fixtures for integration tests
//!
//! Viewers are real sessions registered with a [`SessionManager`]; each gets a
//! bounded channel whose receiver the test drains to see exactly what was sent.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use phantom_server::game::entity::{EntityContext, EntityIdAllocator};
use phantom_server::game::hologram::{Hologram, HologramSettings};
use phantom_server::game::stage::{Stage, StageSettings};
use phantom_server::game::transform::Position;
use phantom_server::game::viewer::ViewerId;
use phantom_server::net::session::{Session, SessionManager, SessionState};
use phantom_server::protocol::tables::ProtocolTables;
use phantom_server::protocol::{EncodedPacket, PacketKind, ProtocolVersion};

static NEXT_PORT: AtomicU16 = AtomicU16::new(20000);

/// A connected test viewer
pub struct TestViewer {
    pub id: ViewerId,
    pub session: Arc<Session>,
    pub rx: mpsc::Receiver<EncodedPacket>,
}

impl TestViewer {
    /// Everything queued for this viewer so far
    pub fn drain(&mut self) -> Vec<EncodedPacket> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.rx.try_recv() {
            packets.push(packet);
        }
        packets
    }
}

/// Sessions plus the context entities are built from
pub struct Harness {
    pub sessions: Arc<SessionManager>,
    pub ctx: EntityContext,
}

impl Harness {
    pub fn new(version: ProtocolVersion) -> Self {
        let sessions = Arc::new(SessionManager::with_limits(64));
        let protocol = Arc::new(ProtocolTables::for_version(version).unwrap());
        let ctx = EntityContext::new(
            sessions.clone(),
            protocol,
            Arc::new(EntityIdAllocator::default()),
        );
        Self { sessions, ctx }
    }

    /// Register a viewing session
    pub fn connect(&self) -> TestViewer {
        self.connect_with_capacity(256)
    }

    /// Register a viewing session whose outbound queue holds `capacity` packets
    pub fn connect_with_capacity(&self, capacity: usize) -> TestViewer {
        let port = NEXT_PORT.fetch_add(1, Ordering::SeqCst);
        let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        let (tx, rx) = mpsc::channel(capacity);
        let session = self
            .sessions
            .create_session_with_channel(addr, tx)
            .unwrap();
        session.set_state(SessionState::Viewing);
        TestViewer {
            id: session.viewer_id(),
            session,
            rx,
        }
    }

    /// A standalone hologram with default settings
    pub fn hologram(&self, anchor: Position) -> Hologram {
        Hologram::new(1, self.ctx.clone(), anchor, HologramSettings::default())
    }

    pub fn stage(&self) -> Stage {
        Stage::new(StageSettings::default(), self.ctx.clone())
    }
}

pub fn kinds(packets: &[EncodedPacket]) -> Vec<PacketKind> {
    packets.iter().map(|p| p.kind).collect()
}

/// Entity id that leads every entity packet payload
pub fn entity_id(packet: &EncodedPacket) -> i32 {
    packet.reader().read_varint()
}

/// Custom name carried by a metadata packet, if any
///
/// Walks the keyed entry list used from 1.9 on (index, type, value, 0xFF end).
/// Only the entry types an armor stand line carries are understood.
pub fn custom_name(packet: &EncodedPacket) -> Option<String> {
    assert_eq!(packet.kind, PacketKind::Metadata);
    let mut reader = packet.reader();
    reader.read_varint();
    let mut name = None;
    loop {
        let index = reader.read_ubyte();
        if index == 0xFF {
            return name;
        }
        let type_tag = reader.read_varint();
        match type_tag {
            // byte
            0 => {
                reader.read_ubyte();
            }
            // optional chat component
            5 => {
                if reader.read_bool() {
                    let json = reader.read_string();
                    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
                    if index == 2 {
                        name = value["text"].as_str().map(str::to_string);
                    }
                }
            }
            // boolean
            7 => {
                reader.read_bool();
            }
            // rotation
            8 => {
                reader.read_float();
                reader.read_float();
                reader.read_float();
            }
            other => panic!("unexpected metadata type {}", other),
        }
    }
}

/// Ids named by a destroy packet
pub fn destroyed_ids(packet: &EncodedPacket) -> Vec<i32> {
    assert_eq!(packet.kind, PacketKind::Destroy);
    let mut reader = packet.reader();
    let count = reader.read_varint();
    (0..count).map(|_| reader.read_varint()).collect()
}
