//! Packet definitions module
//!
//! Defines the clientbound packets virtual entities are made of and the encoded
//! form they travel in. Each packet is encoded against [`ProtocolTables`], so one
//! logical packet yields the right bytes for whichever protocol is targeted.

use bytes::Bytes;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::game::equipment::ItemStack;
use crate::game::transform::Transform;
use crate::net::buffer::{PacketBuffer, MAX_PACKET_SIZE};

use super::metadata::MetaEntry;
use super::tables::ProtocolTables;
use super::version::{EquipmentFormat, ItemFormat, PacketKind, PositionFormat};

/// Continuation bit on a list-format equipment slot byte
const EQUIPMENT_CONTINUES: u8 = 0x80;

/// An encoded packet body, ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    pub kind: PacketKind,
    /// Protocol packet id
    pub id: i32,
    /// Body without the packet id
    pub payload: Bytes,
}

impl EncodedPacket {
    /// Build the wire frame: VarInt length, then VarInt packet id and payload
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        let body_len = PacketBuffer::varint_len(self.id) + self.payload.len();
        if body_len > MAX_PACKET_SIZE {
            return Err(ProtocolError::PacketTooLarge {
                size: body_len,
                max: MAX_PACKET_SIZE,
            });
        }

        let mut frame = PacketBuffer::with_capacity(body_len + 3);
        frame.write_varint(body_len as i32);
        frame.write_varint(self.id);
        frame.write_bytes(&self.payload);
        Ok(frame.freeze())
    }

    /// Payload as a readable buffer
    pub fn reader(&self) -> PacketBuffer {
        PacketBuffer::from_bytes(&self.payload)
    }
}

/// Outgoing packet trait
pub trait OutgoingPacket {
    /// The packet kind, used to look up the id
    const KIND: PacketKind;

    /// Encode the packet body to a buffer
    fn encode(&self, tables: &ProtocolTables, buffer: &mut PacketBuffer);

    /// Encode into a standalone packet
    fn to_packet(&self, tables: &ProtocolTables) -> EncodedPacket {
        let mut buffer = PacketBuffer::with_capacity(64);
        self.encode(tables, &mut buffer);
        EncodedPacket {
            kind: Self::KIND,
            id: tables.profile.packet_ids.id_of(Self::KIND),
            payload: buffer.freeze(),
        }
    }
}

fn write_position(tables: &ProtocolTables, transform: &Transform, buffer: &mut PacketBuffer) {
    let position = transform.position;
    match tables.profile.position {
        PositionFormat::FixedPoint => {
            buffer.write_fixed_point(position.x);
            buffer.write_fixed_point(position.y);
            buffer.write_fixed_point(position.z);
        }
        PositionFormat::Double => {
            buffer.write_double(position.x);
            buffer.write_double(position.y);
            buffer.write_double(position.z);
        }
    }
}

fn write_item(tables: &ProtocolTables, item: Option<&ItemStack>, buffer: &mut PacketBuffer) {
    match (tables.profile.items, item) {
        (ItemFormat::Legacy, None) => buffer.write_short(-1),
        (ItemFormat::Legacy, Some(item)) => {
            buffer.write_short(item.item_id as i16);
            buffer.write_ubyte(item.count);
            buffer.write_short(item.damage);
            buffer.write_ubyte(0); // no NBT
        }
        (ItemFormat::Modern, None) => buffer.write_bool(false),
        (ItemFormat::Modern, Some(item)) => {
            buffer.write_bool(true);
            buffer.write_varint(item.item_id);
            buffer.write_ubyte(item.count);
            buffer.write_ubyte(0); // no NBT
        }
    }
}

/// Creates an armor stand on the client
#[derive(Debug, Clone)]
pub struct SpawnLivingPacket {
    pub entity_id: i32,
    pub uuid: Uuid,
    pub transform: Transform,
}

impl OutgoingPacket for SpawnLivingPacket {
    const KIND: PacketKind = PacketKind::SpawnLiving;

    fn encode(&self, tables: &ProtocolTables, buffer: &mut PacketBuffer) {
        let profile = &tables.profile;

        buffer.write_varint(self.entity_id);
        if profile.spawn.with_uuid {
            buffer.write_uuid(self.uuid);
        }
        if profile.spawn.type_as_byte {
            buffer.write_ubyte(profile.armor_stand_type as u8);
        } else {
            buffer.write_varint(profile.armor_stand_type);
        }
        write_position(tables, &self.transform, buffer);
        buffer.write_angle(self.transform.yaw());
        buffer.write_angle(self.transform.pitch());
        buffer.write_angle(self.transform.yaw()); // head yaw
        // Velocity
        buffer.write_short(0);
        buffer.write_short(0);
        buffer.write_short(0);
        if profile.spawn.trailing_metadata {
            tables.metadata.write_entries(&[], buffer);
        }
    }
}

/// Sets equipment slots
#[derive(Debug, Clone)]
pub struct EquipmentPacket {
    pub entity_id: i32,
    /// Protocol slot ids with their items (`None` clears the slot)
    pub slots: Vec<(u8, Option<ItemStack>)>,
}

impl EquipmentPacket {
    /// Split slot changes into as few packets as the format allows
    pub fn batch(
        entity_id: i32,
        slots: Vec<(u8, Option<ItemStack>)>,
        format: EquipmentFormat,
    ) -> Vec<EquipmentPacket> {
        if slots.is_empty() {
            return Vec::new();
        }
        if format.batches_slots() {
            return vec![EquipmentPacket { entity_id, slots }];
        }
        slots
            .into_iter()
            .map(|slot| EquipmentPacket {
                entity_id,
                slots: vec![slot],
            })
            .collect()
    }
}

impl OutgoingPacket for EquipmentPacket {
    const KIND: PacketKind = PacketKind::Equipment;

    fn encode(&self, tables: &ProtocolTables, buffer: &mut PacketBuffer) {
        buffer.write_varint(self.entity_id);

        match tables.profile.equipment {
            EquipmentFormat::List => {
                let last = self.slots.len().saturating_sub(1);
                for (i, (slot, item)) in self.slots.iter().enumerate() {
                    let marker = if i < last { EQUIPMENT_CONTINUES } else { 0 };
                    buffer.write_ubyte(slot | marker);
                    write_item(tables, item.as_ref(), buffer);
                }
            }
            format => {
                debug_assert_eq!(self.slots.len(), 1, "single-slot format");
                if let Some((slot, item)) = self.slots.first() {
                    if format == EquipmentFormat::SingleShortSlot {
                        buffer.write_short(*slot as i16);
                    } else {
                        buffer.write_varint(*slot as i32);
                    }
                    write_item(tables, item.as_ref(), buffer);
                }
            }
        }
    }
}

/// Metadata snapshot
#[derive(Debug, Clone)]
pub struct MetadataPacket {
    pub entity_id: i32,
    pub entries: Vec<MetaEntry>,
}

impl OutgoingPacket for MetadataPacket {
    const KIND: PacketKind = PacketKind::Metadata;

    fn encode(&self, tables: &ProtocolTables, buffer: &mut PacketBuffer) {
        buffer.write_varint(self.entity_id);
        tables.metadata.write_entries(&self.entries, buffer);
    }
}

/// Absolute move
#[derive(Debug, Clone)]
pub struct TeleportPacket {
    pub entity_id: i32,
    pub transform: Transform,
}

impl OutgoingPacket for TeleportPacket {
    const KIND: PacketKind = PacketKind::Teleport;

    fn encode(&self, tables: &ProtocolTables, buffer: &mut PacketBuffer) {
        buffer.write_varint(self.entity_id);
        write_position(tables, &self.transform, buffer);
        buffer.write_angle(self.transform.yaw());
        buffer.write_angle(self.transform.pitch());
        buffer.write_bool(false); // on ground
    }
}

/// Removes entities from the client
#[derive(Debug, Clone)]
pub struct DestroyPacket {
    pub entity_ids: Vec<i32>,
}

impl DestroyPacket {
    pub fn single(entity_id: i32) -> Self {
        Self {
            entity_ids: vec![entity_id],
        }
    }
}

impl OutgoingPacket for DestroyPacket {
    const KIND: PacketKind = PacketKind::Destroy;

    fn encode(&self, _tables: &ProtocolTables, buffer: &mut PacketBuffer) {
        buffer.write_varint(self.entity_ids.len() as i32);
        for id in &self.entity_ids {
            buffer.write_varint(*id);
        }
    }
}
