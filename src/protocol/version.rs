//! Protocol version tables
//!
//! Every per-version constant the entity packets depend on lives here: packet ids,
//! the armor stand type id and the shape of the spawn, equipment and item encodings.
//! Bumping the targeted protocol only touches these tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Supported client protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProtocolVersion {
    /// 1.8.x (protocol 47)
    V1_8,
    /// 1.12.2 (protocol 340)
    V1_12_2,
    /// 1.16.5 (protocol 754)
    V1_16_5,
    /// 1.17.1 (protocol 756)
    V1_17_1,
}

impl ProtocolVersion {
    /// All supported versions, oldest first
    pub const ALL: [ProtocolVersion; 4] = [
        ProtocolVersion::V1_8,
        ProtocolVersion::V1_12_2,
        ProtocolVersion::V1_16_5,
        ProtocolVersion::V1_17_1,
    ];

    /// Get the protocol number sent by clients in the handshake
    pub fn protocol_number(self) -> i32 {
        match self {
            Self::V1_8 => 47,
            Self::V1_12_2 => 340,
            Self::V1_16_5 => 754,
            Self::V1_17_1 => 756,
        }
    }

    /// Look up a version by protocol number
    pub fn from_protocol_number(number: i32) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|v| v.protocol_number() == number)
            .ok_or(ProtocolError::UnsupportedVersion(number))
    }

    /// Get the release name
    pub fn name(self) -> &'static str {
        match self {
            Self::V1_8 => "1.8",
            Self::V1_12_2 => "1.12.2",
            Self::V1_16_5 => "1.16.5",
            Self::V1_17_1 => "1.17.1",
        }
    }

    /// Get the encoding profile for this version
    pub fn profile(self) -> ProtocolProfile {
        match self {
            Self::V1_8 => ProtocolProfile {
                version: self,
                packet_ids: PacketIds {
                    spawn_living: 0x0F,
                    equipment: 0x04,
                    metadata: 0x1C,
                    teleport: 0x18,
                    destroy: 0x13,
                },
                armor_stand_type: 30,
                spawn: SpawnFormat {
                    type_as_byte: true,
                    with_uuid: false,
                    trailing_metadata: true,
                },
                position: PositionFormat::FixedPoint,
                equipment: EquipmentFormat::SingleShortSlot,
                items: ItemFormat::Legacy,
            },
            Self::V1_12_2 => ProtocolProfile {
                version: self,
                packet_ids: PacketIds {
                    spawn_living: 0x03,
                    equipment: 0x3F,
                    metadata: 0x3C,
                    teleport: 0x4C,
                    destroy: 0x32,
                },
                armor_stand_type: 30,
                spawn: SpawnFormat {
                    type_as_byte: false,
                    with_uuid: true,
                    trailing_metadata: true,
                },
                position: PositionFormat::Double,
                equipment: EquipmentFormat::SingleVarIntSlot,
                items: ItemFormat::Legacy,
            },
            Self::V1_16_5 => ProtocolProfile {
                version: self,
                packet_ids: PacketIds {
                    spawn_living: 0x02,
                    equipment: 0x47,
                    metadata: 0x44,
                    teleport: 0x56,
                    destroy: 0x36,
                },
                armor_stand_type: 1,
                spawn: SpawnFormat {
                    type_as_byte: false,
                    with_uuid: true,
                    trailing_metadata: false,
                },
                position: PositionFormat::Double,
                equipment: EquipmentFormat::List,
                items: ItemFormat::Modern,
            },
            Self::V1_17_1 => ProtocolProfile {
                version: self,
                packet_ids: PacketIds {
                    spawn_living: 0x02,
                    equipment: 0x50,
                    metadata: 0x4D,
                    teleport: 0x61,
                    destroy: 0x3A,
                },
                armor_stand_type: 1,
                spawn: SpawnFormat {
                    type_as_byte: false,
                    with_uuid: true,
                    trailing_metadata: false,
                },
                position: PositionFormat::Double,
                equipment: EquipmentFormat::List,
                items: ItemFormat::Modern,
            },
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.protocol_number())
    }
}

impl FromStr for ProtocolVersion {
    type Err = ProtocolError;

    /// Accepts either a release name ("1.16.5") or a protocol number ("754")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<i32>() {
            return Self::from_protocol_number(number);
        }
        Self::ALL
            .into_iter()
            .find(|v| v.name() == trimmed)
            .ok_or_else(|| ProtocolError::UnknownVersionName(trimmed.to_string()))
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProtocolVersion> for String {
    fn from(version: ProtocolVersion) -> Self {
        version.name().to_string()
    }
}

/// Outbound packet kinds used by virtual entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// Living entity creation
    SpawnLiving,
    /// Equipment change
    Equipment,
    /// Metadata snapshot
    Metadata,
    /// Absolute movement
    Teleport,
    /// Entity teardown
    Destroy,
}

/// Clientbound packet ids for one protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketIds {
    pub spawn_living: i32,
    pub equipment: i32,
    pub metadata: i32,
    pub teleport: i32,
    pub destroy: i32,
}

impl PacketIds {
    /// Get the packet id for a packet kind
    pub fn id_of(&self, kind: PacketKind) -> i32 {
        match kind {
            PacketKind::SpawnLiving => self.spawn_living,
            PacketKind::Equipment => self.equipment,
            PacketKind::Metadata => self.metadata,
            PacketKind::Teleport => self.teleport,
            PacketKind::Destroy => self.destroy,
        }
    }
}

/// Shape of the living entity spawn packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnFormat {
    /// Entity type written as an unsigned byte instead of a VarInt
    pub type_as_byte: bool,
    /// Entity UUID follows the entity id
    pub with_uuid: bool,
    /// Spawn carries an (empty) metadata section
    pub trailing_metadata: bool,
}

/// Coordinate encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFormat {
    /// 27.5 fixed-point ints
    FixedPoint,
    /// IEEE 754 doubles
    Double,
}

/// Equipment packet layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentFormat {
    /// One slot per packet, slot as a short
    SingleShortSlot,
    /// One slot per packet, slot as a VarInt
    SingleVarIntSlot,
    /// Any number of slots per packet, continuation bit on the slot byte
    List,
}

impl EquipmentFormat {
    /// Whether one packet can carry several slots
    pub fn batches_slots(self) -> bool {
        matches!(self, Self::List)
    }
}

/// Item stack encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFormat {
    /// Short id (-1 empty), byte count, short damage, NBT
    Legacy,
    /// Present flag, VarInt id, byte count, NBT
    Modern,
}

/// Encoding profile for one protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolProfile {
    pub version: ProtocolVersion,
    pub packet_ids: PacketIds,
    pub armor_stand_type: i32,
    pub spawn: SpawnFormat,
    pub position: PositionFormat,
    pub equipment: EquipmentFormat,
    pub items: ItemFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_numbers() {
        assert_eq!(ProtocolVersion::V1_8.protocol_number(), 47);
        assert_eq!(ProtocolVersion::V1_17_1.protocol_number(), 756);
        assert_eq!(
            ProtocolVersion::from_protocol_number(754),
            Ok(ProtocolVersion::V1_16_5)
        );
        assert_eq!(
            ProtocolVersion::from_protocol_number(1),
            Err(ProtocolError::UnsupportedVersion(1))
        );
    }

    #[test]
    fn test_parse_version() {
        assert_eq!("1.12.2".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1_12_2));
        assert_eq!(" 340 ".parse::<ProtocolVersion>(), Ok(ProtocolVersion::V1_12_2));
        assert!("1.99".parse::<ProtocolVersion>().is_err());
    }

    #[test]
    fn test_packet_ids_distinct_per_version() {
        for version in ProtocolVersion::ALL {
            let ids = version.profile().packet_ids;
            let kinds = [
                PacketKind::SpawnLiving,
                PacketKind::Equipment,
                PacketKind::Metadata,
                PacketKind::Teleport,
                PacketKind::Destroy,
            ];
            let mut seen: Vec<i32> = kinds.iter().map(|k| ids.id_of(*k)).collect();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), kinds.len(), "duplicate id on {}", version);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtocolVersion::V1_16_5.to_string(), "1.16.5 (754)");
    }

    #[test]
    fn test_serde_round_trip_through_name() {
        let version: ProtocolVersion = serde_json::from_str("\"1.17.1\"").unwrap();
        assert_eq!(version, ProtocolVersion::V1_17_1);
        assert_eq!(serde_json::to_string(&version).unwrap(), "\"1.17.1\"");
    }
}
