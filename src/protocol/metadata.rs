//! Entity metadata encoding
//!
//! Metadata is a keyed-field snapshot: every entry names a field index, a type tag
//! and a value. The layout of the armor stand fields and the numeric type tags move
//! between protocol versions, so both are looked up from [`MetadataLayout`].

use serde_json::json;

use crate::error::ProtocolError;
use crate::game::pose::EulerAngle;
use crate::net::buffer::PacketBuffer;

use super::version::ProtocolVersion;

/// Terminator of a packed (protocol 47) metadata section
pub const PACKED_TERMINATOR: u8 = 0x7F;

/// Terminator of a keyed metadata section
pub const KEYED_TERMINATOR: u8 = 0xFF;

/// Highest field index a packed header can address
const PACKED_MAX_INDEX: u8 = 0x1F;

/// Wire-level field types used by armor stand metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Byte,
    Boolean,
    String,
    OptChat,
    Rotation,
}

impl WireType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::OptChat => "optional chat",
            Self::Rotation => "rotation",
        }
    }
}

/// How entries are framed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// One header byte `(type << 5) | index`, terminated by 0x7F
    Packed,
    /// Index byte then type tag, terminated by 0xFF
    Keyed,
}

/// Position and type of one metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub index: u8,
    pub wire: WireType,
}

impl FieldSpec {
    const fn new(index: u8, wire: WireType) -> Self {
        Self { index, wire }
    }
}

/// Armor stand metadata layout for one protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataLayout {
    pub version: ProtocolVersion,
    pub format: MetadataFormat,
    /// Base entity flags (invisible = 0x20)
    pub entity_flags: FieldSpec,
    pub custom_name: FieldSpec,
    pub custom_name_visible: FieldSpec,
    /// Armor stand flags (small, arms, base plate, marker)
    pub stand_flags: FieldSpec,
    /// Rotation field indices in body part order
    pub rotations: &'static [u8],
}

impl MetadataLayout {
    /// Get the layout for a protocol version
    pub fn for_version(version: ProtocolVersion) -> Self {
        use WireType::*;

        match version {
            ProtocolVersion::V1_8 => Self {
                version,
                format: MetadataFormat::Packed,
                entity_flags: FieldSpec::new(0, Byte),
                custom_name: FieldSpec::new(2, String),
                custom_name_visible: FieldSpec::new(3, Byte),
                stand_flags: FieldSpec::new(10, Byte),
                rotations: &[11, 12, 13, 14, 15, 16],
            },
            ProtocolVersion::V1_12_2 => Self {
                version,
                format: MetadataFormat::Keyed,
                entity_flags: FieldSpec::new(0, Byte),
                custom_name: FieldSpec::new(2, String),
                custom_name_visible: FieldSpec::new(3, Boolean),
                stand_flags: FieldSpec::new(11, Byte),
                rotations: &[12, 13, 14, 15, 16, 17],
            },
            ProtocolVersion::V1_16_5 => Self {
                version,
                format: MetadataFormat::Keyed,
                entity_flags: FieldSpec::new(0, Byte),
                custom_name: FieldSpec::new(2, OptChat),
                custom_name_visible: FieldSpec::new(3, Boolean),
                stand_flags: FieldSpec::new(14, Byte),
                rotations: &[15, 16, 17, 18, 19, 20],
            },
            ProtocolVersion::V1_17_1 => Self {
                version,
                format: MetadataFormat::Keyed,
                entity_flags: FieldSpec::new(0, Byte),
                custom_name: FieldSpec::new(2, OptChat),
                custom_name_visible: FieldSpec::new(3, Boolean),
                stand_flags: FieldSpec::new(15, Byte),
                rotations: &[16, 17, 18, 19, 20, 21],
            },
        }
    }

    /// Get the numeric type tag for a wire type, if this version has it
    pub fn type_tag(&self, wire: WireType) -> Option<u8> {
        match (self.version, wire) {
            (ProtocolVersion::V1_8, WireType::Byte) => Some(0),
            (ProtocolVersion::V1_8, WireType::String) => Some(4),
            (ProtocolVersion::V1_8, WireType::Rotation) => Some(7),
            (ProtocolVersion::V1_8, _) => None,

            (ProtocolVersion::V1_12_2, WireType::Byte) => Some(0),
            (ProtocolVersion::V1_12_2, WireType::String) => Some(3),
            (ProtocolVersion::V1_12_2, WireType::Boolean) => Some(6),
            (ProtocolVersion::V1_12_2, WireType::Rotation) => Some(7),
            (ProtocolVersion::V1_12_2, WireType::OptChat) => None,

            (_, WireType::Byte) => Some(0),
            (_, WireType::String) => Some(3),
            (_, WireType::OptChat) => Some(5),
            (_, WireType::Boolean) => Some(7),
            (_, WireType::Rotation) => Some(8),
        }
    }

    /// Check that every fixed field has a type tag and an addressable index
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let mut fields = vec![
            self.entity_flags,
            self.custom_name,
            self.custom_name_visible,
            self.stand_flags,
        ];
        fields.extend(
            self.rotations
                .iter()
                .map(|&index| FieldSpec::new(index, WireType::Rotation)),
        );

        for field in fields {
            if self.type_tag(field.wire).is_none() {
                return Err(ProtocolError::MissingTypeTag {
                    wire: field.wire.name(),
                    version: self.version,
                });
            }
            if self.format == MetadataFormat::Packed && field.index > PACKED_MAX_INDEX {
                return Err(ProtocolError::MalformedPacket(format!(
                    "field index {} does not fit a packed header",
                    field.index
                )));
            }
        }
        Ok(())
    }

    /// Build an entry, checking the value against the field's wire type
    pub fn entry(&self, field: FieldSpec, value: MetaValue) -> Result<MetaEntry, ProtocolError> {
        let type_tag = self
            .type_tag(field.wire)
            .ok_or(ProtocolError::MissingTypeTag {
                wire: field.wire.name(),
                version: self.version,
            })?;

        let compatible = matches!(
            (field.wire, &value),
            (WireType::Byte, MetaValue::Byte(_))
                | (WireType::Byte, MetaValue::Bool(_))
                | (WireType::Boolean, MetaValue::Bool(_))
                | (WireType::String, MetaValue::Text(_))
                | (WireType::OptChat, MetaValue::Text(_))
                | (WireType::Rotation, MetaValue::Rotation(_))
        );
        if !compatible {
            return Err(ProtocolError::FieldTypeMismatch {
                index: field.index,
                expected: field.wire.name(),
                actual: value.kind_name(),
            });
        }

        Ok(MetaEntry {
            index: field.index,
            type_tag,
            wire: field.wire,
            value,
        })
    }

    /// Write a full metadata section including its terminator
    pub fn write_entries(&self, entries: &[MetaEntry], buffer: &mut PacketBuffer) {
        for entry in entries {
            match self.format {
                MetadataFormat::Packed => {
                    buffer.write_ubyte((entry.type_tag << 5) | (entry.index & PACKED_MAX_INDEX));
                }
                MetadataFormat::Keyed => {
                    buffer.write_ubyte(entry.index);
                    buffer.write_varint(entry.type_tag as i32);
                }
            }
            entry.write_value(buffer);
        }
        buffer.write_ubyte(self.terminator());
    }

    /// Get the section terminator byte
    pub fn terminator(&self) -> u8 {
        match self.format {
            MetadataFormat::Packed => PACKED_TERMINATOR,
            MetadataFormat::Keyed => KEYED_TERMINATOR,
        }
    }
}

/// Logical metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Byte(u8),
    Bool(bool),
    Text(Option<String>),
    Rotation(EulerAngle),
}

impl MetaValue {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Byte(_) => "byte",
            Self::Bool(_) => "boolean",
            Self::Text(_) => "text",
            Self::Rotation(_) => "rotation",
        }
    }
}

/// A validated metadata entry, ready to encode
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEntry {
    pub index: u8,
    pub type_tag: u8,
    pub wire: WireType,
    pub value: MetaValue,
}

impl MetaEntry {
    fn write_value(&self, buffer: &mut PacketBuffer) {
        match (&self.value, self.wire) {
            (MetaValue::Byte(value), _) => buffer.write_ubyte(*value),
            (MetaValue::Bool(value), WireType::Byte) => buffer.write_ubyte(u8::from(*value)),
            (MetaValue::Bool(value), _) => buffer.write_bool(*value),
            (MetaValue::Text(text), WireType::OptChat) => {
                buffer.write_bool(text.is_some());
                if let Some(text) = text {
                    buffer.write_string(&chat_component(text));
                }
            }
            (MetaValue::Text(text), _) => buffer.write_string(text.as_deref().unwrap_or("")),
            (MetaValue::Rotation(angle), _) => {
                buffer.write_float(angle.x);
                buffer.write_float(angle.y);
                buffer.write_float(angle.z);
            }
        }
    }
}

/// Wrap plain text in a JSON chat component
pub fn chat_component(text: &str) -> String {
    json!({ "text": text }).to_string()
}
