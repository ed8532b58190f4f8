//! Appearance state of a virtual armor stand
//!
//! Holds everything a viewer sees besides position: the floating label, visibility
//! flags, pose and equipment. Converting it to metadata entries goes through the
//! protocol tables so the same state renders correctly on every version.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::game::equipment::{EquipmentSlot, ItemStack, EQUIPMENT_SLOT_COUNT};
use crate::game::pose::{BodyPart, EulerAngle, Pose};
use crate::protocol::metadata::{FieldSpec, MetaEntry, MetaValue, WireType};
use crate::protocol::tables::ProtocolTables;

bitflags! {
    /// Base entity flags (metadata field 0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntityFlags: u8 {
        const ON_FIRE = 0x01;
        const CROUCHING = 0x02;
        const SPRINTING = 0x08;
        const INVISIBLE = 0x20;
        const GLOWING = 0x40;
    }
}

bitflags! {
    /// Armor stand flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StandFlags: u8 {
        const SMALL = 0x01;
        const ARMS = 0x04;
        const NO_BASE_PLATE = 0x08;
        const MARKER = 0x10;
    }
}

impl Serialize for StandFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for StandFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(StandFlags::from_bits_truncate)
    }
}

/// Visual state of a virtual entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Appearance {
    /// Floating label text
    pub label: Option<String>,
    /// Whether the label is rendered
    pub label_visible: bool,
    /// Whether the stand itself is rendered
    pub invisible: bool,
    pub stand_flags: StandFlags,
    pub pose: Pose,
    pub equipment: [Option<ItemStack>; EQUIPMENT_SLOT_COUNT],
}

/// Metadata entries built from an appearance, plus the fields that were left out
#[derive(Debug, Default)]
pub struct MetadataSnapshot {
    pub entries: Vec<MetaEntry>,
    pub skipped: Vec<ProtocolError>,
}

impl Appearance {
    /// Appearance used for hologram lines: a visible label on an invisible marker
    pub fn floating_label(text: impl Into<String>) -> Self {
        Self {
            label: Some(text.into()),
            label_visible: true,
            invisible: true,
            stand_flags: StandFlags::MARKER,
            ..Self::default()
        }
    }

    /// Get the rotation of a body part
    pub fn pose_of(&self, part: BodyPart) -> EulerAngle {
        (crate::game::pose::accessor(part).get)(self)
    }

    /// Set the rotation of a body part
    pub fn set_pose(&mut self, part: BodyPart, angle: EulerAngle) {
        (crate::game::pose::accessor(part).set)(self, angle);
    }

    /// Get the item in a slot
    pub fn item(&self, slot: EquipmentSlot) -> Option<ItemStack> {
        self.equipment[slot.index()]
    }

    /// Set or clear the item in a slot
    pub fn set_item(&mut self, slot: EquipmentSlot, item: Option<ItemStack>) {
        self.equipment[slot.index()] = item;
    }

    /// Toggle a stand flag
    pub fn set_stand_flag(&mut self, flag: StandFlags, enabled: bool) {
        self.stand_flags.set(flag, enabled);
    }

    /// Get the base entity flags byte
    pub fn entity_flags(&self) -> EntityFlags {
        if self.invisible {
            EntityFlags::INVISIBLE
        } else {
            EntityFlags::empty()
        }
    }

    /// Build metadata entries for the given protocol
    ///
    /// With `all_poses` unset, body parts still in their neutral pose are left out;
    /// that is what a spawn needs. Updates send every pose so the viewer ends up
    /// with a complete snapshot.
    pub fn metadata(&self, tables: &ProtocolTables, all_poses: bool) -> MetadataSnapshot {
        let layout = &tables.metadata;
        let mut snapshot = MetadataSnapshot::default();

        let mut push = |field: FieldSpec, value: MetaValue| match layout.entry(field, value) {
            Ok(entry) => snapshot.entries.push(entry),
            Err(e) => snapshot.skipped.push(e),
        };

        push(layout.entity_flags, MetaValue::Byte(self.entity_flags().bits()));
        push(layout.custom_name, MetaValue::Text(self.label.clone()));
        push(layout.custom_name_visible, MetaValue::Bool(self.label_visible));
        push(layout.stand_flags, MetaValue::Byte(self.stand_flags.bits()));

        for binding in tables.poses.iter() {
            let angle = (binding.accessor.get)(self);
            if !all_poses && angle == binding.part.neutral() {
                continue;
            }
            push(
                FieldSpec {
                    index: binding.field_index,
                    wire: WireType::Rotation,
                },
                MetaValue::Rotation(angle),
            );
        }

        snapshot
    }
}
