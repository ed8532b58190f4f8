//! Equipment module
//!
//! This module handles armor stand equipment:
//! - Six logical equipment slots (both hands and four armor pieces)
//! - Item stacks as shown on the stand
//! - Per-version slot id resolution (1.8 has no off hand)

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::protocol::version::ProtocolVersion;

/// Number of logical equipment slots
pub const EQUIPMENT_SLOT_COUNT: usize = 6;

/// Logical equipment slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Feet,
    Legs,
    Chest,
    Head,
}

impl EquipmentSlot {
    pub const ALL: [EquipmentSlot; EQUIPMENT_SLOT_COUNT] = [
        EquipmentSlot::MainHand,
        EquipmentSlot::OffHand,
        EquipmentSlot::Feet,
        EquipmentSlot::Legs,
        EquipmentSlot::Chest,
        EquipmentSlot::Head,
    ];

    /// Position in the equipment array
    pub fn index(self) -> usize {
        self as usize
    }

    /// Check if this is an armor slot
    pub fn is_armor(self) -> bool {
        matches!(self, Self::Feet | Self::Legs | Self::Chest | Self::Head)
    }
}

/// An item stack displayed on an armor stand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Numeric item id for the target protocol
    pub item_id: i32,
    /// Stack size
    pub count: u8,
    /// Damage/data value (legacy item format only)
    pub damage: i16,
}

impl ItemStack {
    /// Create a single item
    pub fn new(item_id: i32) -> Self {
        Self {
            item_id,
            count: 1,
            damage: 0,
        }
    }

    /// Set the stack size
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    /// Set the damage value
    pub fn with_damage(mut self, damage: i16) -> Self {
        self.damage = damage;
        self
    }
}

/// Maps logical slots to protocol slot ids for one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSlotRegistry {
    version: ProtocolVersion,
    ids: [Option<u8>; EQUIPMENT_SLOT_COUNT],
}

impl EquipmentSlotRegistry {
    /// Build the slot table for a protocol version
    pub fn for_version(version: ProtocolVersion) -> Self {
        let ids = match version {
            // held, boots, leggings, chestplate, helmet
            ProtocolVersion::V1_8 => [Some(0), None, Some(1), Some(2), Some(3), Some(4)],
            _ => [Some(0), Some(1), Some(2), Some(3), Some(4), Some(5)],
        };
        Self { version, ids }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Resolve a logical slot to its protocol id
    pub fn resolve(&self, slot: EquipmentSlot) -> Result<u8, RegistryError> {
        self.ids[slot.index()].ok_or(RegistryError::UnsupportedSlot {
            slot,
            version: self.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_slot_ids() {
        let registry = EquipmentSlotRegistry::for_version(ProtocolVersion::V1_8);

        assert_eq!(registry.resolve(EquipmentSlot::MainHand), Ok(0));
        assert_eq!(registry.resolve(EquipmentSlot::Feet), Ok(1));
        assert_eq!(registry.resolve(EquipmentSlot::Head), Ok(4));
        assert_eq!(
            registry.resolve(EquipmentSlot::OffHand),
            Err(RegistryError::UnsupportedSlot {
                slot: EquipmentSlot::OffHand,
                version: ProtocolVersion::V1_8,
            })
        );
    }

    #[test]
    fn test_modern_slot_ids() {
        for version in [
            ProtocolVersion::V1_12_2,
            ProtocolVersion::V1_16_5,
            ProtocolVersion::V1_17_1,
        ] {
            let registry = EquipmentSlotRegistry::for_version(version);
            for (expected, slot) in EquipmentSlot::ALL.into_iter().enumerate() {
                assert_eq!(registry.resolve(slot), Ok(expected as u8));
            }
        }
    }

    #[test]
    fn test_item_builder() {
        let item = ItemStack::new(276).with_count(2).with_damage(3);
        assert_eq!(item.item_id, 276);
        assert_eq!(item.count, 2);
        assert_eq!(item.damage, 3);
        assert!(EquipmentSlot::Head.is_armor());
        assert!(!EquipmentSlot::OffHand.is_armor());
    }
}
