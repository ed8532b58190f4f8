//! Resolved protocol tables
//!
//! Bundles everything version-specific that entity packets need, validated once at
//! startup so a broken table fails the boot instead of a packet.

use tracing::debug;

use crate::error::Result;
use crate::game::equipment::EquipmentSlotRegistry;
use crate::game::pose::PoseRegistry;

use super::metadata::MetadataLayout;
use super::version::{ProtocolProfile, ProtocolVersion};

/// Version-specific tables shared by every virtual entity
#[derive(Clone)]
pub struct ProtocolTables {
    pub profile: ProtocolProfile,
    pub metadata: MetadataLayout,
    pub poses: PoseRegistry,
    pub slots: EquipmentSlotRegistry,
}

impl ProtocolTables {
    /// Build and validate the tables for a protocol version
    pub fn for_version(version: ProtocolVersion) -> Result<Self> {
        let metadata = MetadataLayout::for_version(version);
        metadata.validate()?;
        let poses = PoseRegistry::from_layout(&metadata)?;
        let slots = EquipmentSlotRegistry::for_version(version);

        debug!(version = %version, "Protocol tables resolved");

        Ok(Self {
            profile: version.profile(),
            metadata,
            poses,
            slots,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.profile.version
    }
}

impl std::fmt::Debug for ProtocolTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolTables")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_version_resolves() {
        for version in ProtocolVersion::ALL {
            let tables = ProtocolTables::for_version(version).unwrap();
            assert_eq!(tables.version(), version);
            assert_eq!(tables.poses.version(), version);
            assert_eq!(tables.slots.version(), version);
        }
    }
}
