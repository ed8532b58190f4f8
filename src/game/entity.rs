//! Virtual entities
//!
//! A virtual entity is an armor stand that exists only as packets: the server keeps
//! its transform and appearance, and replays them to each viewer it has been spawned
//! for. Nothing is registered with a world simulation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{GameError, NetworkError};
use crate::game::appearance::{Appearance, StandFlags};
use crate::game::equipment::{EquipmentSlot, ItemStack};
use crate::game::pose::{BodyPart, EulerAngle};
use crate::game::transform::Transform;
use crate::game::viewer::{ViewerDirectory, ViewerId};
use crate::protocol::packets::{
    DestroyPacket, EncodedPacket, EquipmentPacket, MetadataPacket, OutgoingPacket,
    SpawnLivingPacket, TeleportPacket,
};
use crate::protocol::tables::ProtocolTables;

/// Default first entity id, far above ids a real server hands out
pub const DEFAULT_ENTITY_ID_BASE: i32 = 1_000_000_000;

/// Attempts before giving up on finding a free id
const MAX_ALLOCATION_ATTEMPTS: usize = 4096;

/// Hands out entity ids that are unique among live virtual entities
#[derive(Debug)]
pub struct EntityIdAllocator {
    base: i32,
    next: AtomicI32,
    live: DashSet<i32>,
}

impl EntityIdAllocator {
    /// Create an allocator starting at `base`
    pub fn new(base: i32) -> Self {
        Self {
            base,
            next: AtomicI32::new(base),
            live: DashSet::new(),
        }
    }

    /// Allocate a free id
    pub fn allocate(&self) -> Result<i32, GameError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = self.next.fetch_add(1, Ordering::SeqCst);

            // Wrap around if needed
            if id < self.base || id == i32::MAX {
                self.next.store(self.base, Ordering::SeqCst);
                continue;
            }

            if self.live.insert(id) {
                return Ok(id);
            }
        }

        Err(GameError::EntityIdsExhausted)
    }

    /// Return an id to the pool
    pub fn release(&self, id: i32) {
        self.live.remove(&id);
    }

    /// Check if an id belongs to a live entity
    pub fn is_live(&self, id: i32) -> bool {
        self.live.contains(&id)
    }

    /// Number of live ids
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Default for EntityIdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_ID_BASE)
    }
}

/// Shared services every virtual entity needs
#[derive(Clone)]
pub struct EntityContext {
    pub directory: Arc<dyn ViewerDirectory>,
    pub protocol: Arc<ProtocolTables>,
    pub ids: Arc<EntityIdAllocator>,
}

impl EntityContext {
    pub fn new(
        directory: Arc<dyn ViewerDirectory>,
        protocol: Arc<ProtocolTables>,
        ids: Arc<EntityIdAllocator>,
    ) -> Self {
        Self {
            directory,
            protocol,
            ids,
        }
    }
}

/// A packet-only armor stand
pub struct VirtualEntity {
    id: i32,
    uuid: Uuid,
    transform: Transform,
    appearance: Appearance,
    spawned_for: HashSet<ViewerId>,
    ctx: EntityContext,
}

impl VirtualEntity {
    /// Create an entity with default appearance. It is not spawned for anyone.
    pub fn new(ctx: &EntityContext, transform: Transform) -> Result<Self, GameError> {
        Self::with_appearance(ctx, transform, Appearance::default())
    }

    /// Create an entity with a given appearance
    pub fn with_appearance(
        ctx: &EntityContext,
        transform: Transform,
        appearance: Appearance,
    ) -> Result<Self, GameError> {
        let id = ctx.ids.allocate()?;
        trace!(entity_id = id, "Virtual entity created");

        Ok(Self {
            id,
            uuid: Uuid::new_v4(),
            transform,
            appearance,
            spawned_for: HashSet::new(),
            ctx: ctx.clone(),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    /// Check if the entity is spawned for a viewer
    pub fn is_spawned_for(&self, viewer: ViewerId) -> bool {
        self.spawned_for.contains(&viewer)
    }

    /// Viewers the entity is currently spawned for
    pub fn viewers(&self) -> impl Iterator<Item = ViewerId> + '_ {
        self.spawned_for.iter().copied()
    }

    pub fn viewer_count(&self) -> usize {
        self.spawned_for.len()
    }

    // ============ Setters (local state only) ============

    pub fn set_label(&mut self, label: Option<String>) {
        self.appearance.label = label;
    }

    pub fn set_label_visible(&mut self, visible: bool) {
        self.appearance.label_visible = visible;
    }

    pub fn set_invisible(&mut self, invisible: bool) {
        self.appearance.invisible = invisible;
    }

    pub fn set_small(&mut self, small: bool) {
        self.appearance.set_stand_flag(StandFlags::SMALL, small);
    }

    pub fn set_arms(&mut self, arms: bool) {
        self.appearance.set_stand_flag(StandFlags::ARMS, arms);
    }

    pub fn set_base_plate(&mut self, shown: bool) {
        self.appearance
            .set_stand_flag(StandFlags::NO_BASE_PLATE, !shown);
    }

    pub fn set_marker(&mut self, marker: bool) {
        self.appearance.set_stand_flag(StandFlags::MARKER, marker);
    }

    pub fn set_pose(&mut self, part: BodyPart, angle: EulerAngle) {
        self.appearance.set_pose(part, angle);
    }

    pub fn set_equipment(&mut self, slot: EquipmentSlot, item: Option<ItemStack>) {
        self.appearance.set_item(slot, item);
    }

    // ============ Viewer operations ============

    /// Spawn for a viewer: creation, then equipment, then metadata
    ///
    /// Does nothing if already spawned for the viewer. If the creation packet
    /// cannot be queued the viewer stays unspawned. Once it is queued the viewer
    /// counts as spawned unless its connection is gone.
    pub fn spawn(&mut self, viewer: ViewerId) {
        if self.spawned_for.contains(&viewer) {
            trace!(entity_id = self.id, viewer = %viewer, "Already spawned");
            return;
        }

        let spawn = SpawnLivingPacket {
            entity_id: self.id,
            uuid: self.uuid,
            transform: self.transform,
        }
        .to_packet(&self.ctx.protocol);

        if self.deliver(viewer, spawn).is_err() {
            return;
        }
        // The creation packet is queued, so the client will have a copy from here on
        self.spawned_for.insert(viewer);

        let mut packets = self.equipment_packets(false);
        packets.push(self.metadata_packet(false));
        for packet in packets {
            if let Err(e) = self.deliver(viewer, packet) {
                if e.is_disconnect() {
                    self.spawned_for.remove(&viewer);
                }
                return;
            }
        }

        debug!(entity_id = self.id, viewer = %viewer, "Spawned virtual entity");
    }

    /// Despawn for a viewer
    pub fn destroy_for(&mut self, viewer: ViewerId) {
        if !self.spawned_for.remove(&viewer) {
            return;
        }
        let packet = DestroyPacket::single(self.id).to_packet(&self.ctx.protocol);
        let _ = self.deliver(viewer, packet);
    }

    /// Despawn for every viewer and release the entity id
    pub fn destroy(self) {
        drop(self);
    }

    /// Move the entity, broadcasting to every spawned viewer
    pub fn teleport(&mut self, transform: Transform) {
        self.transform = transform;
        let packet = TeleportPacket {
            entity_id: self.id,
            transform,
        }
        .to_packet(&self.ctx.protocol);
        self.broadcast(packet);
    }

    /// Broadcast a full metadata snapshot
    pub fn update_metadata(&mut self) {
        let packet = self.metadata_packet(true);
        self.broadcast(packet);
    }

    /// Broadcast every equipment slot, empty slots included
    pub fn update_equipment(&mut self) {
        for packet in self.equipment_packets(true) {
            self.broadcast(packet);
        }
    }

    /// Broadcast equipment, then metadata
    pub fn update(&mut self) {
        self.update_equipment();
        self.update_metadata();
    }

    /// Drop a viewer from the spawned set without sending anything
    pub fn forget(&mut self, viewer: ViewerId) {
        self.spawned_for.remove(&viewer);
    }

    // ============ Internals ============

    fn metadata_packet(&self, all_poses: bool) -> EncodedPacket {
        let snapshot = self.appearance.metadata(&self.ctx.protocol, all_poses);
        for error in &snapshot.skipped {
            warn!(entity_id = self.id, error = %error, "Metadata field left out");
        }
        MetadataPacket {
            entity_id: self.id,
            entries: snapshot.entries,
        }
        .to_packet(&self.ctx.protocol)
    }

    fn equipment_packets(&self, include_empty: bool) -> Vec<EncodedPacket> {
        let tables = &self.ctx.protocol;
        let mut slots = Vec::new();

        for slot in EquipmentSlot::ALL {
            let item = self.appearance.item(slot);
            if item.is_none() && !include_empty {
                continue;
            }
            match tables.slots.resolve(slot) {
                Ok(id) => slots.push((id, item)),
                Err(e) if item.is_some() => {
                    warn!(entity_id = self.id, error = %e, "Equipment slot left out");
                }
                Err(_) => {}
            }
        }

        EquipmentPacket::batch(self.id, slots, tables.profile.equipment)
            .iter()
            .map(|packet| packet.to_packet(tables))
            .collect()
    }

    fn deliver(&self, viewer: ViewerId, packet: EncodedPacket) -> Result<(), NetworkError> {
        self.ctx.directory.send(viewer, packet).map_err(|e| {
            warn!(
                entity_id = self.id,
                viewer = %viewer,
                error = %e,
                "Failed to queue packet"
            );
            e
        })
    }

    /// Send to every spawned viewer
    ///
    /// Viewers whose connection is gone are dropped. A full queue only loses this
    /// packet; the viewer keeps its copy and still gets later updates and teardown.
    fn broadcast(&mut self, packet: EncodedPacket) {
        let gone: Vec<ViewerId> = self
            .spawned_for
            .iter()
            .copied()
            .filter(|viewer| match self.deliver(*viewer, packet.clone()) {
                Ok(()) => false,
                Err(e) => e.is_disconnect(),
            })
            .collect();
        for viewer in gone {
            self.spawned_for.remove(&viewer);
        }
    }

    fn teardown(&mut self) {
        if !self.spawned_for.is_empty() {
            let packet = DestroyPacket::single(self.id).to_packet(&self.ctx.protocol);
            for viewer in std::mem::take(&mut self.spawned_for) {
                let _ = self.deliver(viewer, packet.clone());
            }
        }
        self.ctx.ids.release(self.id);
    }
}

impl Drop for VirtualEntity {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for VirtualEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualEntity")
            .field("id", &self.id)
            .field("uuid", &self.uuid)
            .field("transform", &self.transform)
            .field("viewers", &self.spawned_for.len())
            .finish()
    }
}
