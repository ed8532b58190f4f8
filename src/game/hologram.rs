//! Holograms
//!
//! A hologram is a vertical stack of text lines, each rendered by an invisible
//! marker armor stand with a visible label. Line `i` floats at
//! `anchor.y - i * line_spacing`. Visibility is decided per viewer: an explicit
//! override wins, otherwise the hologram-wide default applies.
//!
//! All mutation goes through one mutex, so a hologram can be shared between the
//! tick loop and connection handlers. Visibility lookups read the override map
//! without taking it.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{GameError, Result};
use crate::game::appearance::Appearance;
use crate::game::entity::{EntityContext, VirtualEntity};
use crate::game::transform::{Position, Transform};
use crate::game::viewer::ViewerId;

/// Hologram identifier, unique per stage
pub type HologramId = u64;

/// Default vertical distance between lines
pub const DEFAULT_LINE_SPACING: f64 = 0.25;

/// Hologram defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HologramSettings {
    /// Vertical distance between consecutive lines
    pub line_spacing: f64,
    /// Visibility for viewers without an override
    pub visible_by_default: bool,
}

impl Default for HologramSettings {
    fn default() -> Self {
        Self {
            line_spacing: DEFAULT_LINE_SPACING,
            visible_by_default: true,
        }
    }
}

struct HologramState {
    anchor: Position,
    lines: Vec<String>,
    /// One entity per line, same order
    entities: Vec<VirtualEntity>,
}

/// A multi-line floating text display
pub struct Hologram {
    id: HologramId,
    ctx: EntityContext,
    line_spacing: f64,
    state: Mutex<HologramState>,
    overrides: DashMap<ViewerId, bool>,
    default_visible: AtomicBool,
}

impl Hologram {
    /// Create an empty hologram. Nothing is sent until lines are added.
    pub fn new(
        id: HologramId,
        ctx: EntityContext,
        anchor: Position,
        settings: HologramSettings,
    ) -> Self {
        Self {
            id,
            ctx,
            line_spacing: settings.line_spacing,
            state: Mutex::new(HologramState {
                anchor,
                lines: Vec::new(),
                entities: Vec::new(),
            }),
            overrides: DashMap::new(),
            default_visible: AtomicBool::new(settings.visible_by_default),
        }
    }

    pub fn id(&self) -> HologramId {
        self.id
    }

    /// World position of line `index`
    pub fn line_position(anchor: Position, index: usize, spacing: f64) -> Position {
        anchor.below(index as f64 * spacing)
    }

    // ============ Lines ============

    /// Append lines, spawning each for every viewer the hologram is visible to
    pub fn add_lines<I, S>(&self, texts: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        let viewers = self.visible_viewers();

        for text in texts {
            let text = text.into();
            let index = state.lines.len();
            let mut entity = self.line_entity(state.anchor, index, &text)?;
            for viewer in &viewers {
                entity.spawn(*viewer);
            }
            state.lines.push(text);
            state.entities.push(entity);
        }

        self.check_aligned(&mut state);
        Ok(())
    }

    /// Replace all lines
    ///
    /// Lines that still exist are relabelled in place, extra entities are destroyed
    /// and new lines get fresh entities.
    pub fn set_lines<I, S>(&self, texts: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = texts.into_iter().map(Into::into).collect();
        let mut state = self.state.lock();

        if state.entities.len() > texts.len() {
            let removed = state.entities.split_off(texts.len());
            for entity in removed {
                entity.destroy();
            }
            state.lines.truncate(texts.len());
        }

        let kept = state.entities.len();
        let HologramState {
            lines, entities, ..
        } = &mut *state;
        for (index, text) in texts.iter().enumerate().take(kept) {
            if lines[index] != *text {
                lines[index] = text.clone();
                let entity = &mut entities[index];
                entity.set_label(Some(text.clone()));
                entity.update_metadata();
            }
        }

        if texts.len() > kept {
            let viewers = self.visible_viewers();
            for text in texts.into_iter().skip(kept) {
                let index = state.lines.len();
                let mut entity = self.line_entity(state.anchor, index, &text)?;
                for viewer in &viewers {
                    entity.spawn(*viewer);
                }
                state.lines.push(text);
                state.entities.push(entity);
            }
        }

        self.check_aligned(&mut state);
        Ok(())
    }

    /// Replace the text of one line
    pub fn set_line(&self, index: usize, text: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        let size = state.lines.len();
        if index >= size {
            return Err(GameError::LineOutOfRange { index, size }.into());
        }

        let text = text.into();
        if state.lines[index] == text {
            return Ok(());
        }
        state.lines[index] = text.clone();
        let entity = &mut state.entities[index];
        entity.set_label(Some(text));
        entity.update_metadata();
        Ok(())
    }

    /// Remove one line; lines below it move up
    pub fn remove_line(&self, index: usize) -> Result<String> {
        let mut state = self.state.lock();
        let size = state.lines.len();
        if index >= size {
            return Err(GameError::LineOutOfRange { index, size }.into());
        }

        let removed = state.lines.remove(index);

        // Relabel the entities from `index` on, then drop the last one
        let HologramState {
            lines, entities, ..
        } = &mut *state;
        for (entity, text) in entities.iter_mut().zip(lines.iter()).skip(index) {
            entity.set_label(Some(text.clone()));
            entity.update_metadata();
        }
        if let Some(last) = state.entities.pop() {
            last.destroy();
        }

        self.check_aligned(&mut state);
        Ok(removed)
    }

    /// Move the anchor; every line keeps its offset
    pub fn teleport(&self, anchor: Position) {
        let mut state = self.state.lock();
        state.anchor = anchor;
        let spacing = self.line_spacing;
        for (index, entity) in state.entities.iter_mut().enumerate() {
            entity.teleport(Transform::at(Self::line_position(anchor, index, spacing)));
        }
    }

    // ============ Visibility ============

    /// Make the hologram visible to one viewer
    pub fn show_to(&self, viewer: ViewerId) {
        self.set_override(viewer, true);
    }

    /// Hide the hologram from one viewer
    pub fn hide_to(&self, viewer: ViewerId) {
        self.set_override(viewer, false);
    }

    /// Remove a viewer's override so the default applies again
    pub fn clear_override(&self, viewer: ViewerId) {
        let mut state = self.state.lock();
        let was_visible = self.is_visible_to(viewer);
        self.overrides.remove(&viewer);
        let visible = self.is_visible_to(viewer);
        if was_visible != visible {
            self.apply_transition(&mut state, viewer, visible);
        }
    }

    /// Change the default, updating every connected viewer without an override
    pub fn set_visible_by_default(&self, visible: bool) {
        let mut state = self.state.lock();
        if self.default_visible.swap(visible, Ordering::SeqCst) == visible {
            return;
        }

        for viewer in self.ctx.directory.connected_viewers() {
            if !self.overrides.contains_key(&viewer) {
                self.apply_transition(&mut state, viewer, visible);
            }
        }
        debug!(hologram = self.id, visible, "Default visibility changed");
    }

    /// Spawn lines for a newly connected viewer, if visible to them
    pub fn on_viewer_join(&self, viewer: ViewerId) {
        let mut state = self.state.lock();
        if self.is_visible_to(viewer) {
            for entity in state.entities.iter_mut() {
                entity.spawn(viewer);
            }
        }
    }

    /// Forget a disconnected viewer without sending anything
    pub fn on_viewer_leave(&self, viewer: ViewerId) {
        let mut state = self.state.lock();
        self.overrides.remove(&viewer);
        for entity in state.entities.iter_mut() {
            entity.forget(viewer);
        }
    }

    /// Check if the hologram is visible to a viewer
    pub fn is_visible_to(&self, viewer: ViewerId) -> bool {
        self.overrides
            .get(&viewer)
            .map(|entry| *entry)
            .unwrap_or_else(|| self.is_visible_by_default())
    }

    pub fn is_visible_by_default(&self) -> bool {
        self.default_visible.load(Ordering::SeqCst)
    }

    // ============ Lifecycle ============

    /// Despawn every line for every viewer and clear the hologram
    pub fn destroy(&self) {
        let mut state = self.state.lock();
        let count = state.entities.len();
        for entity in state.entities.drain(..) {
            entity.destroy();
        }
        state.lines.clear();
        self.overrides.clear();
        info!(hologram = self.id, lines = count, "Hologram destroyed");
    }

    // ============ Accessors ============

    pub fn size(&self) -> usize {
        self.state.lock().lines.len()
    }

    pub fn lines(&self) -> Vec<String> {
        self.state.lock().lines.clone()
    }

    pub fn anchor(&self) -> Position {
        self.state.lock().anchor
    }

    /// Entity ids of the lines, top to bottom
    pub fn entity_ids(&self) -> Vec<i32> {
        self.state.lock().entities.iter().map(|e| e.id()).collect()
    }

    /// Check if every line is spawned for a viewer
    pub fn is_spawned_for(&self, viewer: ViewerId) -> bool {
        let state = self.state.lock();
        !state.entities.is_empty() && state.entities.iter().all(|e| e.is_spawned_for(viewer))
    }

    // ============ Internals ============

    fn line_entity(&self, anchor: Position, index: usize, text: &str) -> Result<VirtualEntity> {
        let position = Self::line_position(anchor, index, self.line_spacing);
        let entity = VirtualEntity::with_appearance(
            &self.ctx,
            Transform::at(position),
            Appearance::floating_label(text),
        )?;
        Ok(entity)
    }

    fn visible_viewers(&self) -> Vec<ViewerId> {
        self.ctx
            .directory
            .connected_viewers()
            .into_iter()
            .filter(|viewer| self.is_visible_to(*viewer))
            .collect()
    }

    fn set_override(&self, viewer: ViewerId, visible: bool) {
        let mut state = self.state.lock();
        let was_visible = self.is_visible_to(viewer);
        self.overrides.insert(viewer, visible);
        if was_visible != visible {
            self.apply_transition(&mut state, viewer, visible);
        }
    }

    fn apply_transition(&self, state: &mut HologramState, viewer: ViewerId, visible: bool) {
        if visible {
            if !self.ctx.directory.is_connected(viewer) {
                return;
            }
            for entity in state.entities.iter_mut() {
                entity.spawn(viewer);
            }
        } else {
            for entity in state.entities.iter_mut() {
                entity.destroy_for(viewer);
            }
        }
        debug!(hologram = self.id, viewer = %viewer, visible, "Visibility changed");
    }

    fn check_aligned(&self, state: &mut HologramState) {
        let (entities, lines) = (state.entities.len(), state.lines.len());
        if entities == lines {
            return;
        }
        error!(
            hologram = self.id,
            entities,
            lines,
            "Hologram lines and entities out of step"
        );
        self.realign(state);
        debug_assert_eq!(entities, lines, "hologram lines and entities out of step");
    }

    /// Bring entities back to one per line
    ///
    /// Surplus entities are destroyed. Missing ones are created and spawned for
    /// visible viewers; if that fails the unrendered lines are dropped.
    fn realign(&self, state: &mut HologramState) {
        let lines = state.lines.len();
        if state.entities.len() > lines {
            for entity in state.entities.split_off(lines) {
                entity.destroy();
            }
            return;
        }

        let viewers = self.visible_viewers();
        for index in state.entities.len()..lines {
            match self.line_entity(state.anchor, index, &state.lines[index]) {
                Ok(mut entity) => {
                    for viewer in &viewers {
                        entity.spawn(*viewer);
                    }
                    state.entities.push(entity);
                }
                Err(e) => {
                    warn!(hologram = self.id, error = %e, "Dropping lines without entities");
                    state.lines.truncate(index);
                    return;
                }
            }
        }
    }
}

impl std::fmt::Debug for Hologram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hologram")
            .field("id", &self.id)
            .field("lines", &self.size())
            .field("visible_by_default", &self.is_visible_by_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::game::entity::EntityIdAllocator;
    use crate::net::session::SessionManager;
    use crate::protocol::tables::ProtocolTables;
    use crate::protocol::version::ProtocolVersion;

    fn hologram(lines: &[&str]) -> Hologram {
        let ctx = EntityContext::new(
            Arc::new(SessionManager::new()),
            Arc::new(ProtocolTables::for_version(ProtocolVersion::V1_16_5).unwrap()),
            Arc::new(EntityIdAllocator::default()),
        );
        let hologram = Hologram::new(
            1,
            ctx,
            Position::new(0.0, 70.0, 0.0),
            HologramSettings::default(),
        );
        hologram.add_lines(lines.iter().copied()).unwrap();
        hologram
    }

    #[test]
    fn test_realign_destroys_surplus_entities() {
        let hologram = hologram(&["a", "b", "c"]);
        let live_before = hologram.ctx.ids.live_count();
        {
            let mut state = hologram.state.lock();
            state.lines.truncate(1);
            hologram.realign(&mut state);
        }

        assert_eq!(hologram.entity_ids().len(), 1);
        assert_eq!(hologram.ctx.ids.live_count(), live_before - 2);
    }

    #[test]
    fn test_realign_creates_missing_entities() {
        let hologram = hologram(&["a"]);
        {
            let mut state = hologram.state.lock();
            state.lines.push("b".to_string());
            state.lines.push("c".to_string());
            hologram.realign(&mut state);
        }

        assert_eq!(hologram.size(), 3);
        assert_eq!(hologram.entity_ids().len(), 3);
        let labels: Vec<Option<String>> = hologram
            .state
            .lock()
            .entities
            .iter()
            .map(|e| e.appearance().label.clone())
            .collect();
        assert_eq!(
            labels,
            vec![
                Some("a".to_string()),
                Some("b".to_string()),
                Some("c".to_string())
            ]
        );
    }

    #[test]
    fn test_line_positions() {
        let anchor = Position::new(5.0, 10.0, -5.0);
        assert_eq!(Hologram::line_position(anchor, 0, 0.25), anchor);
        assert_eq!(
            Hologram::line_position(anchor, 2, 0.25),
            Position::new(5.0, 9.5, -5.0)
        );
    }

    #[test]
    fn test_set_lines_reconciles() {
        let hologram = hologram(&["a", "b", "c"]);
        let ids = hologram.entity_ids();

        hologram.set_lines(["a", "x"]).unwrap();
        assert_eq!(hologram.lines(), vec!["a", "x"]);
        assert_eq!(hologram.entity_ids(), ids[..2].to_vec());

        hologram.set_lines(["a", "x", "y", "z"]).unwrap();
        assert_eq!(hologram.size(), 4);
        assert_eq!(hologram.entity_ids()[..2], ids[..2]);
    }

    #[test]
    fn test_set_line_out_of_range() {
        let hologram = hologram(&["a"]);
        let result = hologram.set_line(3, "nope");

        assert!(matches!(
            result,
            Err(crate::error::PhantomError::Game(GameError::LineOutOfRange {
                index: 3,
                size: 1
            }))
        ));
        assert_eq!(hologram.lines(), vec!["a"]);
    }

    #[test]
    fn test_remove_line_shifts_up() {
        let hologram = hologram(&["a", "b", "c"]);
        let ids = hologram.entity_ids();

        assert_eq!(hologram.remove_line(0).unwrap(), "a");
        assert_eq!(hologram.lines(), vec!["b", "c"]);
        assert_eq!(hologram.entity_ids(), ids[..2].to_vec());
    }

    #[test]
    fn test_visibility_resolution() {
        let hologram = hologram(&[]);
        let viewer = ViewerId(9);

        assert!(hologram.is_visible_to(viewer));
        hologram.hide_to(viewer);
        assert!(!hologram.is_visible_to(viewer));

        hologram.set_visible_by_default(false);
        hologram.show_to(viewer);
        assert!(hologram.is_visible_to(viewer));

        hologram.clear_override(viewer);
        assert!(!hologram.is_visible_to(viewer));
    }

    #[test]
    fn test_destroy_releases_ids() {
        let hologram = hologram(&["a", "b"]);
        let ids = hologram.entity_ids();
        let allocator = hologram.ctx.ids.clone();

        hologram.destroy();

        assert_eq!(hologram.size(), 0);
        assert!(ids.iter().all(|id| !allocator.is_live(*id)));
    }
}
