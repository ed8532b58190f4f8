//! Stage module
//!
//! Manages everything the server displays:
//! - Hologram registry
//! - Props (standalone virtual entities such as mannequins)
//! - Viewer join/leave fan-out
//! - Fixed-rate tick loop driving animated content

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::{GameError, Result};
use crate::game::entity::{EntityContext, VirtualEntity};
use crate::game::hologram::{Hologram, HologramId, HologramSettings};
use crate::game::transform::Position;
use crate::game::viewer::ViewerId;

/// Default tick rate in milliseconds
pub const TICK_RATE_MS: u64 = 50;

/// Prop identifier, unique per stage
pub type PropId = u64;

/// Stage settings
#[derive(Debug, Clone)]
pub struct StageSettings {
    /// Server name shown in logs and demo content
    pub name: String,
    /// Tick rate in milliseconds
    pub tick_rate_ms: u64,
    /// Defaults for new holograms
    pub hologram: HologramSettings,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            name: "Phantom".to_string(),
            tick_rate_ms: TICK_RATE_MS,
            hologram: HologramSettings::default(),
        }
    }
}

impl StageSettings {
    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the tick rate
    pub fn with_tick_rate(mut self, tick_rate_ms: u64) -> Self {
        self.tick_rate_ms = tick_rate_ms;
        self
    }
}

/// Stage state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Stage is being populated
    Initializing,
    /// Tick loop is running
    Running,
    /// Tick loop has stopped
    Stopped,
}

/// Owner of all holograms and props
pub struct Stage {
    pub settings: StageSettings,
    ctx: EntityContext,
    holograms: DashMap<HologramId, Arc<Hologram>>,
    props: Mutex<HashMap<PropId, VirtualEntity>>,
    next_id: AtomicU64,
    state: RwLock<StageState>,
    tick: AtomicU64,
    running: AtomicBool,
    start_time: RwLock<Option<Instant>>,
}

impl Stage {
    /// Create an empty stage
    pub fn new(settings: StageSettings, ctx: EntityContext) -> Self {
        info!(name = %settings.name, "Creating stage");

        Self {
            settings,
            ctx,
            holograms: DashMap::new(),
            props: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            state: RwLock::new(StageState::Initializing),
            tick: AtomicU64::new(0),
            running: AtomicBool::new(false),
            start_time: RwLock::new(None),
        }
    }

    /// Shared entity services
    pub fn context(&self) -> &EntityContext {
        &self.ctx
    }

    // ============ Holograms ============

    /// Create an empty hologram with the stage defaults
    pub fn create_hologram(&self, anchor: Position) -> Arc<Hologram> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let hologram = Arc::new(Hologram::new(
            id,
            self.ctx.clone(),
            anchor,
            self.settings.hologram,
        ));
        self.holograms.insert(id, hologram.clone());
        debug!(hologram = id, "Hologram registered");
        hologram
    }

    /// Get a hologram by id
    pub fn hologram(&self, id: HologramId) -> Option<Arc<Hologram>> {
        self.holograms.get(&id).map(|h| h.clone())
    }

    /// Destroy and unregister a hologram
    pub fn remove_hologram(&self, id: HologramId) -> Result<()> {
        let (_, hologram) = self
            .holograms
            .remove(&id)
            .ok_or(GameError::HologramNotFound(id))?;
        hologram.destroy();
        Ok(())
    }

    pub fn hologram_count(&self) -> usize {
        self.holograms.len()
    }

    // ============ Props ============

    /// Register a prop and spawn it for every connected viewer
    pub fn add_prop(&self, mut entity: VirtualEntity) -> PropId {
        // Held across spawn and insert; a concurrent join waits for both
        let mut props = self.props.lock();
        for viewer in self.ctx.directory.connected_viewers() {
            entity.spawn(viewer);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(prop = id, entity_id = entity.id(), "Prop registered");
        props.insert(id, entity);
        id
    }

    /// Run a closure against a prop
    pub fn with_prop<R>(&self, id: PropId, f: impl FnOnce(&mut VirtualEntity) -> R) -> Option<R> {
        self.props.lock().get_mut(&id).map(f)
    }

    /// Destroy and unregister a prop
    pub fn remove_prop(&self, id: PropId) -> bool {
        match self.props.lock().remove(&id) {
            Some(entity) => {
                entity.destroy();
                true
            }
            None => false,
        }
    }

    pub fn prop_count(&self) -> usize {
        self.props.lock().len()
    }

    // ============ Viewers ============

    /// Show everything visible to a newly connected viewer
    pub fn on_viewer_join(&self, viewer: ViewerId) {
        for hologram in self.holograms.iter() {
            hologram.on_viewer_join(viewer);
        }
        for entity in self.props.lock().values_mut() {
            entity.spawn(viewer);
        }
        info!(viewer = %viewer, "Viewer joined stage");
    }

    /// Forget a disconnected viewer everywhere
    pub fn on_viewer_leave(&self, viewer: ViewerId) {
        for hologram in self.holograms.iter() {
            hologram.on_viewer_leave(viewer);
        }
        for entity in self.props.lock().values_mut() {
            entity.forget(viewer);
        }
        info!(viewer = %viewer, "Viewer left stage");
    }

    // ============ Tick loop ============

    /// Get the current state
    pub fn state(&self) -> StageState {
        *self.state.read()
    }

    fn set_state(&self, new_state: StageState) {
        let mut state = self.state.write();
        let old_state = *state;
        *state = new_state;
        info!(
            old_state = ?old_state,
            new_state = ?new_state,
            "Stage state changed"
        );
    }

    /// Get the current tick number
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Check if the tick loop is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time
            .read()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Ask the tick loop to stop after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run the tick loop until shutdown, calling `on_tick` every tick
    pub async fn run<F>(&self, shutdown_rx: &mut broadcast::Receiver<()>, mut on_tick: F)
    where
        F: FnMut(&Stage, u64),
    {
        info!(
            name = %self.settings.name,
            tick_rate_ms = self.settings.tick_rate_ms,
            "Starting stage"
        );

        self.running.store(true, Ordering::SeqCst);
        *self.start_time.write() = Some(Instant::now());
        self.set_state(StageState::Running);

        let mut tick_interval = interval(Duration::from_millis(self.settings.tick_rate_ms));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if !self.is_running() {
                        break;
                    }

                    let tick_num = self.tick.fetch_add(1, Ordering::SeqCst);
                    if tick_num % 1000 == 0 {
                        debug!(
                            tick = tick_num,
                            holograms = self.hologram_count(),
                            props = self.prop_count(),
                            "Stage tick milestone"
                        );
                    }
                    on_tick(self, tick_num);
                }
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.clear();
        self.set_state(StageState::Stopped);

        info!(
            total_ticks = self.tick(),
            uptime_secs = self.uptime_secs(),
            "Stage stopped"
        );
    }

    /// Destroy every hologram and prop
    pub fn clear(&self) {
        let ids: Vec<HologramId> = self.holograms.iter().map(|h| *h.key()).collect();
        for id in ids {
            if let Some((_, hologram)) = self.holograms.remove(&id) {
                hologram.destroy();
            }
        }
        let props: Vec<VirtualEntity> = self.props.lock().drain().map(|(_, e)| e).collect();
        for entity in props {
            entity.destroy();
        }
    }

    /// Get stage info as a string
    pub fn info(&self) -> String {
        format!(
            "Stage {} - {} holograms - {} props - Tick {} - Uptime {}s",
            self.settings.name,
            self.hologram_count(),
            self.prop_count(),
            self.tick(),
            self.uptime_secs()
        )
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .field("tick", &self.tick())
            .field("running", &self.is_running())
            .field("holograms", &self.hologram_count())
            .field("props", &self.prop_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    use crate::game::entity::EntityIdAllocator;
    use crate::game::transform::Transform;
    use crate::net::session::{SessionManager, SessionState};
    use crate::protocol::tables::ProtocolTables;
    use crate::protocol::version::ProtocolVersion;

    fn stage() -> (Arc<SessionManager>, Stage) {
        let sessions = Arc::new(SessionManager::new());
        let ctx = EntityContext::new(
            sessions.clone(),
            Arc::new(ProtocolTables::for_version(ProtocolVersion::V1_12_2).unwrap()),
            Arc::new(EntityIdAllocator::default()),
        );
        (sessions, Stage::new(StageSettings::default().with_tick_rate(5), ctx))
    }

    #[test]
    fn test_stage_settings_builder() {
        let settings = StageSettings::default()
            .with_name("Lobby")
            .with_tick_rate(100);

        assert_eq!(settings.name, "Lobby");
        assert_eq!(settings.tick_rate_ms, 100);
    }

    #[test]
    fn test_hologram_registry() {
        let (_, stage) = stage();
        let hologram = stage.create_hologram(Position::new(0.0, 10.0, 0.0));

        assert_eq!(stage.hologram_count(), 1);
        assert!(stage.hologram(hologram.id()).is_some());

        stage.remove_hologram(hologram.id()).unwrap();
        assert_eq!(stage.hologram_count(), 0);
        assert!(stage.remove_hologram(hologram.id()).is_err());
    }

    #[test]
    fn test_join_spawns_props() {
        let (sessions, stage) = stage();
        let entity = VirtualEntity::new(stage.context(), Transform::default()).unwrap();
        let prop = stage.add_prop(entity);

        let (tx, mut rx) = mpsc::channel(16);
        let session = sessions
            .create_session_with_channel("127.0.0.1:1".parse().unwrap(), tx)
            .unwrap();
        session.set_state(SessionState::Viewing);

        stage.on_viewer_join(session.viewer_id());
        assert!(rx.try_recv().is_ok());
        assert_eq!(
            stage.with_prop(prop, |e| e.is_spawned_for(session.viewer_id())),
            Some(true)
        );

        stage.on_viewer_leave(session.viewer_id());
        assert_eq!(
            stage.with_prop(prop, |e| e.viewer_count()),
            Some(0)
        );
    }

    #[test]
    fn test_prop_added_during_join_reaches_viewer() {
        let (sessions, stage) = stage();
        let stage = Arc::new(stage);
        let (tx, _rx) = mpsc::channel(1024);
        let session = sessions
            .create_session_with_channel("127.0.0.1:2".parse().unwrap(), tx)
            .unwrap();
        let viewer = session.viewer_id();

        let adder = {
            let stage = stage.clone();
            std::thread::spawn(move || {
                (0..50)
                    .map(|_| {
                        let entity =
                            VirtualEntity::new(stage.context(), Transform::default()).unwrap();
                        stage.add_prop(entity)
                    })
                    .collect::<Vec<_>>()
            })
        };
        session.set_state(SessionState::Viewing);
        stage.on_viewer_join(viewer);
        let props = adder.join().unwrap();

        for prop in props {
            assert_eq!(
                stage.with_prop(prop, |e| e.is_spawned_for(viewer)),
                Some(true)
            );
        }
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown() {
        let (_, stage) = stage();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let mut ticks = 0u64;

        let run = stage.run(&mut shutdown_rx, |stage, _| {
            ticks += 1;
            if ticks == 3 {
                stage.stop();
            }
        });
        run.await;
        drop(shutdown_tx);

        assert_eq!(ticks, 3);
        assert_eq!(stage.state(), StageState::Stopped);
        assert!(!stage.is_running());
    }
}
