//! Application state module
//!
//! Contains the shared state used across all viewer connections.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::game::entity::{EntityContext, EntityIdAllocator};
use crate::game::stage::Stage;
use crate::net::session::SessionManager;
use crate::protocol::tables::ProtocolTables;

/// Application state shared across all connections
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Session manager for tracking connected viewers
    pub session_manager: Arc<SessionManager>,
    /// Protocol tables for the configured client version
    pub protocol: Arc<ProtocolTables>,
    /// Entity id allocator shared by every virtual entity
    pub entity_ids: Arc<EntityIdAllocator>,
    /// Displayed holograms and props
    pub stage: Arc<Stage>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Result<Self> {
        let protocol = Arc::new(ProtocolTables::for_version(config.protocol_version)?);
        let session_manager = Arc::new(SessionManager::with_limits(
            config.max_connections_per_ip,
        ));
        let entity_ids = Arc::new(EntityIdAllocator::new(config.entity_id_base));

        let ctx = EntityContext::new(
            session_manager.clone(),
            protocol.clone(),
            entity_ids.clone(),
        );
        let stage = Arc::new(Stage::new(config.stage_settings(), ctx));

        info!(
            protocol = %config.protocol_version,
            entity_id_base = config.entity_id_base,
            "Application state created"
        );

        Ok(Self {
            config,
            session_manager,
            protocol,
            entity_ids,
            stage,
            shutdown_tx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::version::ProtocolVersion;

    #[test]
    fn test_state_uses_configured_protocol() {
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = ServerConfig {
            protocol_version: ProtocolVersion::V1_12_2,
            ..ServerConfig::default()
        };

        let state = AppState::new(config, shutdown_tx).unwrap();

        assert_eq!(state.protocol.version(), ProtocolVersion::V1_12_2);
        assert_eq!(state.stage.hologram_count(), 0);
        assert_eq!(state.session_manager.count(), 0);
    }
}
