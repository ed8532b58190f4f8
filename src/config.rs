//! Server configuration module
//!
//! Handles loading and parsing of server configuration from files and environment variables.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game::entity::DEFAULT_ENTITY_ID_BASE;
use crate::game::hologram::HologramSettings;
use crate::game::stage::{StageSettings, TICK_RATE_MS};
use crate::protocol::version::ProtocolVersion;

/// Fewest entity ids the configured base must leave available
const MIN_ENTITY_ID_SPACE: i32 = 65_536;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Server name shown on the status hologram
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Address to bind the listener on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client protocol all viewers are assumed to speak
    #[serde(default = "default_protocol_version")]
    pub protocol_version: ProtocolVersion,

    /// Stage tick rate in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// First virtual entity id
    #[serde(default = "default_entity_id_base")]
    pub entity_id_base: i32,

    /// Packets buffered per viewer before sends start failing
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Maximum simultaneous connections from one IP
    #[serde(default = "default_max_connections_per_ip")]
    pub max_connections_per_ip: usize,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,

    /// Hologram defaults
    #[serde(default)]
    pub hologram: HologramSettings,
}

// Default value functions
fn default_server_name() -> String {
    "Phantom".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_protocol_version() -> ProtocolVersion {
    ProtocolVersion::V1_16_5
}

fn default_tick_rate() -> u64 {
    TICK_RATE_MS
}

fn default_entity_id_base() -> i32 {
    DEFAULT_ENTITY_ID_BASE
}

fn default_outbound_queue_capacity() -> usize {
    1024
}

fn default_max_connections_per_ip() -> usize {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("config/server.toml"),
            server_name: default_server_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            protocol_version: default_protocol_version(),
            tick_rate_ms: default_tick_rate(),
            entity_id_base: default_entity_id_base(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            max_connections_per_ip: default_max_connections_per_ip(),
            log_json: false,
            debug: false,
            hologram: HologramSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        // Determine config path from environment or use default
        let config_path = env::var("PHANTOM_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/server.toml"));

        // Try to load from file
        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml_str(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;

        // Override with environment variables
        config.apply_env_overrides();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PHANTOM_SERVER_NAME") {
            self.server_name = val;
        }
        if let Ok(val) = env::var("PHANTOM_BIND_ADDRESS") {
            self.bind_address = val;
        }
        if let Ok(val) = env::var("PHANTOM_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Ok(val) = env::var("PHANTOM_PROTOCOL") {
            match val.parse() {
                Ok(version) => self.protocol_version = version,
                Err(e) => tracing::warn!("Ignoring PHANTOM_PROTOCOL: {}", e),
            }
        }
        if let Ok(val) = env::var("PHANTOM_TICK_RATE_MS") {
            if let Ok(rate) = val.parse() {
                self.tick_rate_ms = rate;
            }
        }
        if let Ok(val) = env::var("PHANTOM_ENTITY_ID_BASE") {
            if let Ok(base) = val.parse() {
                self.entity_id_base = base;
            }
        }
        if let Ok(val) = env::var("PHANTOM_LOG_JSON") {
            self.log_json = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("PHANTOM_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Tick rate must be reasonable
        if self.tick_rate_ms < 10 || self.tick_rate_ms > 5000 {
            anyhow::bail!("Tick rate must be between 10ms and 5000ms");
        }

        if self.entity_id_base <= 0 {
            anyhow::bail!("Entity id base must be positive");
        }

        if self.entity_id_base > i32::MAX - MIN_ENTITY_ID_SPACE {
            anyhow::bail!(
                "Entity id base must leave at least {} ids below {}",
                MIN_ENTITY_ID_SPACE,
                i32::MAX
            );
        }

        if self.outbound_queue_capacity == 0 {
            anyhow::bail!("Outbound queue capacity must be at least 1");
        }

        if self.max_connections_per_ip == 0 {
            anyhow::bail!("Max connections per IP must be at least 1");
        }

        if !self.hologram.line_spacing.is_finite() || self.hologram.line_spacing <= 0.0 {
            anyhow::bail!("Hologram line spacing must be a positive number");
        }

        self.socket_addr()?;

        Ok(())
    }

    /// Get the listener address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind_address))
    }

    /// Build stage settings from this configuration
    pub fn stage_settings(&self) -> StageSettings {
        StageSettings {
            name: self.server_name.clone(),
            tick_rate_ms: self.tick_rate_ms,
            hologram: self.hologram,
        }
    }
}
