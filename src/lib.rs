//! Phantom Server Library
//!
//! Packet-only virtual entities for block-game servers: armor stands that exist
//! only as packets sent to chosen viewers, holograms built from stacks of them,
//! and posable mannequins.
//!
//! ## Modules
//!
//! - `config` - Server configuration management
//! - `error` - Error types and result definitions
//! - `game` - Virtual entities, holograms and the stage
//! - `net` - Network handling and session management
//! - `protocol` - Versioned packet and metadata encoding

pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod protocol;
pub mod state;

// Re-export commonly used types
pub use config::ServerConfig;
pub use error::{PhantomError, Result};
pub use state::AppState;

/// Server version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
