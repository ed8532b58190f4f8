//! Game module
//!
//! This module contains the virtual entity layer of the Phantom server:
//! - Armor stand appearance (pose, equipment, flags)
//! - Virtual entities and their per-viewer spawn bookkeeping
//! - Holograms with per-viewer visibility
//! - The stage that owns displayed content and runs the tick loop

pub mod appearance;
pub mod entity;
pub mod equipment;
pub mod hologram;
pub mod pose;
pub mod showcase;
pub mod stage;
pub mod transform;
pub mod viewer;
