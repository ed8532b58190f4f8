//! Entity placement in the world

use serde::{Deserialize, Serialize};

/// Absolute world position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Offset vertically
    pub fn below(self, distance: f64) -> Self {
        Self {
            y: self.y - distance,
            ..self
        }
    }
}

/// Facing in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

/// Position with an optional facing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Position,
    pub rotation: Option<Rotation>,
}

impl Transform {
    /// Transform with no facing
    pub fn at(position: Position) -> Self {
        Self {
            position,
            rotation: None,
        }
    }

    /// Set the facing
    pub fn facing(mut self, yaw: f32, pitch: f32) -> Self {
        self.rotation = Some(Rotation { yaw, pitch });
        self
    }

    /// Yaw in degrees, zero when no facing is set
    pub fn yaw(&self) -> f32 {
        self.rotation.map(|r| r.yaw).unwrap_or(0.0)
    }

    /// Pitch in degrees, zero when no facing is set
    pub fn pitch(&self) -> f32 {
        self.rotation.map(|r| r.pitch).unwrap_or(0.0)
    }
}
