//! Demo content shown to every viewer
//!
//! One status hologram (server name, protocol, viewer count, uptime) and one
//! mannequin waving its right arm.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::error::Result;
use crate::game::entity::VirtualEntity;
use crate::game::equipment::{EquipmentSlot, ItemStack};
use crate::game::hologram::Hologram;
use crate::game::pose::{BodyPart, EulerAngle};
use crate::game::stage::{PropId, Stage};
use crate::game::transform::{Position, Transform};
use crate::protocol::version::ItemFormat;

/// Where the status hologram floats
pub const HOLOGRAM_ANCHOR: Position = Position::new(0.5, 66.0, 0.5);

/// Where the mannequin stands
pub const MANNEQUIN_POSITION: Position = Position::new(3.5, 64.0, 0.5);

/// Index of the viewer count line
const VIEWERS_LINE: usize = 2;

/// Index of the uptime line
const UPTIME_LINE: usize = 3;

/// Peak arm swing in degrees
const SWING_AMPLITUDE: f32 = 45.0;

/// Swing phase advance per tick, in radians
const SWING_SPEED: f32 = 0.15;

/// Installed demo content
#[derive(Debug)]
pub struct Showcase {
    hologram: Arc<Hologram>,
    mannequin: PropId,
    started_at: DateTime<Utc>,
}

impl Showcase {
    /// Create the demo hologram and mannequin on a stage
    pub fn install(stage: &Stage) -> Result<Self> {
        let ctx = stage.context();
        let version = ctx.protocol.version();
        let started_at = Utc::now();

        let hologram = stage.create_hologram(HOLOGRAM_ANCHOR);
        hologram.add_lines([
            stage.settings.name.clone(),
            format!("Protocol {}", version),
            viewers_line(0),
            uptime_line(chrono::Duration::zero()),
        ])?;

        let transform = Transform::at(MANNEQUIN_POSITION).facing(180.0, 0.0);
        let mut mannequin = VirtualEntity::new(ctx, transform)?;
        mannequin.set_arms(true);
        mannequin.set_base_plate(false);
        mannequin.set_label(Some("Mannequin".to_string()));
        mannequin.set_label_visible(true);
        // Numeric item ids are only stable on the legacy item format
        if ctx.protocol.profile.items == ItemFormat::Legacy {
            mannequin.set_equipment(EquipmentSlot::Head, Some(ItemStack::new(310)));
            mannequin.set_equipment(EquipmentSlot::Chest, Some(ItemStack::new(311)));
            mannequin.set_equipment(EquipmentSlot::MainHand, Some(ItemStack::new(276)));
        }
        let mannequin = stage.add_prop(mannequin);

        info!(
            hologram = hologram.id(),
            mannequin = mannequin,
            started_at = %started_at.to_rfc3339(),
            "Showcase installed"
        );

        Ok(Self {
            hologram,
            mannequin,
            started_at,
        })
    }

    /// Advance the animation and refresh the status lines
    pub fn on_tick(&self, stage: &Stage, tick: u64) {
        let angle = right_arm_angle(tick);
        stage.with_prop(self.mannequin, |mannequin| {
            mannequin.set_pose(BodyPart::RightArm, angle);
            mannequin.update_metadata();
        });

        let viewers = stage.context().directory.connected_viewers().len();
        let uptime = Utc::now() - self.started_at;
        // set_line only sends when the text actually changes
        let updates = [
            (VIEWERS_LINE, viewers_line(viewers)),
            (UPTIME_LINE, uptime_line(uptime)),
        ];
        for (index, text) in updates {
            if let Err(e) = self.hologram.set_line(index, text) {
                warn!(error = %e, "Failed to refresh showcase line");
            }
        }
    }

    pub fn hologram(&self) -> &Arc<Hologram> {
        &self.hologram
    }

    pub fn mannequin(&self) -> PropId {
        self.mannequin
    }
}

fn viewers_line(count: usize) -> String {
    format!("Viewers: {}", count)
}

fn uptime_line(uptime: chrono::Duration) -> String {
    let secs = uptime.num_seconds().max(0);
    format!(
        "Uptime: {:02}:{:02}:{:02}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60
    )
}

/// Right arm rotation for a tick, swinging around the raised position
fn right_arm_angle(tick: u64) -> EulerAngle {
    let phase = (tick % 4096) as f32 * SWING_SPEED;
    EulerAngle::new(-90.0 + SWING_AMPLITUDE * phase.sin(), 0.0, 10.0)
}
