//! Armor stand poses
//!
//! This module handles the six articulated body parts:
//! - Euler angle rotations (degrees) per body part
//! - Neutral poses matching a freshly placed armor stand
//! - A per-version registry that maps each body part to its metadata field
//!   and to a typed accessor pair on the appearance state

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::game::appearance::Appearance;
use crate::protocol::metadata::MetadataLayout;
use crate::protocol::version::ProtocolVersion;

/// Number of articulated body parts
pub const BODY_PART_COUNT: usize = 6;

/// Rotation in degrees around the x, y and z axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EulerAngle {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl EulerAngle {
    /// Zero rotation
    pub const ZERO: EulerAngle = EulerAngle::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Articulated armor stand body parts, in metadata order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyPart {
    Head,
    Body,
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl BodyPart {
    pub const ALL: [BodyPart; BODY_PART_COUNT] = [
        BodyPart::Head,
        BodyPart::Body,
        BodyPart::LeftArm,
        BodyPart::RightArm,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
    ];

    /// Position in metadata order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Rotation of a freshly placed armor stand
    pub fn neutral(self) -> EulerAngle {
        match self {
            Self::Head | Self::Body => EulerAngle::ZERO,
            Self::LeftArm => EulerAngle::new(-10.0, 0.0, -10.0),
            Self::RightArm => EulerAngle::new(-15.0, 0.0, 10.0),
            Self::LeftLeg => EulerAngle::new(-1.0, 0.0, -1.0),
            Self::RightLeg => EulerAngle::new(1.0, 0.0, 1.0),
        }
    }
}

/// All six body part rotations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub head: EulerAngle,
    pub body: EulerAngle,
    pub left_arm: EulerAngle,
    pub right_arm: EulerAngle,
    pub left_leg: EulerAngle,
    pub right_leg: EulerAngle,
}

impl Default for Pose {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Pose {
    /// Neutral pose for every body part
    pub fn neutral() -> Self {
        Self {
            head: BodyPart::Head.neutral(),
            body: BodyPart::Body.neutral(),
            left_arm: BodyPart::LeftArm.neutral(),
            right_arm: BodyPart::RightArm.neutral(),
            left_leg: BodyPart::LeftLeg.neutral(),
            right_leg: BodyPart::RightLeg.neutral(),
        }
    }
}

/// Reads one body part rotation from appearance state
pub type PoseGetter = fn(&Appearance) -> EulerAngle;

/// Writes one body part rotation into appearance state
pub type PoseSetter = fn(&mut Appearance, EulerAngle);

/// Typed accessor pair for one body part
#[derive(Clone, Copy)]
pub struct PoseAccessor {
    pub get: PoseGetter,
    pub set: PoseSetter,
}

fn get_head(a: &Appearance) -> EulerAngle {
    a.pose.head
}

fn set_head(a: &mut Appearance, v: EulerAngle) {
    a.pose.head = v;
}

fn get_body(a: &Appearance) -> EulerAngle {
    a.pose.body
}

fn set_body(a: &mut Appearance, v: EulerAngle) {
    a.pose.body = v;
}

fn get_left_arm(a: &Appearance) -> EulerAngle {
    a.pose.left_arm
}

fn set_left_arm(a: &mut Appearance, v: EulerAngle) {
    a.pose.left_arm = v;
}

fn get_right_arm(a: &Appearance) -> EulerAngle {
    a.pose.right_arm
}

fn set_right_arm(a: &mut Appearance, v: EulerAngle) {
    a.pose.right_arm = v;
}

fn get_left_leg(a: &Appearance) -> EulerAngle {
    a.pose.left_leg
}

fn set_left_leg(a: &mut Appearance, v: EulerAngle) {
    a.pose.left_leg = v;
}

fn get_right_leg(a: &Appearance) -> EulerAngle {
    a.pose.right_leg
}

fn set_right_leg(a: &mut Appearance, v: EulerAngle) {
    a.pose.right_leg = v;
}

/// Accessor table in body part order
const ACCESSORS: [PoseAccessor; BODY_PART_COUNT] = [
    PoseAccessor {
        get: get_head,
        set: set_head,
    },
    PoseAccessor {
        get: get_body,
        set: set_body,
    },
    PoseAccessor {
        get: get_left_arm,
        set: set_left_arm,
    },
    PoseAccessor {
        get: get_right_arm,
        set: set_right_arm,
    },
    PoseAccessor {
        get: get_left_leg,
        set: set_left_leg,
    },
    PoseAccessor {
        get: get_right_leg,
        set: set_right_leg,
    },
];

/// Get the accessor pair for a body part
pub fn accessor(part: BodyPart) -> PoseAccessor {
    ACCESSORS[part.index()]
}

/// Binding of one body part to its wire field
#[derive(Clone, Copy)]
pub struct PoseBinding {
    pub part: BodyPart,
    pub field_index: u8,
    pub accessor: PoseAccessor,
}

/// Per-version pose field registry
#[derive(Clone)]
pub struct PoseRegistry {
    version: ProtocolVersion,
    bindings: [PoseBinding; BODY_PART_COUNT],
}

impl PoseRegistry {
    /// Build the registry for a protocol version
    ///
    /// Fails if the metadata layout has no rotation field for some body part.
    pub fn for_version(version: ProtocolVersion) -> Result<Self, RegistryError> {
        let layout = MetadataLayout::for_version(version);
        Self::from_layout(&layout)
    }

    /// Build the registry from an explicit metadata layout
    pub fn from_layout(layout: &MetadataLayout) -> Result<Self, RegistryError> {
        let mut bindings = [PoseBinding {
            part: BodyPart::Head,
            field_index: 0,
            accessor: accessor(BodyPart::Head),
        }; BODY_PART_COUNT];

        for part in BodyPart::ALL {
            let field_index = *layout.rotations.get(part.index()).ok_or(
                RegistryError::MissingPoseField {
                    part,
                    version: layout.version,
                },
            )?;
            bindings[part.index()] = PoseBinding {
                part,
                field_index,
                accessor: accessor(part),
            };
        }

        Ok(Self {
            version: layout.version,
            bindings,
        })
    }

    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Get the binding for a body part
    pub fn binding(&self, part: BodyPart) -> &PoseBinding {
        &self.bindings[part.index()]
    }

    /// Get the metadata field index for a body part
    pub fn field_index(&self, part: BodyPart) -> u8 {
        self.binding(part).field_index
    }

    /// Iterate bindings in body part order
    pub fn iter(&self) -> impl Iterator<Item = &PoseBinding> {
        self.bindings.iter()
    }
}
