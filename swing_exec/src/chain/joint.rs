//! Joint description

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// Internal
use super::ChainError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A revolute joint whose range covers at least this many radians is treated
/// as continuous.
const CONTINUOUS_RANGE_RAD: f64 = std::f64::consts::TAU - 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The type of motion a joint provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JointType {
    /// Rotation about the joint axis.
    Revolute,

    /// Translation along the joint axis.
    Prismatic,
}

/// Capabilities of a single joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Minimum position (lowest negative value)
    ///
    /// Units: radians or meters
    pub min_pos: f64,

    /// Maximum position (highest positive value)
    ///
    /// Units: radians or meters
    pub max_pos: f64,

    /// Maximum absolute speed
    ///
    /// Units: radians/second or meters/second
    pub max_vel: f64,
}

/// A fixed transform between two frames, given as a translation followed by
/// roll-pitch-yaw angles (as in a URDF origin tag).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Origin {
    /// Translation of the child frame in the parent frame.
    ///
    /// Units: meters
    pub xyz_m: [f64; 3],

    /// Rotation of the child frame in the parent frame.
    ///
    /// Units: radians
    #[serde(default)]
    pub rpy_rad: [f64; 3],
}

/// Description of one joint as loaded from the robot description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDesc {
    pub name: String,

    pub joint_type: JointType,

    /// Transform from the previous joint (or the base) to this joint's frame
    /// at zero joint position.
    pub origin: Origin,

    /// Axis of motion expressed in this joint's frame. Does not need to be
    /// normalised.
    pub axis: [f64; 3],

    pub limits: JointLimits,
}

/// A joint of the chain, built from a validated `JointDesc`.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Position of the joint in the chain, starting at the base.
    pub index: usize,

    pub name: String,

    pub joint_type: JointType,

    /// Transform from the parent frame to this joint's frame at zero position.
    pub parent_tf: Isometry3<f64>,

    /// Unit axis of motion in this joint's frame.
    pub axis: Unit<Vector3<f64>>,

    pub limits: JointLimits,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Origin {
    /// Convert the origin into an isometry.
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(self.xyz_m[0], self.xyz_m[1], self.xyz_m[2]),
            UnitQuaternion::from_euler_angles(self.rpy_rad[0], self.rpy_rad[1], self.rpy_rad[2]),
        )
    }
}

impl Joint {
    /// Build a joint from its description, validating the limits and axis.
    pub fn from_desc(index: usize, desc: &JointDesc) -> Result<Self, ChainError> {
        let axis = Vector3::new(desc.axis[0], desc.axis[1], desc.axis[2]);

        let axis = Unit::try_new(axis, 1e-9).ok_or_else(|| {
            ChainError::InvalidDescription(format!("joint {} has a zero axis", desc.name))
        })?;

        if !(desc.limits.min_pos <= desc.limits.max_pos) {
            return Err(ChainError::InvalidDescription(format!(
                "joint {} has min_pos ({}) above max_pos ({})",
                desc.name, desc.limits.min_pos, desc.limits.max_pos
            )));
        }

        if !(desc.limits.max_vel > 0.0) {
            return Err(ChainError::InvalidDescription(format!(
                "joint {} must have a positive velocity limit, found {}",
                desc.name, desc.limits.max_vel
            )));
        }

        Ok(Self {
            index,
            name: desc.name.clone(),
            joint_type: desc.joint_type,
            parent_tf: desc.origin.isometry(),
            axis,
            limits: desc.limits,
        })
    }

    /// Transform from the parent frame to this joint's moved frame at the
    /// given joint position.
    pub fn local_tf(&self, value: f64) -> Isometry3<f64> {
        let motion = match self.joint_type {
            JointType::Revolute => Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&self.axis, value),
            ),
            JointType::Prismatic => Isometry3::from_parts(
                Translation3::from(self.axis.into_inner() * value),
                UnitQuaternion::identity(),
            ),
        };

        self.parent_tf * motion
    }

    /// True if the joint can rotate through a full turn, in which case
    /// position differences may be wrapped.
    pub fn is_continuous(&self) -> bool {
        self.joint_type == JointType::Revolute
            && (self.limits.max_pos - self.limits.min_pos) >= CONTINUOUS_RANGE_RAD
    }

    /// Saturate a position at the joint's limits, returning the saturated
    /// value and whether saturation was needed.
    pub fn clamp_pos(&self, value: f64) -> (f64, bool) {
        let clamped = value.max(self.limits.min_pos).min(self.limits.max_pos);
        (clamped, clamped != value)
    }

    /// Saturate a velocity at the joint's limits, returning the saturated
    /// value and whether saturation was needed.
    pub fn clamp_vel(&self, value: f64) -> (f64, bool) {
        let clamped = value.max(-self.limits.max_vel).min(self.limits.max_vel);
        (clamped, clamped != value)
    }

    /// Middle of the joint's position range.
    pub fn centre_pos(&self) -> f64 {
        0.5 * (self.limits.min_pos + self.limits.max_pos)
    }
}
