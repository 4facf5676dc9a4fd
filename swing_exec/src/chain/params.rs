//! Parameters structure for the kinematic chain

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::{JointDesc, JointLimits, JointType, Origin};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Static description of the arm, loaded once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    // ---- GEOMETRY ----
    /// Joints in order from the base to the paddle.
    pub joints: Vec<JointDesc>,

    /// Transform from the last joint's frame to the paddle reference point.
    /// The paddle normal is the z axis of this frame.
    pub tool: Origin,

    // ---- CONFIGURATIONS ----
    /// Ready configuration the arm returns to between strikes.
    ///
    /// Units: radians or meters, per joint
    pub rest_pos: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChainParams {
    /// A planar arm of revolute joints rotating about world z, with links
    /// along the joint's x axis.
    ///
    /// All joints share the same position limits of +/- `max_pos_rad` and the
    /// same velocity limit.
    pub fn planar(link_lengths_m: &[f64], max_pos_rad: f64, max_vel_rads: f64) -> Self {
        let joints = link_lengths_m
            .iter()
            .enumerate()
            .map(|(i, _)| JointDesc {
                name: format!("joint_{}", i),
                joint_type: JointType::Revolute,
                origin: Origin {
                    xyz_m: [if i == 0 { 0.0 } else { link_lengths_m[i - 1] }, 0.0, 0.0],
                    rpy_rad: [0.0; 3],
                },
                axis: [0.0, 0.0, 1.0],
                limits: JointLimits {
                    min_pos: -max_pos_rad,
                    max_pos: max_pos_rad,
                    max_vel: max_vel_rads,
                },
            })
            .collect();

        Self {
            joints,
            tool: Origin {
                xyz_m: [link_lengths_m.last().copied().unwrap_or(0.0), 0.0, 0.0],
                rpy_rad: [0.0; 3],
            },
            rest_pos: vec![0.0; link_lengths_m.len()],
        }
    }
}
