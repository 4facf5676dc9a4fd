//! # Joint Actuator Demands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands sent to the actuator driver once per control cycle.
///
/// There is exactly one entry per joint in chain order, for every cycle.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct JointDems {
    /// Demanded position of each joint.
    ///
    /// Units: radians for revolute joints, meters for prismatic joints
    pub pos_rad: Vec<f64>,

    /// Demanded speed of each joint.
    ///
    /// Units: radians/second for revolute joints, meters/second for prismatic joints
    pub speed_rads: Vec<f64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl JointDems {
    /// Demands holding the given positions with zero speed.
    pub fn hold(pos_rad: &[f64]) -> Self {
        Self {
            pos_rad: pos_rad.to_vec(),
            speed_rads: vec![0.0; pos_rad.len()],
        }
    }

    /// Number of joints covered by these demands.
    pub fn num_joints(&self) -> usize {
        self.pos_rad.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hold() {
        let dems = JointDems::hold(&[0.1, -0.2, 0.3]);

        assert_eq!(dems.num_joints(), 3);
        assert_eq!(dems.pos_rad, vec![0.1, -0.2, 0.3]);
        assert_eq!(dems.speed_rads, vec![0.0; 3]);
    }
}
