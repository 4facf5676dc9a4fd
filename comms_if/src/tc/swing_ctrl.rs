//! # Swing control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be executed by swing control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwingCmd {
    /// Stop the arm, discarding any planned swing and holding the current
    /// joint positions with zero velocity.
    Stop,

    /// Resume planning swings after a stop.
    Resume,

    /// Move back to the ready configuration.
    ReturnIdle,

    /// Set the point the ball should be returned to after impact.
    SetGoal {
        /// Goal position in the world frame.
        ///
        /// Units: meters
        goal_m: [f64; 3],
    },

    /// Set the gain applied to the secondary (redundancy) objective for
    /// subsequent swings.
    SetSecondaryGain {
        /// Gain, zero disables the secondary objective.
        gain: f64,
    },

    /// Override the per-joint weights used in redundancy resolution for
    /// subsequent swings. Higher weights make a joint less preferred.
    SetJointWeights {
        /// One weight per joint, in chain order.
        weights: Vec<f64>,
    },
}
