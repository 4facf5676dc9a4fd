//! # Kinematic chain module
//!
//! Static description of the arm (joint types, parent transforms, limits)
//! and the kinematic functions evaluated on it: forward kinematics, the
//! geometric and task Jacobians, and joint limit enforcement.
//!
//! All functions in this module are pure, the live configuration of the arm
//! is owned by swing control and only passed in by reference.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod config;
mod joint;
mod kinematics;
mod params;
mod task;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use config::*;
pub use joint::*;
pub use kinematics::*;
pub use params::*;
pub use task::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur when using the kinematic chain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid chain description: {0}")]
    InvalidDescription(String),

    #[error("Expected {expected} joint values but found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Kinematic singularity, smallest singular value is {sigma_min:.3e}")]
    KinematicSingularity { sigma_min: f64 },

    #[error("Joint limits violated on joint(s) {0:?}")]
    JointLimitViolation(Vec<usize>),
}
