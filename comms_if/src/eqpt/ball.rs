//! # Ball State Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A snapshot of the ball's state as published by the ball estimator.
///
/// Snapshots are read-only once published, consumers always work from the most recent one.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BallState {
    /// Position of the ball in the world frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Velocity of the ball in the world frame.
    ///
    /// Units: meters/second
    pub velocity_ms: [f64; 3],

    /// Time at which the state was measured, in exec time.
    ///
    /// Units: seconds
    pub timestamp_s: f64,
}

/// Initial conditions for a ball thrown into the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallLaunch {
    /// Launch position in the world frame.
    ///
    /// Units: meters
    pub position_m: [f64; 3],

    /// Launch velocity in the world frame.
    ///
    /// Units: meters/second
    pub velocity_ms: [f64; 3],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BallState {
    /// Returns true if this snapshot is newer than `other`.
    pub fn is_newer_than(&self, other: &BallState) -> bool {
        self.timestamp_s > other.timestamp_s
    }
}
