//! Parameters structure for the trajectory generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// How strike trajectories are generated. Chosen once per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrajStrategy {
    /// Solve the exact pose at a few waypoints and interpolate in joint space.
    Waypoint,

    /// Resolve a task space velocity at every sample and integrate it.
    VelocityIntegration,
}

/// Parameters for the trajectory generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajGenParams {
    pub strategy: TrajStrategy,

    /// Time between consecutive samples.
    ///
    /// Units: seconds
    pub sample_period_s: f64,

    /// Number of waypoints between the start and the hit pose, waypoint
    /// strategy only.
    pub num_intermediate_waypoints: usize,

    /// Gain of the task space error feedback, velocity integration only.
    ///
    /// Units: 1/second
    pub tracking_gain: f64,

    /// Largest task error allowed at the final sample.
    ///
    /// Units: meters and radians
    pub terminal_tolerance: f64,

    /// Time allowed to return to the ready configuration. Extended if the
    /// joint velocity limits require it.
    ///
    /// Units: seconds
    pub idle_return_time_s: f64,

    /// Allowance added to the velocity limited step in the continuity check.
    ///
    /// Units: radians or meters
    pub continuity_margin: f64,
}

impl Default for TrajGenParams {
    fn default() -> Self {
        Self {
            strategy: TrajStrategy::Waypoint,
            sample_period_s: 0.01,
            num_intermediate_waypoints: 3,
            tracking_gain: 20.0,
            terminal_tolerance: 1e-3,
            idle_return_time_s: 1.5,
            continuity_margin: 1e-6,
        }
    }
}
