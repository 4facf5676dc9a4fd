//! Parameters structure for the hit planner

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::chain::TaskSpace;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the hit planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitPlannerParams {
    // ---- BALL PREDICTION ----
    /// Gravitational acceleration in the world frame.
    ///
    /// Units: meters/second^2
    pub gravity_mss: [f64; 3],

    /// Integration step of the ball prediction.
    ///
    /// Units: seconds
    pub prediction_step_s: f64,

    /// How far ahead of the ball snapshot interceptions are searched for.
    ///
    /// Units: seconds
    pub lookahead_horizon_s: f64,

    // ---- WORKSPACE ----
    /// Centre of the spherical region the paddle can reach comfortably.
    ///
    /// Units: meters
    pub workspace_centre_m: [f64; 3],

    /// Radius of the workspace sphere.
    ///
    /// Units: meters
    pub workspace_radius_m: f64,

    /// Fraction of the radius in which interceptions are accepted.
    pub workspace_margin: f64,

    /// Interceptions below this height are rejected.
    ///
    /// Units: meters
    pub min_height_m: f64,

    // ---- CANDIDATE SELECTION ----
    /// Only every `candidate_stride`th predicted sample inside the workspace
    /// is tried.
    pub candidate_stride: usize,

    /// Minimum time between the start of the swing and the interception.
    ///
    /// Units: seconds
    pub min_lead_time_s: f64,

    /// Directions of the paddle pose constrained at impact.
    pub task_space: TaskSpace,

    // ---- IMPACT ----
    /// Desired flight time of the ball from impact to the goal.
    ///
    /// Units: seconds
    pub return_flight_time_s: f64,

    /// Point the ball is returned to unless a goal is commanded.
    ///
    /// Units: meters
    pub default_goal_m: [f64; 3],

    /// Largest paddle speed allowed along the free impact axis.
    ///
    /// Units: meters/second
    pub free_speed_max_ms: f64,

    /// Number of free speeds evaluated across the allowed range.
    pub free_speed_samples: usize,
}
