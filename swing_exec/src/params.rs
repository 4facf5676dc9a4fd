//! # Swing Executable Parameters
//!
//! This module provide parameters for the swing executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive cycle overruns after which the exec enters safe mode.
    pub max_consec_cycle_overruns: u64,

    /// Time the exec keeps running after the last scripted TC.
    ///
    /// Units: seconds
    pub script_end_delay_s: f64,

    /// Simulation of the balls thrown at the arm.
    pub ball_sim: BallSimParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallSimParams {
    /// Units: meters/second^2
    pub gravity_mss: [f64; 3],

    /// Integration step of the ball's flight.
    ///
    /// Units: seconds
    pub step_s: f64,

    /// Height below which the ball is removed from the simulation.
    ///
    /// Units: meters
    pub floor_height_m: f64,
}
