//! # Swing library.
//!
//! Kinematic engine for a robotic arm swinging a paddle at a ball in flight, plus the cyclic
//! module which drives it. Modules are listed leaf first.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Kinematic chain model - joints, forward kinematics, Jacobians and task spaces
pub mod chain;

/// Jacobian solver - weighted damped pseudoinverse with null space objectives
pub mod resolver;

/// Exact pose solver - iterative inverse kinematics
pub mod ikin;

/// Hit planner - chooses where, when and how the paddle meets the ball
pub mod hit_planner;

/// Trajectory generator - joint space samples from the current state to a hit target
pub mod traj_gen;

/// Swing control - cyclic driver producing the joint demands
pub mod swing_ctrl;

/// Ball simulation - ballistic flight of simulated balls
pub mod ball_sim;

/// Global data store for the executable
pub mod data_store;

/// Executable parameters
pub mod params;

#[cfg(test)]
pub(crate) mod test_fixtures;
