//! # Communications interface crate.
//!
//! Provides all common interfaces between the swing executable and the outside world: ball state
//! snapshots coming in, joint demands going out, and the telecommands used to drive the exec.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Data definitions for equipment (the ball tracker and the arm actuators)
pub mod eqpt;
