//! # Equipment Interface
//!
//! This module defines the interface structures exchanged with equipment outside of the
//! executable, i.e. the ball state estimator and the joint actuator drivers.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod ball;
pub mod joint;
