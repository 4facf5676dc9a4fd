//! # Swing control module
//!
//! Cyclic driver of the arm. Each cycle swing control takes the latest ball
//! snapshot and any operator command, decides whether a new strike must be
//! planned, and outputs exactly one set of joint demands.
//!
//! Planning can run inline in the control cycle or on a background worker
//! thread. Either way a new trajectory only takes over from the current one
//! at the planned start time, which is the time of the request plus the plan
//! lead time. A plan which arrives after its start time is discarded.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod planner;
mod state;
mod worker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use planner::*;
pub use state::*;

use crate::chain::ChainError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while setting up swing control.
#[derive(Debug, thiserror::Error)]
pub enum SwingCtrlError {
    #[error("Invalid arm description: {0}")]
    ChainError(#[from] ChainError),

    #[error("Invalid swing control parameters: {0}")]
    InvalidParams(String),

    #[error("Could not start the planning worker: {0}")]
    WorkerSpawnError(std::io::Error),

    #[error("The planning worker panicked")]
    WorkerPanicked,
}
