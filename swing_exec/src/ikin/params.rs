//! Parameters structure for the exact pose solver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the exact pose solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IkinParams {
    /// Task error norm below which the solver has converged.
    ///
    /// Units: meters and radians
    pub tolerance: f64,

    /// Maximum number of iterations before reporting a convergence failure.
    pub max_iterations: usize,

    /// Fraction of the task error corrected on each iteration.
    pub gain: f64,

    /// Largest change of any joint in a single iteration.
    ///
    /// Units: radians or meters
    pub max_step_rad: f64,

    /// Number of iterations without a relative improvement of the residual
    /// after which the target is considered unreachable.
    pub stall_iterations: usize,
}

impl Default for IkinParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 500,
            gain: 0.5,
            max_step_rad: 0.2,
            stall_iterations: 50,
        }
    }
}
