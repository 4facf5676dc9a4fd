//! # Inverse kinematics module
//!
//! Numerical exact pose solver. Starting from a seed configuration the task
//! error is repeatedly converted into a joint update by the resolver and
//! applied, until the error falls below tolerance or the iteration budget is
//! spent.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use nalgebra::DVector;
use serde::Serialize;

// Internal
use crate::chain::{ChainConfig, ChainError, KinematicChain, LimitReport, TaskPose, TaskSpace};
use crate::resolver::{Resolution, Resolver, ResolverError, StrikeStyle};
pub use params::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Relative decrease of the residual counted as progress.
const PROGRESS_RATIO: f64 = 1e-3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Exact pose solver over a chain.
#[derive(Debug, Clone, Copy)]
pub struct IkSolver<'a> {
    chain: &'a KinematicChain,
    resolver: &'a Resolver,
    params: &'a IkinParams,
}

/// A converged solution.
#[derive(Debug, Clone, Serialize)]
pub struct IkSolution {
    pub config: ChainConfig,

    /// Number of iterations used.
    pub iterations: usize,

    /// Norm of the task error at the solution.
    pub residual: f64,

    /// Joints held at a position limit by the final update.
    pub limits: LimitReport,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during inverse kinematics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IkinError {
    #[error(
        "Exact pose solver did not converge after {iterations} iterations, \
        residual is {residual:.3e}"
    )]
    ConvergenceFailure { iterations: usize, residual: f64 },

    #[error("Resolver error: {0}")]
    ResolverError(#[from] ResolverError),

    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> IkSolver<'a> {
    pub fn new(chain: &'a KinematicChain, resolver: &'a Resolver, params: &'a IkinParams) -> Self {
        Self {
            chain,
            resolver,
            params,
        }
    }

    /// Find a configuration placing the paddle at `target` in the given task
    /// space, starting from `seed`.
    ///
    /// The style's weights and secondary objective are used on every
    /// iteration, so redundant joints settle according to the style.
    pub fn solve(
        &self,
        task: TaskSpace,
        target: &TaskPose,
        seed: &ChainConfig,
        style: &StrikeStyle,
    ) -> Result<IkSolution, IkinError> {
        let n = self.chain.num_joints();
        let weights = style.weights(n)?;
        let max_step = DVector::from_element(n, self.params.max_step_rad);

        let mut q = seed.clone();
        let mut limits = LimitReport::default();
        let mut best_residual = f64::INFINITY;
        let mut stalled_for = 0;
        let mut residual = f64::INFINITY;
        let mut iterations = 0;

        while iterations <= self.params.max_iterations {
            let pose = self.chain.forward_kinematics(&q);
            let err = task.error(&pose, target);
            residual = err.norm();

            if residual < self.params.tolerance {
                debug!(
                    "Exact pose solver converged in {} iterations (residual {:.3e})",
                    iterations, residual
                );
                return Ok(IkSolution {
                    config: q,
                    iterations,
                    residual,
                    limits,
                });
            }

            if iterations == self.params.max_iterations {
                break;
            }

            if residual < best_residual * (1.0 - PROGRESS_RATIO) {
                best_residual = residual;
                stalled_for = 0;
            } else {
                stalled_for += 1;
                if stalled_for >= self.params.stall_iterations {
                    break;
                }
            }

            let jac = task.jacobian(&self.chain.geometric_jacobian(&q), &pose);
            let z = style.secondary_term(self.chain, &q)?;

            // Each iteration is a unit time step, the step bound acts as the
            // velocity limit
            let res = self.resolver.resolve(
                &jac,
                &(err * self.params.gain),
                z.as_ref(),
                &weights,
                Some(&max_step),
            )?;
            trace!(
                "IK iteration {}: residual {:.3e}, step scale {:.3}",
                iterations,
                residual,
                res.clip_scale
            );

            let (next, report) = self.chain.config(q.as_vector() + res.qd)?;
            q = next;
            limits = report;
            iterations += 1;
        }

        debug!(
            "Exact pose solver failed after {} iterations (residual {:.3e})",
            iterations, residual
        );

        Err(IkinError::ConvergenceFailure {
            iterations,
            residual,
        })
    }

    /// Joint velocities producing the task space `twist` at configuration
    /// `q`, resolved with the style's weights and no secondary objective.
    ///
    /// The velocities are not limited, callers compare them to the joint
    /// limits to decide whether the twist is feasible.
    pub fn terminal_velocity(
        &self,
        task: TaskSpace,
        q: &ChainConfig,
        twist: &DVector<f64>,
        style: &StrikeStyle,
    ) -> Result<Resolution, IkinError> {
        let pose = self.chain.forward_kinematics(q);
        let jac = task.jacobian(&self.chain.geometric_jacobian(q), &pose);
        let weights = style.weights(self.chain.num_joints())?;

        Ok(self.resolver.resolve(&jac, twist, None, &weights, None)?)
    }
}
