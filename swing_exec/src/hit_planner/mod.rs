//! # Hit planner module
//!
//! Chooses when and how the paddle strikes the ball. The ball's flight is
//! predicted from the latest snapshot, and every predicted sample inside the
//! reachable workspace is a candidate interception, earliest first. For each
//! candidate the impact conditions give the paddle pose and velocity, the
//! exact pose solver finds the joint configuration, and the candidate is
//! accepted if the joint velocities needed both at impact and on the way
//! there are within the limits.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod impact;
mod params;
mod predictor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use nalgebra::{DVector, Unit, Vector3};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;

// Internal
pub use impact::*;
pub use params::*;
pub use predictor::*;

use crate::chain::{ChainConfig, ChainError, KinematicChain, TaskPose, TaskSpace};
use crate::ikin::{IkSolver, IkinError, IkinParams};
use crate::resolver::{Resolver, ResolverError, StrikeStyle};
use comms_if::eqpt::ball::BallState;
use util::maths::cubic_hermite_peak_speed;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Hit planner.
pub struct HitPlanner {
    params: HitPlannerParams,

    predictor: Box<dyn BallPredictor + Send>,
}

/// Everything needed to plan a strike.
#[derive(Debug, Clone)]
pub struct HitRequest {
    /// Latest ball snapshot.
    pub ball: BallState,

    /// Time at which the swing will start.
    ///
    /// Units: seconds, exec time
    pub start_time_s: f64,

    /// Arm configuration at the start of the swing.
    pub seed: ChainConfig,

    /// Joint velocities at the start of the swing.
    pub seed_qd: DVector<f64>,

    /// Point the ball should be returned to.
    ///
    /// Units: meters
    pub goal_m: Vector3<f64>,

    pub style: StrikeStyle,
}

/// The velocity component left free at impact and the value chosen for it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FreeVelocity {
    pub axis: Unit<Vector3<f64>>,

    /// Units: meters/second
    pub min_ms: f64,

    /// Units: meters/second
    pub max_ms: f64,

    /// Units: meters/second
    pub chosen_ms: f64,
}

/// A planned interception of the ball.
///
/// Targets are never modified, a new prediction produces a new target.
#[derive(Debug, Clone, Serialize)]
pub struct HitTarget {
    /// Interception time.
    ///
    /// Units: seconds, exec time
    pub time_s: f64,

    /// Paddle pose at impact.
    pub pose: TaskPose,

    /// Directions of `pose` which are constrained.
    pub task: TaskSpace,

    /// Paddle linear velocity at impact, including the free component.
    ///
    /// Units: meters/second
    pub paddle_velocity: Vector3<f64>,

    pub free_velocity: FreeVelocity,

    /// Units: meters/second
    pub ball_velocity_in: Vector3<f64>,

    /// Units: meters/second
    pub ball_velocity_out: Vector3<f64>,

    /// Style used to resolve the strike.
    pub style: StrikeStyle,

    /// Arm configuration at impact.
    pub q: ChainConfig,

    /// Joint velocities at impact.
    pub qd: DVector<f64>,
}

/// First predicted entry of the ball into the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Intercept {
    /// Units: seconds, exec time
    pub time_s: f64,

    /// Units: meters
    pub position: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during hit planning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HitPlannerError {
    #[error(
        "No feasible interception within {horizon_s} s of the ball snapshot \
        ({candidates} candidates tried)"
    )]
    NoFeasibleIntercept { horizon_s: f64, candidates: usize },

    #[error("Resolver error: {0}")]
    ResolverError(#[from] ResolverError),

    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HitPlanner {
    /// Create a planner using ballistic prediction.
    pub fn new(params: HitPlannerParams) -> Self {
        let predictor = BallisticPredictor::new(params.gravity_mss, params.prediction_step_s);

        Self::with_predictor(params, Box::new(predictor))
    }

    pub fn with_predictor(params: HitPlannerParams, predictor: Box<dyn BallPredictor + Send>) -> Self {
        Self { params, predictor }
    }

    pub fn params(&self) -> &HitPlannerParams {
        &self.params
    }

    /// True if `position` is inside the accepted part of the workspace.
    pub fn in_workspace(&self, position: &Vector3<f64>) -> bool {
        let centre = Vector3::from(self.params.workspace_centre_m);

        (position - centre).norm() < self.params.workspace_radius_m * self.params.workspace_margin
            && position.z > self.params.min_height_m
    }

    /// Predict where the ball first enters the workspace after the lead time,
    /// without solving for the arm.
    pub fn predict_intercept(&self, ball: &BallState, start_time_s: f64) -> Option<Intercept> {
        self.candidates(ball, start_time_s)
            .into_iter()
            .next()
            .map(|s| Intercept {
                time_s: s.time_s,
                position: s.position,
            })
    }

    /// Plan the earliest feasible strike.
    pub fn plan(
        &self,
        chain: &KinematicChain,
        resolver: &Resolver,
        ikin_params: &IkinParams,
        req: &HitRequest,
    ) -> Result<HitTarget, HitPlannerError> {
        self.plan_with(chain, resolver, ikin_params, req, |_| Ok::<(), Infallible>(()))
            .map(|(target, _)| target)
    }

    /// Plan the earliest strike which is feasible and which `fly` accepts.
    ///
    /// `fly` is called on every candidate which passes the kinematic checks,
    /// usually to generate the trajectory to it. A candidate `fly` rejects is
    /// skipped and the search continues with the next interception time.
    pub fn plan_with<T, E, F>(
        &self,
        chain: &KinematicChain,
        resolver: &Resolver,
        ikin_params: &IkinParams,
        req: &HitRequest,
        mut fly: F,
    ) -> Result<(HitTarget, T), HitPlannerError>
    where
        E: fmt::Display,
        F: FnMut(&HitTarget) -> Result<T, E>,
    {
        let solver = IkSolver::new(chain, resolver, ikin_params);

        let candidates = self.candidates(&req.ball, req.start_time_s);
        let num_candidates = candidates.len();

        for sample in candidates {
            let target = match self.evaluate(chain, &solver, req, &sample)? {
                Some(t) => t,
                None => continue,
            };

            match fly(&target) {
                Ok(flown) => {
                    info!(
                        "Hit planned at t = {:.3} s, p = [{:.3}, {:.3}, {:.3}]",
                        target.time_s,
                        target.pose.position.x,
                        target.pose.position.y,
                        target.pose.position.z
                    );
                    return Ok((target, flown));
                }
                Err(e) => {
                    debug!("Candidate at t = {:.3} s cannot be flown: {}", sample.time_s, e);
                }
            }
        }

        Err(HitPlannerError::NoFeasibleIntercept {
            horizon_s: self.params.lookahead_horizon_s,
            candidates: num_candidates,
        })
    }

    /// Check a single candidate, returning the hit target if the arm can
    /// reach it in time.
    fn evaluate(
        &self,
        chain: &KinematicChain,
        solver: &IkSolver,
        req: &HitRequest,
        sample: &BallSample,
    ) -> Result<Option<HitTarget>, HitPlannerError> {
        let gravity = Vector3::from(self.params.gravity_mss);
        let task = self.params.task_space;
        let max_vel = chain.max_vel();

        let ic = match impact_conditions(
            &sample.position,
            &sample.velocity,
            &req.goal_m,
            &gravity,
            self.params.return_flight_time_s,
        ) {
            Some(ic) => ic,
            None => {
                debug!("No impact normal at t = {:.3} s", sample.time_s);
                return Ok(None);
            }
        };

        let pose = TaskPose::new(sample.position, ic.rotation);

        let sol = match solver.solve(task, &pose, &req.seed, &req.style) {
            Ok(s) => s,
            Err(IkinError::ConvergenceFailure { residual, .. }) => {
                debug!(
                    "Candidate at t = {:.3} s unreachable (residual {:.3e})",
                    sample.time_s, residual
                );
                return Ok(None);
            }
            Err(IkinError::ResolverError(e)) => return Err(e.into()),
            Err(IkinError::ChainError(e)) => return Err(e.into()),
        };

        if !sol.limits.is_clear() {
            debug!(
                "Candidate at t = {:.3} s needs joint(s) {:?} beyond their limits",
                sample.time_s, sol.limits.pos_limited
            );
            return Ok(None);
        }

        // Choose the free speed needing the least joint velocity
        let normal = ic.rotation * Vector3::z();
        let mut best: Option<(f64, f64, DVector<f64>)> = None;
        for free_ms in self.free_speeds() {
            let linear = normal * ic.normal_speed_ms + ic.free_axis.into_inner() * free_ms;
            let twist = task.twist(&linear, &Vector3::zeros(), &pose);
            let res = solver.terminal_velocity(task, &sol.config, &twist, &req.style);
            let qd = match res {
                Ok(r) => r.qd,
                Err(IkinError::ResolverError(e)) => return Err(e.into()),
                Err(IkinError::ChainError(e)) => return Err(e.into()),
                Err(IkinError::ConvergenceFailure { .. }) => continue,
            };

            let peak = normalised_peak(&qd, &max_vel);
            let better = best
                .as_ref()
                .map(|(p, _, _)| OrderedFloat(peak) < OrderedFloat(*p))
                .unwrap_or(true);
            if better {
                best = Some((peak, free_ms, qd));
            }
        }

        let (peak, free_ms, qd) = match best {
            Some(b) => b,
            None => return Ok(None),
        };

        if peak > 1.0 {
            debug!(
                "Candidate at t = {:.3} s needs {:.2} times the joint velocity limit at impact",
                sample.time_s, peak
            );
            return Ok(None);
        }

        // Check the swing itself can be flown
        let duration = sample.time_s - req.start_time_s;
        let delta = chain.joint_delta(&req.seed, &sol.config);
        let swing_peak = (0..chain.num_joints())
            .map(|i| {
                cubic_hermite_peak_speed(0.0, req.seed_qd[i], delta[i], qd[i], duration)
                    / max_vel[i]
            })
            .max_by_key(|v| OrderedFloat(*v))
            .unwrap_or(0.0);

        if swing_peak > 1.0 {
            debug!(
                "Candidate at t = {:.3} s needs {:.2} times the joint velocity limit to reach",
                sample.time_s, swing_peak
            );
            return Ok(None);
        }

        debug!(
            "Candidate at t = {:.3} s reachable (IK in {} iterations)",
            sample.time_s, sol.iterations
        );

        Ok(Some(HitTarget {
            time_s: sample.time_s,
            pose,
            task,
            paddle_velocity: normal * ic.normal_speed_ms + ic.free_axis.into_inner() * free_ms,
            free_velocity: FreeVelocity {
                axis: ic.free_axis,
                min_ms: -self.params.free_speed_max_ms,
                max_ms: self.params.free_speed_max_ms,
                chosen_ms: free_ms,
            },
            ball_velocity_in: sample.velocity,
            ball_velocity_out: ic.ball_velocity_out,
            style: req.style.clone(),
            q: sol.config,
            qd,
        }))
    }

    /// Predicted samples which could be struck, earliest first.
    fn candidates(&self, ball: &BallState, start_time_s: f64) -> Vec<BallSample> {
        let earliest_s = start_time_s + self.params.min_lead_time_s;
        let stride = self.params.candidate_stride.max(1);

        self.predictor
            .predict(ball, self.params.lookahead_horizon_s)
            .into_iter()
            .filter(|s| s.time_s >= earliest_s && self.in_workspace(&s.position))
            .step_by(stride)
            .collect()
    }

    /// Free speeds evaluated, evenly spread across the allowed range.
    fn free_speeds(&self) -> Vec<f64> {
        let n = self.params.free_speed_samples;
        let max = self.params.free_speed_max_ms;

        if n <= 1 || max == 0.0 {
            return vec![0.0];
        }

        (0..n)
            .map(|i| -max + 2.0 * max * (i as f64) / ((n - 1) as f64))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Largest joint velocity as a fraction of the joint's limit.
pub fn normalised_peak(qd: &DVector<f64>, max_vel: &DVector<f64>) -> f64 {
    qd.iter()
        .zip(max_vel.iter())
        .map(|(v, m)| v.abs() / m)
        .fold(0.0, f64::max)
}
