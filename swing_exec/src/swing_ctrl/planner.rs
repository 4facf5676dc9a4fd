//! The planning pipeline shared by the inline and worker planning modes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector3;
use serde::Serialize;

// Internal
use super::SwingCtrlParams;
use crate::chain::{ChainError, KinematicChain};
use crate::hit_planner::{HitPlanner, HitPlannerError, HitRequest, HitTarget};
use crate::ikin::IkinParams;
use crate::resolver::{Resolver, StrikeStyle};
use crate::traj_gen::{TrajGen, TrajGenError, TrajGenParams, TrajStart, Trajectory};
use comms_if::eqpt::ball::BallState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Owns every stage of the planning pipeline for one arm.
pub struct Planner {
    chain: KinematicChain,
    resolver: Resolver,
    ikin_params: IkinParams,
    hit_planner: HitPlanner,
    traj_gen_params: TrajGenParams,
}

/// A request to plan a strike starting from a known arm state.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    /// Identifies the request, outcomes for superseded requests are dropped.
    pub id: u64,

    pub ball: BallState,

    /// Arm state at which the new trajectory takes over.
    pub start: TrajStart,

    pub goal_m: Vector3<f64>,

    pub style: StrikeStyle,
}

/// A planned strike, ready to be flown.
#[derive(Debug, Clone, Serialize)]
pub struct Strike {
    pub target: HitTarget,
    pub traj: Trajectory,
}

/// Result of a plan request.
#[derive(Debug)]
pub struct PlanOutcome {
    pub id: u64,

    /// Units: seconds, exec time
    pub start_time_s: f64,

    pub result: Result<Strike, PlanError>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a strike could not be planned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("Hit planning failed: {0}")]
    HitPlannerError(#[from] HitPlannerError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Planner {
    pub fn new(params: &SwingCtrlParams) -> Result<Self, ChainError> {
        Ok(Self {
            chain: KinematicChain::new(&params.chain)?,
            resolver: Resolver::new(params.resolver.clone()),
            ikin_params: params.ikin.clone(),
            hit_planner: HitPlanner::new(params.hit_planner.clone()),
            traj_gen_params: params.traj_gen.clone(),
        })
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub fn hit_planner(&self) -> &HitPlanner {
        &self.hit_planner
    }

    pub fn default_style(&self) -> &StrikeStyle {
        &self.resolver.params().default_style
    }

    /// Plan the earliest feasible strike and the trajectory flying it.
    pub fn plan_strike(&self, req: &PlanRequest) -> PlanOutcome {
        PlanOutcome {
            id: req.id,
            start_time_s: req.start.time_s,
            result: self.strike(req),
        }
    }

    /// Plan a return to the ready configuration.
    pub fn plan_idle(&self, start: &TrajStart) -> Result<Trajectory, TrajGenError> {
        self.traj_gen().generate_idle(start)
    }

    fn strike(&self, req: &PlanRequest) -> Result<Strike, PlanError> {
        let hit_req = HitRequest {
            ball: req.ball,
            start_time_s: req.start.time_s,
            seed: req.start.q.clone(),
            seed_qd: req.start.qd.clone(),
            goal_m: req.goal_m,
            style: req.style.clone(),
        };

        // A candidate whose trajectory cannot be generated is skipped
        let traj_gen = self.traj_gen();
        let (target, traj) = self.hit_planner.plan_with(
            &self.chain,
            &self.resolver,
            &self.ikin_params,
            &hit_req,
            |t| traj_gen.generate(&req.start, t),
        )?;

        debug!(
            "Plan {} ready: strike at {:.3} s, {} samples",
            req.id,
            target.time_s,
            traj.samples().len()
        );

        Ok(Strike { target, traj })
    }

    fn traj_gen(&self) -> TrajGen<'_> {
        TrajGen::new(
            &self.chain,
            &self.resolver,
            &self.ikin_params,
            &self.traj_gen_params,
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::DVector;

    const PARAMS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/swing_ctrl.toml");

    fn deployed_planner() -> Planner {
        let params: SwingCtrlParams = util::params::load_from_path(PARAMS_PATH).unwrap();
        Planner::new(&params).unwrap()
    }

    fn request_from_rest(planner: &Planner, ball: BallState, secondary_gain: f64) -> PlanRequest {
        let mut style = planner.default_style().clone();
        style.secondary_gain = secondary_gain;

        PlanRequest {
            id: 1,
            ball,
            start: TrajStart {
                time_s: 0.05,
                q: planner.chain().rest_config().clone(),
                qd: DVector::zeros(planner.chain().num_joints()),
            },
            goal_m: Vector3::new(0.0, 2.5, 0.5),
            style,
        }
    }

    fn assert_flies_to_target(planner: &Planner, strike: &Strike) {
        let chain = planner.chain();
        let traj_gen = planner.traj_gen();

        // The final sample places the paddle on the ball at the interception time
        let last = strike.traj.last().unwrap();
        assert!((last.time_s - strike.target.time_s).abs() < 1e-9);
        let pose = chain.forward_kinematics(&last.q);
        assert!(
            strike.target.task.error(&pose, &strike.target.pose).norm()
                <= planner.traj_gen_params.terminal_tolerance
        );

        assert!(traj_gen.check_continuity(&strike.traj).is_ok());
    }

    #[test]
    fn test_deployed_arm_strikes_offset_throw() {
        let planner = deployed_planner();

        // Thrown off the centre line, the earliest interceptions are too
        // close for a continuous swing and later ones must be used.
        let ball = BallState {
            position_m: [0.3, 3.0, 1.2],
            velocity_ms: [-0.4, -4.5, 2.5],
            timestamp_s: 0.0,
        };

        for gain in [0.0, planner.default_style().secondary_gain].iter() {
            let req = request_from_rest(&planner, ball, *gain);
            let outcome = planner.plan_strike(&req);
            assert_eq!(outcome.id, 1);

            let strike = outcome.result.unwrap();
            assert!(strike.target.time_s > req.start.time_s);
            assert!(planner.hit_planner().in_workspace(&strike.target.pose.position));
            assert_flies_to_target(&planner, &strike);
        }
    }

    #[test]
    fn test_deployed_arm_strikes_centre_throw() {
        let planner = deployed_planner();

        let ball = BallState {
            position_m: [0.0, 3.0, 1.0],
            velocity_ms: [0.0, -4.0, 3.0],
            timestamp_s: 0.0,
        };

        let req = request_from_rest(&planner, ball, planner.default_style().secondary_gain);
        let strike = planner.plan_strike(&req).result.unwrap();
        assert_flies_to_target(&planner, &strike);
    }
}
