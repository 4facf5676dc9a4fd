//! Arms and parameters shared by the tests of several modules.

use crate::chain::{ChainParams, JointDesc, JointLimits, JointType, KinematicChain, Origin, TaskSpace};
use crate::hit_planner::HitPlannerParams;
use crate::ikin::IkinParams;
use crate::resolver::ResolverParams;
use crate::swing_ctrl::{PlanMode, SwingCtrlParams};
use crate::traj_gen::TrajGenParams;

/// A 4 joint arm: base yaw then three pitch joints, reaching about 0.85 m
/// from a shoulder 0.3 m above the base.
pub fn spatial_arm_params() -> ChainParams {
    let joint = |name: &str, xyz_m: [f64; 3], axis: [f64; 3]| JointDesc {
        name: name.into(),
        joint_type: JointType::Revolute,
        origin: Origin {
            xyz_m,
            rpy_rad: [0.0; 3],
        },
        axis,
        limits: JointLimits {
            min_pos: -3.0,
            max_pos: 3.0,
            max_vel: 10.0,
        },
    };

    ChainParams {
        joints: vec![
            joint("base_yaw", [0.0, 0.0, 0.3], [0.0, 0.0, 1.0]),
            joint("shoulder", [0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            joint("elbow", [0.4, 0.0, 0.0], [0.0, 1.0, 0.0]),
            joint("wrist", [0.35, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ],
        tool: Origin {
            xyz_m: [0.1, 0.0, 0.0],
            rpy_rad: [0.0; 3],
        },
        rest_pos: vec![0.0, -0.5, 1.0, 0.5],
    }
}

pub fn spatial_arm() -> KinematicChain {
    KinematicChain::new(&spatial_arm_params()).unwrap()
}

/// Hit planner for the spatial arm, striking in a small sphere in front of
/// it with position only control.
pub fn hit_planner_params() -> HitPlannerParams {
    HitPlannerParams {
        gravity_mss: [0.0, 0.0, -9.82],
        prediction_step_s: 0.01,
        lookahead_horizon_s: 3.0,
        workspace_centre_m: [0.5, 0.0, 0.4],
        workspace_radius_m: 0.25,
        workspace_margin: 0.9,
        min_height_m: 0.0,
        candidate_stride: 1,
        min_lead_time_s: 0.1,
        task_space: TaskSpace::Position,
        return_flight_time_s: 0.5,
        default_goal_m: [0.0, -2.0, 0.5],
        free_speed_max_ms: 0.5,
        free_speed_samples: 5,
    }
}

/// Inline swing control of the spatial arm.
pub fn swing_ctrl_params() -> SwingCtrlParams {
    SwingCtrlParams {
        chain: spatial_arm_params(),
        resolver: ResolverParams::default(),
        ikin: IkinParams::default(),
        hit_planner: hit_planner_params(),
        traj_gen: TrajGenParams::default(),
        plan_mode: PlanMode::Inline,
        plan_lead_s: 0.02,
        replan_time_drift_s: 0.05,
        replan_pos_drift_m: 0.05,
        replan_backoff_s: 0.1,
        max_consec_deadline_misses: 3,
        save_strikes: false,
    }
}
