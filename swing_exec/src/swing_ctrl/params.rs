//! Parameters for swing control

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::chain::ChainParams;
use crate::hit_planner::HitPlannerParams;
use crate::ikin::IkinParams;
use crate::resolver::ResolverParams;
use crate::traj_gen::TrajGenParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Where strike planning is performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanMode {
    /// Plan within the control cycle that requested it.
    Inline,

    /// Plan on a background thread, the control cycle keeps running.
    Worker,
}

/// Parameters for swing control, including the arm description and the
/// parameters of every stage of the planning pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingCtrlParams {
    pub chain: ChainParams,

    #[serde(default)]
    pub resolver: ResolverParams,

    #[serde(default)]
    pub ikin: IkinParams,

    pub hit_planner: HitPlannerParams,

    #[serde(default)]
    pub traj_gen: TrajGenParams,

    pub plan_mode: PlanMode,

    /// Time between a plan being requested and the new trajectory taking
    /// over. Must cover the planning time in worker mode.
    ///
    /// Units: seconds
    pub plan_lead_s: f64,

    /// Replan when the predicted interception time moves by more than this.
    ///
    /// Units: seconds
    pub replan_time_drift_s: f64,

    /// Replan when the predicted interception point moves by more than this.
    ///
    /// Units: meters
    pub replan_pos_drift_m: f64,

    /// After a failed plan no new plan is requested for this long, however
    /// far the intercept moves.
    ///
    /// Units: seconds
    pub replan_backoff_s: f64,

    /// Number of consecutive late plans after which an alert is raised.
    pub max_consec_deadline_misses: usize,

    /// Save every accepted strike to the session directory.
    #[serde(default)]
    pub save_strikes: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwingCtrlParams {
    /// Check the values which cannot be checked by the modules themselves.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.plan_lead_s >= 0.0) {
            return Err(format!("plan_lead_s must not be negative (got {})", self.plan_lead_s));
        }
        if !(self.replan_time_drift_s > 0.0) || !(self.replan_pos_drift_m > 0.0) {
            return Err("replan drift thresholds must be positive".into());
        }
        if !(self.replan_backoff_s >= 0.0) {
            return Err(format!(
                "replan_backoff_s must not be negative (got {})",
                self.replan_backoff_s
            ));
        }
        if !(self.traj_gen.sample_period_s > 0.0) {
            return Err("traj_gen.sample_period_s must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::KinematicChain;
    use crate::swing_ctrl::SwingCtrl;
    use nalgebra::{DVector, Vector3};

    const PARAMS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/swing_ctrl.toml");

    #[test]
    fn test_load_params_file() {
        let params: SwingCtrlParams = util::params::load_from_path(PARAMS_PATH).unwrap();
        assert!(params.validate().is_ok());
        assert_eq!(params.chain.joints.len(), 7);
        assert_eq!(params.plan_mode, PlanMode::Worker);

        let chain = KinematicChain::new(&params.chain).unwrap();

        // Straight up at zero
        let (zero, report) = chain.config(DVector::zeros(7)).unwrap();
        assert!(report.is_clear());
        let pose = chain.forward_kinematics(&zero);
        assert!((pose.position - Vector3::new(0.0, 0.0, 1.266)).norm() < 1e-9);

        // Ready pose has the paddle facing +y at 45 degrees
        let pose = chain.forward_kinematics(chain.rest_config());
        assert!((pose.position - Vector3::new(0.0, 0.0891, 0.9948)).norm() < 1e-3);
        let n = pose.normal();
        assert!((n.into_inner() - Vector3::new(0.0, 0.7071, 0.7071)).norm() < 1e-3);

        assert!(SwingCtrl::new(params).is_ok());
    }

    #[test]
    fn test_validate() {
        let mut params: SwingCtrlParams = util::params::load_from_path(PARAMS_PATH).unwrap();
        params.plan_lead_s = -0.1;
        assert!(params.validate().is_err());

        params.plan_lead_s = 0.0;
        params.replan_pos_drift_m = 0.0;
        assert!(params.validate().is_err());

        params.replan_pos_drift_m = 0.03;
        params.replan_backoff_s = f64::NAN;
        assert!(params.validate().is_err());

        params.replan_backoff_s = 0.0;
        assert!(params.validate().is_ok());
    }
}
