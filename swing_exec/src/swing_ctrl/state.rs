//! Implementations for the SwingCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use nalgebra::{DVector, Vector3};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{
    worker::Worker, PlanError, PlanMode, PlanOutcome, PlanRequest, Planner, SwingCtrlError,
    SwingCtrlParams,
};
use crate::chain::ChainConfig;
use crate::hit_planner::{HitPlannerError, HitTarget, Intercept};
use crate::resolver::StrikeStyle;
use crate::traj_gen::{TrajKind, TrajStart, Trajectory};
use comms_if::{
    eqpt::{ball::BallState, joint::JointDems},
    tc::swing_ctrl::SwingCmd,
};
use util::{module::State, session::{self, Session}};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Largest joint jump allowed between the current trajectory and the start
/// of a new one.
const SPLICE_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Swing control module state
pub struct SwingCtrl {
    params: SwingCtrlParams,

    planner: Planner,

    worker: Option<Worker>,

    /// Trajectory currently being flown.
    traj: Option<Trajectory>,

    /// The strike the current trajectory ends in.
    active: Option<ActiveStrike>,

    /// Request waiting for an outcome.
    pending: Option<PendingPlan>,

    /// The last request which could not be planned.
    failed: Option<FailedPlan>,

    last_ball: Option<BallState>,

    /// Last commanded position, held when there is nothing to fly.
    hold: ChainConfig,

    goal_m: Vector3<f64>,

    style: StrikeStyle,

    stopped: bool,

    next_plan_id: u64,

    consec_deadline_misses: usize,

    report: StatusReport,
}

struct ActiveStrike {
    target: HitTarget,

    /// Intercept predicted when the strike was requested.
    intercept: Intercept,
}

struct FailedPlan {
    intercept: Intercept,

    /// No new plan is requested before this time.
    ///
    /// Units: seconds, exec time
    retry_s: f64,
}

struct PendingPlan {
    id: u64,
    intercept: Intercept,
}

/// Input data to swing control.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Units: seconds, exec time
    pub time_s: f64,

    /// Latest ball snapshot, or `None` if there is no new snapshot this
    /// cycle.
    pub ball: Option<BallState>,

    /// Command to execute this cycle.
    pub cmd: Option<SwingCmd>,

    /// In safe mode the arm holds still and nothing is planned.
    pub safe: bool,
}

/// What the arm is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwingMode {
    /// Holding the last commanded position.
    Holding,

    /// Flying a strike trajectory.
    Striking,

    /// Returning to the ready configuration.
    Returning,

    /// Stopped by command or safe mode.
    Stopped,
}

/// User visible failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwingAlert {
    /// The ball cannot be struck, the arm holds.
    NoFeasibleIntercept,

    /// A strike was found but could not be flown, the previous trajectory is
    /// kept.
    PlanFailed,

    /// Too many plans in a row arrived after their start time.
    PlanningDeadlineMissed,
}

/// Status report for SwingCtrl processing.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub mode: SwingMode,

    /// A plan was requested this cycle.
    pub plan_requested: bool,

    /// A new strike trajectory was accepted this cycle.
    pub new_strike: bool,

    /// A plan arrived after its start time this cycle and was discarded.
    pub deadline_missed: bool,

    pub consec_deadline_misses: usize,

    /// The command given this cycle was invalid and ignored.
    pub cmd_rejected: bool,

    /// Strike time of the active strike.
    ///
    /// Units: seconds, exec time
    pub strike_time_s: Option<f64>,

    /// Outgoing ball velocity of a strike which was completed this cycle.
    ///
    /// Units: meters/second
    pub struck_ball_velocity_ms: Option<[f64; 3]>,

    pub alert: Option<SwingAlert>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            mode: SwingMode::Holding,
            plan_requested: false,
            new_strike: false,
            deadline_missed: false,
            consec_deadline_misses: 0,
            cmd_rejected: false,
            strike_time_s: None,
            struck_ball_velocity_ms: None,
            alert: None,
        }
    }
}

impl State for SwingCtrl {
    type InitData = ();
    type InitError = SwingCtrlError;

    type InputData = InputData;
    type OutputData = JointDems;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the SwingCtrl module.
    ///
    /// The pipeline is built by `SwingCtrl::new`, this starts the planning
    /// worker if one is needed.
    fn init(&mut self, _init_data: Self::InitData, session: &Session) -> Result<(), Self::InitError> {
        if self.params.plan_mode == PlanMode::Worker {
            self.start_worker()?;
        }

        if self.params.save_strikes {
            info!(
                "Strikes will be saved in {:?}",
                session.session_root.join("swing_ctrl")
            );
        }

        Ok(())
    }

    /// Perform cyclic processing of swing control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let time_s = input_data.time_s;

        // Clear the status report
        self.report = StatusReport::default();

        if let Some(ref cmd) = input_data.cmd {
            self.exec_cmd(cmd, time_s);
        }

        if input_data.safe && (self.traj.is_some() || self.pending.is_some()) {
            warn!("Safe mode, discarding the current swing");
            self.discard();
        }

        // Collect plans from the worker
        let outcomes = match self.worker {
            Some(ref w) => w.outcomes(),
            None => Vec::new(),
        };
        for outcome in outcomes {
            self.accept(outcome, time_s);
        }

        // Check the latest ball against the plan
        if !(input_data.safe || self.stopped) {
            if let Some(ball) = input_data.ball {
                let is_new = self
                    .last_ball
                    .map(|b| ball.is_newer_than(&b))
                    .unwrap_or(true);

                if is_new {
                    self.last_ball = Some(ball);
                    self.update_plan(&ball, time_s);
                }
            }
        }

        self.check_strike_complete(time_s);

        // Output a sample of the trajectory, or hold
        let sample = match self.traj {
            Some(ref t) => t.sample_at(self.planner.chain(), time_s),
            None => None,
        };
        let output = match sample {
            Some(s) => {
                let dems = JointDems {
                    pos_rad: s.q.to_vec(),
                    speed_rads: s.qd.iter().copied().collect(),
                };
                self.hold = s.q;
                dems
            }
            None => JointDems::hold(self.hold.as_slice()),
        };

        self.report.mode = self.mode(time_s, input_data.safe);
        self.report.consec_deadline_misses = self.consec_deadline_misses;
        self.report.strike_time_s = self.active.as_ref().map(|a| a.target.time_s);

        trace!(
            "SwingCtrl output at {:.3} s:\n    pos: {:?}\n    speed: {:?}",
            time_s,
            output.pos_rad,
            output.speed_rads
        );

        Ok((output, self.report.clone()))
    }
}

impl SwingCtrl {
    /// Build swing control from its parameters.
    ///
    /// The arm starts holding its ready configuration.
    pub fn new(params: SwingCtrlParams) -> Result<Self, SwingCtrlError> {
        params.validate().map_err(SwingCtrlError::InvalidParams)?;

        let planner = Planner::new(&params)?;
        let hold = planner.chain().rest_config().clone();
        let goal_m = Vector3::from(params.hit_planner.default_goal_m);
        let style = planner.default_style().clone();

        Ok(Self {
            params,
            planner,
            worker: None,
            traj: None,
            active: None,
            pending: None,
            failed: None,
            last_ball: None,
            hold,
            goal_m,
            style,
            stopped: false,
            next_plan_id: 0,
            consec_deadline_misses: 0,
            report: StatusReport::default(),
        })
    }

    /// Start planning on a background thread. The worker gets its own copy
    /// of the pipeline.
    pub fn start_worker(&mut self) -> Result<(), SwingCtrlError> {
        if self.worker.is_none() {
            self.worker = Some(Worker::spawn(Planner::new(&self.params)?)?);
            info!("SwingCtrl planning worker started");
        }

        Ok(())
    }

    /// Stop the planning worker, if one is running.
    pub fn stop_worker(&mut self) -> Result<(), SwingCtrlError> {
        match self.worker.take() {
            Some(mut w) => w.stop(),
            None => Ok(()),
        }
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The trajectory currently being flown.
    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.traj.as_ref()
    }

    /// The strike the arm is currently flying towards.
    pub fn active_target(&self) -> Option<&HitTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    /// The style used for the next plan.
    pub fn style(&self) -> &StrikeStyle {
        &self.style
    }

    fn exec_cmd(&mut self, cmd: &SwingCmd, time_s: f64) {
        let num_joints = self.planner.chain().num_joints();

        match cmd {
            SwingCmd::Stop => {
                info!("Stop commanded");
                self.stopped = true;
                self.discard();
            }
            SwingCmd::Resume => {
                info!("Resume commanded");
                self.stopped = false;
                self.failed = None;
            }
            SwingCmd::ReturnIdle => {
                info!("Return to idle commanded");
                self.active = None;
                self.pending = None;
                let start = self.state_at(time_s);
                self.start_idle(&start);
            }
            SwingCmd::SetGoal { goal_m } => {
                if goal_m.iter().all(|v| v.is_finite()) {
                    info!("Return goal set to {:?}", goal_m);
                    self.goal_m = Vector3::from(*goal_m);
                } else {
                    self.reject_cmd(cmd);
                }
            }
            SwingCmd::SetSecondaryGain { gain } => {
                if gain.is_finite() && *gain >= 0.0 {
                    info!("Secondary objective gain set to {}", gain);
                    self.style.secondary_gain = *gain;
                } else {
                    self.reject_cmd(cmd);
                }
            }
            SwingCmd::SetJointWeights { weights } => {
                if weights.len() == num_joints && weights.iter().all(|w| w.is_finite() && *w > 0.0)
                {
                    info!("Joint weights set to {:?}", weights);
                    self.style.joint_weights = Some(weights.clone());
                } else {
                    self.reject_cmd(cmd);
                }
            }
        }
    }

    fn reject_cmd(&mut self, cmd: &SwingCmd) {
        warn!("Invalid swing command rejected: {:?}", cmd);
        self.report.cmd_rejected = true;
    }

    /// Request a new plan if the ball is not covered by the current one.
    fn update_plan(&mut self, ball: &BallState, time_s: f64) {
        if self.pending.is_some() {
            return;
        }

        let start_time_s = time_s + self.params.plan_lead_s;
        let intercept = match self
            .planner
            .hit_planner()
            .predict_intercept(ball, start_time_s)
        {
            Some(i) => i,
            None => {
                self.failed = None;
                return;
            }
        };

        let min_lead_s = self.planner.hit_planner().params().min_lead_time_s;
        let needs_plan = match (&self.active, &self.failed) {
            // Too close to the strike to change it
            (Some(a), _) if a.target.time_s < start_time_s + min_lead_s => false,
            (_, Some(f)) if time_s < f.retry_s => false,
            // Drift is measured from the last attempt
            (_, Some(f)) => self.drifted(&f.intercept, &intercept),
            (Some(a), None) => self.drifted(&a.intercept, &intercept),
            (None, None) => true,
        };

        if needs_plan {
            self.request_plan(ball, start_time_s, intercept, time_s);
        }
    }

    fn drifted(&self, old: &Intercept, new: &Intercept) -> bool {
        let time_drift_s = (old.time_s - new.time_s).abs();
        let pos_drift_m = (old.position - new.position).norm();

        if time_drift_s > self.params.replan_time_drift_s
            || pos_drift_m > self.params.replan_pos_drift_m
        {
            debug!(
                "Intercept drifted by {:.3} s, {:.3} m",
                time_drift_s, pos_drift_m
            );
            true
        } else {
            false
        }
    }

    fn request_plan(
        &mut self,
        ball: &BallState,
        start_time_s: f64,
        intercept: Intercept,
        time_s: f64,
    ) {
        let req = PlanRequest {
            id: self.next_plan_id,
            ball: *ball,
            start: self.state_at(start_time_s),
            goal_m: self.goal_m,
            style: self.style.clone(),
        };
        self.next_plan_id += 1;

        debug!(
            "Requesting plan {} starting at {:.3} s, intercept expected at {:.3} s",
            req.id, start_time_s, intercept.time_s
        );

        self.report.plan_requested = true;
        self.pending = Some(PendingPlan {
            id: req.id,
            intercept,
        });

        match self.worker {
            Some(ref w) => {
                if !w.request(req) {
                    self.pending = None;
                }
            }
            None => {
                let outcome = self.planner.plan_strike(&req);
                self.accept(outcome, time_s);
            }
        }
    }

    /// Handle the outcome of a plan request.
    fn accept(&mut self, outcome: PlanOutcome, time_s: f64) {
        let pending = match self.pending.take() {
            Some(p) if p.id == outcome.id => p,
            other => {
                debug!("Dropping outcome of superseded plan {}", outcome.id);
                self.pending = other;
                return;
            }
        };

        if time_s > outcome.start_time_s {
            self.consec_deadline_misses += 1;
            self.report.deadline_missed = true;
            warn!(
                "Plan {} arrived {:.3} s after its start time and was discarded",
                outcome.id,
                time_s - outcome.start_time_s
            );

            if self.consec_deadline_misses >= self.params.max_consec_deadline_misses {
                error!(
                    "{} plans in a row missed their start time, increase the plan lead time",
                    self.consec_deadline_misses
                );
                self.report.alert = Some(SwingAlert::PlanningDeadlineMissed);
            }
            return;
        }
        self.consec_deadline_misses = 0;

        match outcome.result {
            Ok(strike) => {
                // The new trajectory must start where the current one will be
                let current = self.state_at(outcome.start_time_s);
                let jump = strike
                    .traj
                    .first()
                    .map(|s| {
                        self.planner
                            .chain()
                            .joint_delta(&current.q, &s.q)
                            .amax()
                    })
                    .unwrap_or(f64::INFINITY);
                if jump > SPLICE_TOLERANCE {
                    warn!(
                        "Plan {} no longer starts from the current trajectory ({:.3e} away), \
                        discarded",
                        outcome.id, jump
                    );
                    return;
                }

                info!(
                    "New strike at {:.3} s, swing starts at {:.3} s",
                    strike.target.time_s, outcome.start_time_s
                );

                if self.params.save_strikes {
                    session::save_with_timestamp("swing_ctrl/strike.json", strike.clone());
                }

                self.traj = Some(match self.traj.take() {
                    Some(old) => old.splice(strike.traj, outcome.start_time_s),
                    None => strike.traj,
                });
                self.active = Some(ActiveStrike {
                    target: strike.target,
                    intercept: pending.intercept,
                });
                self.failed = None;
                self.report.new_strike = true;
            }
            Err(PlanError::HitPlannerError(e @ HitPlannerError::NoFeasibleIntercept { .. })) => {
                error!("Cannot strike the ball: {}", e);
                self.discard();
                self.fail(pending.intercept, time_s);
                self.report.alert = Some(SwingAlert::NoFeasibleIntercept);
            }
            Err(e) => {
                warn!("Strike planning failed, keeping the current trajectory: {}", e);
                self.fail(pending.intercept, time_s);
                self.report.alert = Some(SwingAlert::PlanFailed);
            }
        }
    }

    fn fail(&mut self, intercept: Intercept, time_s: f64) {
        self.failed = Some(FailedPlan {
            intercept,
            retry_s: time_s + self.params.replan_backoff_s,
        });
    }

    /// Once the strike is complete head back to the ready configuration.
    fn check_strike_complete(&mut self, time_s: f64) {
        let complete = match self.traj {
            Some(ref t) => t.kind == TrajKind::Strike && t.is_finished(time_s),
            None => false,
        };
        if !complete {
            return;
        }

        if let Some(active) = self.active.take() {
            info!("Strike at {:.3} s complete", active.target.time_s);
            let v = active.target.ball_velocity_out;
            self.report.struck_ball_velocity_ms = Some([v.x, v.y, v.z]);
        }

        // Follow through from the end of the strike
        let end = self.traj.take().and_then(|t| t.last().cloned());
        if let Some(end) = end {
            self.start_idle(&TrajStart {
                time_s: end.time_s,
                q: end.q,
                qd: end.qd,
            });
        }
    }

    fn start_idle(&mut self, start: &TrajStart) {
        match self.planner.plan_idle(start) {
            Ok(t) => {
                debug!(
                    "Returning to idle, arriving at {:.3} s",
                    t.end_time_s().unwrap_or(start.time_s)
                );
                self.traj = Some(t);
            }
            Err(e) => {
                warn!("Cannot return to idle, holding: {}", e);
                self.hold = start.q.clone();
                self.traj = None;
            }
        }
    }

    /// Drop everything planned, the arm holds its last commanded position.
    fn discard(&mut self) {
        self.traj = None;
        self.active = None;
        self.pending = None;
    }

    /// State of the arm at `time_s` according to the current trajectory.
    fn state_at(&self, time_s: f64) -> TrajStart {
        let sample = match self.traj {
            Some(ref t) => t.sample_at(self.planner.chain(), time_s),
            None => None,
        };

        match sample {
            Some(s) => TrajStart {
                time_s,
                q: s.q,
                qd: s.qd,
            },
            None => TrajStart {
                time_s,
                q: self.hold.clone(),
                qd: DVector::zeros(self.hold.len()),
            },
        }
    }

    fn mode(&self, time_s: f64, safe: bool) -> SwingMode {
        if safe || self.stopped {
            return SwingMode::Stopped;
        }

        match self.traj {
            Some(ref t) if !t.is_finished(time_s) => match t.kind {
                TrajKind::Strike => SwingMode::Striking,
                TrajKind::Idle => SwingMode::Returning,
            },
            _ => SwingMode::Holding,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::TaskSpace;
    use crate::test_fixtures;
    use std::time::{Duration, Instant};

    const DT: f64 = 0.01;

    fn ball() -> BallState {
        BallState {
            position_m: [2.0, 0.1, 1.0],
            velocity_ms: [-3.0, 0.0, 1.5],
            timestamp_s: 0.0,
        }
    }

    /// The ball after `steps` prediction steps, as an estimator would report it.
    fn ball_after(ball: &BallState, steps: usize) -> BallState {
        let mut b = *ball;
        for _ in 0..steps {
            for i in 0..3 {
                b.position_m[i] += b.velocity_ms[i] * DT;
            }
            b.velocity_ms[2] += -9.82 * DT;
            b.timestamp_s += DT;
        }
        b
    }

    fn input(time_s: f64, ball: Option<BallState>, cmd: Option<SwingCmd>) -> InputData {
        InputData {
            time_s,
            ball,
            cmd,
            safe: false,
        }
    }

    #[test]
    fn test_strike_and_return() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();
        let chain = ctrl.planner().chain().clone();
        let rest = chain.rest_config().clone();
        let max_vel = chain.max_vel();

        let (dems, report) = ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        assert!(report.plan_requested);
        assert!(report.new_strike);
        assert_eq!(report.mode, SwingMode::Striking);
        let strike_time_s = report.strike_time_s.unwrap();
        assert!((strike_time_s - 0.49).abs() < 1e-6);

        // Nothing moves before the swing starts
        assert_eq!(dems.pos_rad, rest.to_vec());
        assert_eq!(dems.speed_rads, vec![0.0; 4]);

        let intercept = ctrl
            .planner()
            .hit_planner()
            .predict_intercept(&ball(), 0.02)
            .unwrap();

        let mut prev = dems;
        let mut completions = 0;
        for k in 1..=250 {
            let t = k as f64 * DT;
            let (dems, report) = ctrl.proc(&input(t, None, None)).unwrap();

            assert_eq!(dems.num_joints(), 4);
            assert!(!report.plan_requested);
            for i in 0..4 {
                assert!((dems.pos_rad[i] - prev.pos_rad[i]).abs() <= max_vel[i] * DT + 1e-6);
            }

            // The paddle meets the ball
            if (t - strike_time_s).abs() < 0.5 * DT {
                let q = chain.config(DVector::from_vec(dems.pos_rad.clone())).unwrap().0;
                let pose = chain.forward_kinematics(&q);
                assert!((pose.position - intercept.position).norm() < 1e-3);
            }

            if report.struck_ball_velocity_ms.is_some() {
                completions += 1;
                assert!(t > strike_time_s && t < strike_time_s + 2.0 * DT);
                assert_eq!(report.mode, SwingMode::Returning);
            }

            prev = dems;
        }
        assert_eq!(completions, 1);

        // Back at rest
        let (dems, report) = ctrl.proc(&input(2.6, None, None)).unwrap();
        assert_eq!(report.mode, SwingMode::Holding);
        assert_eq!(dems.pos_rad, rest.to_vec());
        assert_eq!(dems.speed_rads, vec![0.0; 4]);
        assert!(ctrl.active_target().is_none());
    }

    #[test]
    fn test_replan_on_drift() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();

        let (_, report) = ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        assert!(report.new_strike);

        // The same ball, seen later, needs no new plan
        let (_, report) = ctrl
            .proc(&input(0.05, Some(ball_after(&ball(), 5)), None))
            .unwrap();
        assert!(!report.plan_requested);

        // A stale snapshot is ignored
        let (_, report) = ctrl.proc(&input(0.06, Some(ball()), None)).unwrap();
        assert!(!report.plan_requested);

        // The ball is seen somewhere else
        let mut moved = ball_after(&ball(), 10);
        moved.position_m[1] += 0.1;
        let (_, report) = ctrl.proc(&input(0.1, Some(moved), None)).unwrap();
        assert!(report.plan_requested);
    }

    #[test]
    fn test_stop_and_resume() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();

        ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        let (moving, _) = ctrl.proc(&input(0.2, None, None)).unwrap();
        assert!(moving.speed_rads.iter().any(|v| *v != 0.0));

        let (dems, report) = ctrl
            .proc(&input(0.21, None, Some(SwingCmd::Stop)))
            .unwrap();
        assert_eq!(report.mode, SwingMode::Stopped);
        assert_eq!(dems.pos_rad, moving.pos_rad);
        assert_eq!(dems.speed_rads, vec![0.0; 4]);
        assert!(ctrl.trajectory().is_none());

        // Nothing is planned while stopped
        let (_, report) = ctrl
            .proc(&input(0.22, Some(ball_after(&ball(), 22)), None))
            .unwrap();
        assert!(!report.plan_requested);
        assert_eq!(report.mode, SwingMode::Stopped);

        let (_, report) = ctrl
            .proc(&input(0.23, Some(ball_after(&ball(), 23)), Some(SwingCmd::Resume)))
            .unwrap();
        assert!(report.plan_requested);
        assert_ne!(report.mode, SwingMode::Stopped);
    }

    #[test]
    fn test_no_feasible_intercept() {
        let mut params = test_fixtures::swing_ctrl_params();
        for joint in params.chain.joints.iter_mut() {
            joint.limits.max_vel = 0.05;
        }
        let mut ctrl = SwingCtrl::new(params).unwrap();
        let rest = ctrl.planner().chain().rest_config().to_vec();

        let (dems, report) = ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        assert!(report.plan_requested);
        assert_eq!(report.alert, Some(SwingAlert::NoFeasibleIntercept));
        assert_eq!(report.mode, SwingMode::Holding);
        assert_eq!(dems, JointDems::hold(&rest));

        // The same ball is not planned for again
        let (_, report) = ctrl
            .proc(&input(0.01, Some(ball_after(&ball(), 1)), None))
            .unwrap();
        assert!(!report.plan_requested);
        assert!(report.alert.is_none());
    }

    #[test]
    fn test_failed_plan_backoff() {
        let mut params = test_fixtures::swing_ctrl_params();
        for joint in params.chain.joints.iter_mut() {
            joint.limits.max_vel = 0.05;
        }
        let backoff_s = params.replan_backoff_s;
        let mut ctrl = SwingCtrl::new(params).unwrap();

        // Noisy snapshots move the predicted intercept on every cycle
        let noisy = |k: usize| {
            let mut b = ball_after(&ball(), k);
            b.velocity_ms[1] += if k % 2 == 0 { 0.15 } else { -0.15 };
            b
        };

        let mut requests = Vec::new();
        for k in 0..30 {
            let t = k as f64 * DT;
            let (_, report) = ctrl.proc(&input(t, Some(noisy(k)), None)).unwrap();
            if report.plan_requested {
                assert_eq!(report.alert, Some(SwingAlert::NoFeasibleIntercept));
                requests.push(t);
            }
        }

        assert_eq!(requests[0], 0.0);
        assert!(requests.len() >= 2);
        for w in requests.windows(2) {
            assert!(w[1] - w[0] >= backoff_s - 1e-9);
        }
    }

    #[test]
    fn test_deployed_arm_strike() {
        let mut params: SwingCtrlParams = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/swing_ctrl.toml"
        ))
        .unwrap();
        params.plan_mode = PlanMode::Inline;
        params.save_strikes = false;

        let mut ctrl = SwingCtrl::new(params).unwrap();
        let chain = ctrl.planner().chain().clone();
        let n = chain.num_joints();
        let max_vel = chain.max_vel();

        // Thrown off the centre line of the arm
        let ball = BallState {
            position_m: [0.3, 3.0, 1.2],
            velocity_ms: [-0.4, -4.5, 2.5],
            timestamp_s: 0.0,
        };

        let (mut prev, report) = ctrl.proc(&input(0.0, Some(ball), None)).unwrap();
        assert!(report.plan_requested);
        assert!(report.new_strike);
        assert!(report.alert.is_none());
        let strike_time_s = report.strike_time_s.unwrap();
        let target = ctrl.active_target().unwrap().clone();
        assert_eq!(target.task, TaskSpace::PositionNormal);

        let mut struck = 0;
        for k in 1..=200 {
            let t = k as f64 * DT;
            let (dems, report) = ctrl.proc(&input(t, None, None)).unwrap();

            assert_eq!(dems.num_joints(), n);
            assert!(report.alert.is_none());
            for i in 0..n {
                assert!((dems.pos_rad[i] - prev.pos_rad[i]).abs() <= max_vel[i] * DT + 1e-6);
            }

            // The paddle meets the ball facing the planned normal
            if (t - strike_time_s).abs() < 0.5 * DT {
                let q = chain.config(DVector::from_vec(dems.pos_rad.clone())).unwrap().0;
                let pose = chain.forward_kinematics(&q);
                assert!((pose.position - target.pose.position).norm() < 1e-2);
                assert!(pose.normal().dot(&target.pose.normal().into_inner()) > 0.99);
            }

            if report.struck_ball_velocity_ms.is_some() {
                struck += 1;
            }
            prev = dems;
        }
        assert_eq!(struck, 1);
    }

    #[test]
    fn test_ball_out_of_reach() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();
        let rest = ctrl.planner().chain().rest_config().to_vec();

        // Thrown away from the arm, nothing to plan
        let away = BallState {
            position_m: [2.0, 0.0, 1.0],
            velocity_ms: [3.0, 0.0, 1.0],
            timestamp_s: 0.0,
        };
        let (dems, report) = ctrl.proc(&input(0.0, Some(away), None)).unwrap();
        assert!(!report.plan_requested);
        assert_eq!(report.mode, SwingMode::Holding);
        assert_eq!(dems, JointDems::hold(&rest));
    }

    #[test]
    fn test_commands() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();

        let cmd = SwingCmd::SetJointWeights {
            weights: vec![1.0, 2.0],
        };
        let (_, report) = ctrl.proc(&input(0.0, None, Some(cmd))).unwrap();
        assert!(report.cmd_rejected);
        assert!(ctrl.style().joint_weights.is_none());

        let cmd = SwingCmd::SetJointWeights {
            weights: vec![1.0, 2.0, 2.0, 1.0],
        };
        let (_, report) = ctrl.proc(&input(0.01, None, Some(cmd))).unwrap();
        assert!(!report.cmd_rejected);
        assert_eq!(ctrl.style().joint_weights, Some(vec![1.0, 2.0, 2.0, 1.0]));

        let cmd = SwingCmd::SetSecondaryGain { gain: -1.0 };
        let (_, report) = ctrl.proc(&input(0.02, None, Some(cmd))).unwrap();
        assert!(report.cmd_rejected);

        let cmd = SwingCmd::SetSecondaryGain { gain: 0.0 };
        let (_, report) = ctrl.proc(&input(0.03, None, Some(cmd))).unwrap();
        assert!(!report.cmd_rejected);
        assert_eq!(ctrl.style().secondary_gain, 0.0);
    }

    #[test]
    fn test_return_idle() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();

        ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        ctrl.proc(&input(0.2, None, None)).unwrap();

        let (_, report) = ctrl
            .proc(&input(0.21, None, Some(SwingCmd::ReturnIdle)))
            .unwrap();
        assert_eq!(report.mode, SwingMode::Returning);
        assert!(report.strike_time_s.is_none());

        let (dems, report) = ctrl.proc(&input(30.0, None, None)).unwrap();
        assert_eq!(report.mode, SwingMode::Holding);
        assert_eq!(dems.pos_rad, ctrl.planner().chain().rest_config().to_vec());
    }

    #[test]
    fn test_safe_mode_holds() {
        let mut ctrl = SwingCtrl::new(test_fixtures::swing_ctrl_params()).unwrap();

        ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        let (moving, _) = ctrl.proc(&input(0.2, None, None)).unwrap();

        let mut safe = input(0.21, Some(ball_after(&ball(), 21)), None);
        safe.safe = true;
        let (dems, report) = ctrl.proc(&safe).unwrap();
        assert_eq!(report.mode, SwingMode::Stopped);
        assert!(!report.plan_requested);
        assert_eq!(dems.pos_rad, moving.pos_rad);
        assert_eq!(dems.speed_rads, vec![0.0; 4]);
    }

    #[test]
    fn test_worker_planning() {
        let mut params = test_fixtures::swing_ctrl_params();
        params.plan_mode = PlanMode::Worker;
        let mut ctrl = SwingCtrl::new(params).unwrap();
        ctrl.start_worker().unwrap();

        let (_, report) = ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        assert!(report.plan_requested);

        // Keep the clock before the start time until the worker is done
        let started = Instant::now();
        loop {
            let (_, report) = ctrl.proc(&input(0.0, None, None)).unwrap();
            if report.new_strike {
                break;
            }
            assert!(started.elapsed() < Duration::from_secs(30));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(ctrl.active_target().is_some());
        assert_eq!(ctrl.trajectory().unwrap().kind, TrajKind::Strike);

        ctrl.stop_worker().unwrap();
    }

    #[test]
    fn test_deadline_miss() {
        let mut params = test_fixtures::swing_ctrl_params();
        params.plan_mode = PlanMode::Worker;
        params.max_consec_deadline_misses = 1;
        let mut ctrl = SwingCtrl::new(params).unwrap();
        ctrl.start_worker().unwrap();

        let (_, report) = ctrl.proc(&input(0.0, Some(ball()), None)).unwrap();
        assert!(report.plan_requested);

        // The clock runs well past the start time while the worker plans
        let started = Instant::now();
        loop {
            let (_, report) = ctrl.proc(&input(0.3, None, None)).unwrap();
            if report.deadline_missed {
                assert_eq!(report.consec_deadline_misses, 1);
                assert_eq!(report.alert, Some(SwingAlert::PlanningDeadlineMissed));
                assert!(!report.new_strike);
                break;
            }
            assert!(started.elapsed() < Duration::from_secs(30));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(ctrl.trajectory().is_none());

        ctrl.stop_worker().unwrap();
    }
}
