//! # Trajectory generator module
//!
//! Produces the joint space samples taking the arm from its current state to
//! a hit target, or back to the ready configuration. Samples are spaced by
//! the sampling period from the start time, with the final sample exactly at
//! the end time.
//!
//! Every generated trajectory is checked before being returned: consecutive
//! samples must be reachable within the joint velocity limits, and the final
//! sample must place the paddle on the target.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod trajectory;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use nalgebra::{DVector, UnitQuaternion, Vector3};

// Internal
pub use params::*;
pub use trajectory::*;

use crate::chain::{ChainConfig, ChainError, KinematicChain, LimitReport, TaskPose};
use crate::hit_planner::HitTarget;
use crate::ikin::{IkSolver, IkinError, IkinParams};
use crate::resolver::{Resolver, ResolverError, SecondaryObjective, StrikeStyle};
use util::maths::{cubic_hermite, cubic_hermite_peak_speed};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Sample times closer than this to the end time are merged into the final
/// sample.
const TIME_EPS_S: f64 = 1e-9;

/// Maximum number of times the idle return duration is doubled to respect
/// the velocity limits.
const MAX_IDLE_EXTENSIONS: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory generator.
#[derive(Debug, Clone, Copy)]
pub struct TrajGen<'a> {
    chain: &'a KinematicChain,
    resolver: &'a Resolver,
    ikin_params: &'a IkinParams,
    params: &'a TrajGenParams,
}

/// State of the arm at the start of a trajectory.
#[derive(Debug, Clone)]
pub struct TrajStart {
    /// Units: seconds, exec time
    pub time_s: f64,

    pub q: ChainConfig,

    pub qd: DVector<f64>,
}

/// A joint space knot of a piecewise cubic.
struct Knot {
    time_s: f64,
    q: ChainConfig,
    qd: DVector<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during trajectory generation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajGenError {
    #[error("Cannot generate a trajectory from {start_s} s to {end_s} s")]
    InvalidTiming { start_s: f64, end_s: f64 },

    #[error(
        "Joint {joint} moves {step:.4} between samples at {time_s:.3} s, more than the \
        {max_step:.4} its velocity limit allows"
    )]
    Discontinuity {
        joint: usize,
        time_s: f64,
        step: f64,
        max_step: f64,
    },

    #[error("Final sample is {residual:.3e} from the target (tolerance {tolerance:.3e})")]
    TerminalMismatch { residual: f64, tolerance: f64 },

    #[error("Exact pose solver error: {0}")]
    IkinError(#[from] IkinError),

    #[error("Resolver error: {0}")]
    ResolverError(#[from] ResolverError),

    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a> TrajGen<'a> {
    pub fn new(
        chain: &'a KinematicChain,
        resolver: &'a Resolver,
        ikin_params: &'a IkinParams,
        params: &'a TrajGenParams,
    ) -> Self {
        Self {
            chain,
            resolver,
            ikin_params,
            params,
        }
    }

    /// Generate a strike trajectory from `start` to `target` using the
    /// configured strategy.
    pub fn generate(&self, start: &TrajStart, target: &HitTarget) -> Result<Trajectory, TrajGenError> {
        self.check_timing(start.time_s, target.time_s)?;

        let traj = match self.params.strategy {
            TrajStrategy::Waypoint => self.waypoint(start, target)?,
            TrajStrategy::VelocityIntegration => self.velocity_integration(start, target)?,
        };

        self.check_continuity(&traj)?;
        self.check_terminal(&traj, target)?;

        debug!(
            "Generated {:?} strike trajectory with {} samples ({} singular)",
            self.params.strategy,
            traj.samples.len(),
            traj.singular_samples
        );

        Ok(traj)
    }

    /// Generate a rest to rest return to the ready configuration.
    pub fn generate_idle(&self, start: &TrajStart) -> Result<Trajectory, TrajGenError> {
        let rest = self.chain.rest_config();
        let zero = DVector::zeros(self.chain.num_joints());
        let delta = self.chain.joint_delta(&start.q, rest);
        let max_vel = self.chain.max_vel();

        // Stretch the duration until the cubic respects every velocity limit
        let mut duration = self.params.idle_return_time_s.max(self.params.sample_period_s);
        for _ in 0..MAX_IDLE_EXTENSIONS {
            let within = (0..delta.len()).all(|i| {
                cubic_hermite_peak_speed(0.0, start.qd[i], delta[i], 0.0, duration) <= max_vel[i]
            });
            if within {
                break;
            }
            duration *= 2.0;
        }

        let knots = vec![
            Knot {
                time_s: start.time_s,
                q: start.q.clone(),
                qd: start.qd.clone(),
            },
            Knot {
                time_s: start.time_s + duration,
                q: rest.clone(),
                qd: zero,
            },
        ];

        let traj = self.interpolate(TrajKind::Idle, &knots)?;
        self.check_continuity(&traj)?;

        debug!("Generated idle trajectory over {:.2} s", duration);

        Ok(traj)
    }

    /// Waypoint strategy: exact poses along the straight task space line,
    /// joined by cubics with Catmull-Rom velocities at interior waypoints.
    fn waypoint(&self, start: &TrajStart, target: &HitTarget) -> Result<Trajectory, TrajGenError> {
        let solver = IkSolver::new(self.chain, self.resolver, self.ikin_params);
        let start_pose = self.chain.forward_kinematics(&start.q);
        let num_waypoints = self.params.num_intermediate_waypoints;
        let duration = target.time_s - start.time_s;

        let mut knots = Vec::with_capacity(num_waypoints + 2);
        knots.push(Knot {
            time_s: start.time_s,
            q: start.q.clone(),
            qd: start.qd.clone(),
        });

        let mut seed = start.q.clone();
        for i in 1..=num_waypoints {
            let frac = i as f64 / (num_waypoints + 1) as f64;
            let pose = interpolate_pose(&start_pose, &target.pose, frac);

            let sol = solver.solve(target.task, &pose, &seed, &target.style)?;
            trace!("Waypoint {} solved in {} iterations", i, sol.iterations);

            seed = sol.config.clone();
            knots.push(Knot {
                time_s: start.time_s + frac * duration,
                q: sol.config,
                qd: DVector::zeros(self.chain.num_joints()),
            });
        }

        knots.push(Knot {
            time_s: target.time_s,
            q: target.q.clone(),
            qd: target.qd.clone(),
        });

        for i in 1..=num_waypoints {
            let span = knots[i + 1].time_s - knots[i - 1].time_s;
            let delta = self.chain.joint_delta(&knots[i - 1].q, &knots[i + 1].q);
            knots[i].qd = delta / span;
        }

        self.interpolate(TrajKind::Strike, &knots)
    }

    /// Velocity integration strategy: a cubic task space path tracked by
    /// resolving its velocity with error feedback, integrated every sample.
    fn velocity_integration(
        &self,
        start: &TrajStart,
        target: &HitTarget,
    ) -> Result<Trajectory, TrajGenError> {
        let task = target.task;
        let style = &target.style;
        let weights = style.weights(self.chain.num_joints())?;
        let max_vel = self.chain.max_vel();
        let times = sample_times(start.time_s, target.time_s, self.params.sample_period_s);
        let duration = target.time_s - start.time_s;

        let start_pose = self.chain.forward_kinematics(&start.q);
        let start_vel = self
            .chain
            .geometric_jacobian(&start.q)
            .rows(0, 3)
            .into_owned()
            * &start.qd;
        let path = TaskPath {
            start: start_pose,
            start_vel: Vector3::new(start_vel[0], start_vel[1], start_vel[2]),
            end: target.pose,
            end_vel: target.paddle_velocity,
            duration,
        };

        let mut q = start.q.clone();
        let mut samples = Vec::with_capacity(times.len());
        let mut limits = LimitReport::default();
        let mut singular_samples = 0;

        for w in times.windows(2) {
            let (t, dt) = (w[0], w[1] - w[0]);
            let (desired, linear, angular) = path.at(t - start.time_s);

            let pose = self.chain.forward_kinematics(&q);
            let jac = task.jacobian(&self.chain.geometric_jacobian(&q), &pose);
            let xd = task.twist(&linear, &angular, &pose)
                + task.error(&pose, &desired) * self.params.tracking_gain;
            let z = style.secondary_term(self.chain, &q)?;

            let res = self
                .resolver
                .resolve(&jac, &xd, z.as_ref(), &weights, Some(&max_vel))?;
            if let Some(e) = res.singularity {
                trace!("Sample at {:.3} s: {}", t, e);
                singular_samples += 1;
            }

            let (next, report) = self.chain.config(q.as_vector() + &res.qd * dt)?;
            limits.merge(&report);

            samples.push(TrajSample {
                time_s: t,
                q,
                qd: res.qd,
            });
            q = next;
        }

        // Snap the final sample onto the target. Without a secondary objective
        // the correction is the smallest joint motion.
        let snap_style = StrikeStyle {
            joint_weights: style.joint_weights.clone(),
            secondary_gain: 0.0,
            secondary: SecondaryObjective::None,
        };
        let solver = IkSolver::new(self.chain, self.resolver, self.ikin_params);
        let sol = solver.solve(task, &target.pose, &q, &snap_style)?;
        let twist = task.twist(&target.paddle_velocity, &Vector3::zeros(), &target.pose);
        let qd = solver
            .terminal_velocity(task, &sol.config, &twist, &snap_style)?
            .qd;

        samples.push(TrajSample {
            time_s: target.time_s,
            q: sol.config,
            qd,
        });

        if singular_samples > 0 {
            warn!(
                "{} samples of the swing were resolved near a singularity",
                singular_samples
            );
        }

        Ok(Trajectory {
            kind: TrajKind::Strike,
            samples,
            limits,
            singular_samples,
        })
    }

    /// Sample a piecewise cubic through the knots.
    fn interpolate(&self, kind: TrajKind, knots: &[Knot]) -> Result<Trajectory, TrajGenError> {
        let (first, last) = match (knots.first(), knots.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(TrajGenError::InvalidTiming {
                    start_s: 0.0,
                    end_s: 0.0,
                })
            }
        };
        self.check_timing(first.time_s, last.time_s)?;

        let n = self.chain.num_joints();
        let times = sample_times(first.time_s, last.time_s, self.params.sample_period_s);
        let mut samples = Vec::with_capacity(times.len());
        let mut limits = LimitReport::default();
        let mut seg = 0;

        for t in times {
            if t >= last.time_s {
                samples.push(TrajSample {
                    time_s: t,
                    q: last.q.clone(),
                    qd: last.qd.clone(),
                });
                continue;
            }

            while seg + 2 < knots.len() && t > knots[seg + 1].time_s {
                seg += 1;
            }
            let (a, b) = (&knots[seg], &knots[seg + 1]);
            let delta = self.chain.joint_delta(&a.q, &b.q);

            let mut q = a.q.as_vector().clone();
            let mut qd = DVector::zeros(n);
            for i in 0..n {
                let (p, v) = cubic_hermite(
                    0.0,
                    a.qd[i],
                    delta[i],
                    b.qd[i],
                    b.time_s - a.time_s,
                    t - a.time_s,
                );
                q[i] += p;
                qd[i] = v;
            }

            let (q, report) = self.chain.config(q)?;
            limits.merge(&report);
            samples.push(TrajSample { time_s: t, q, qd });
        }

        if !limits.is_clear() {
            warn!(
                "Trajectory clamped at the position limits of joint(s) {:?}",
                limits.pos_limited
            );
        }

        Ok(Trajectory {
            kind,
            samples,
            limits,
            singular_samples: 0,
        })
    }

    fn check_timing(&self, start_s: f64, end_s: f64) -> Result<(), TrajGenError> {
        if !(end_s > start_s) || !(self.params.sample_period_s > 0.0) {
            Err(TrajGenError::InvalidTiming { start_s, end_s })
        } else {
            Ok(())
        }
    }

    /// Check that no joint moves further between two samples than its
    /// velocity limit allows.
    pub fn check_continuity(&self, traj: &Trajectory) -> Result<(), TrajGenError> {
        let max_vel = self.chain.max_vel();

        for w in traj.samples.windows(2) {
            let dt = w[1].time_s - w[0].time_s;
            let delta = self.chain.joint_delta(&w[0].q, &w[1].q);

            for (joint, (step, vmax)) in delta.iter().zip(max_vel.iter()).enumerate() {
                let max_step = vmax * dt + self.params.continuity_margin;
                if step.abs() > max_step {
                    return Err(TrajGenError::Discontinuity {
                        joint,
                        time_s: w[1].time_s,
                        step: step.abs(),
                        max_step,
                    });
                }
            }
        }

        Ok(())
    }

    /// Check that the final sample places the paddle on the target.
    fn check_terminal(&self, traj: &Trajectory, target: &HitTarget) -> Result<(), TrajGenError> {
        let last = traj.last().ok_or(TrajGenError::InvalidTiming {
            start_s: target.time_s,
            end_s: target.time_s,
        })?;

        let pose = self.chain.forward_kinematics(&last.q);
        let residual = target.task.error(&pose, &target.pose).norm();

        if residual > self.params.terminal_tolerance {
            Err(TrajGenError::TerminalMismatch {
                residual,
                tolerance: self.params.terminal_tolerance,
            })
        } else {
            Ok(())
        }
    }
}

/// Cubic task space path between two paddle states.
struct TaskPath {
    start: TaskPose,
    start_vel: Vector3<f64>,
    end: TaskPose,
    end_vel: Vector3<f64>,
    duration: f64,
}

impl TaskPath {
    /// Desired pose, linear velocity and angular velocity at `t` seconds into
    /// the path.
    fn at(&self, t: f64) -> (TaskPose, Vector3<f64>, Vector3<f64>) {
        let mut position = Vector3::zeros();
        let mut linear = Vector3::zeros();
        for i in 0..3 {
            let (p, v) = cubic_hermite(
                self.start.position[i],
                self.start_vel[i],
                self.end.position[i],
                self.end_vel[i],
                self.duration,
                t,
            );
            position[i] = p;
            linear[i] = v;
        }

        // Orientation eases in and out along the shortest rotation
        let (s, sd) = cubic_hermite(0.0, 0.0, 1.0, 0.0, self.duration, t);
        let rotation = slerp(&self.start.rotation, &self.end.rotation, s);
        let angular = (self.end.rotation * self.start.rotation.inverse()).scaled_axis() * sd;

        (TaskPose::new(position, rotation), linear, angular)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Sample times from `start_s` in steps of `period_s`, with the last sample
/// exactly at `end_s`.
pub fn sample_times(start_s: f64, end_s: f64, period_s: f64) -> Vec<f64> {
    let mut times = Vec::new();

    if period_s > 0.0 {
        let mut k = 0usize;
        loop {
            let t = start_s + k as f64 * period_s;
            if t >= end_s - TIME_EPS_S {
                break;
            }
            times.push(t);
            k += 1;
        }
    }

    times.push(end_s);
    times
}

/// Pose a fraction of the way between two poses, position linearly and
/// rotation along the shortest arc.
fn interpolate_pose(a: &TaskPose, b: &TaskPose, frac: f64) -> TaskPose {
    TaskPose::new(
        a.position + (b.position - a.position) * frac,
        slerp(&a.rotation, &b.rotation, frac),
    )
}

fn slerp(a: &UnitQuaternion<f64>, b: &UnitQuaternion<f64>, frac: f64) -> UnitQuaternion<f64> {
    a.try_slerp(b, frac, 1e-9).unwrap_or_else(|| a.nlerp(b, frac))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::{ChainParams, TaskSpace};
    use crate::hit_planner::FreeVelocity;
    use crate::resolver::ResolverParams;
    use nalgebra::Unit;

    struct Fixture {
        chain: KinematicChain,
        resolver: Resolver,
        ikin_params: IkinParams,
    }

    fn fixture() -> Fixture {
        let mut chain_params = ChainParams::planar(&[1.0, 0.8, 0.5], 2.5, 2.0);
        chain_params.rest_pos = vec![0.0, -0.8, -0.6];

        Fixture {
            chain: KinematicChain::new(&chain_params).unwrap(),
            resolver: Resolver::new(ResolverParams::default()),
            ikin_params: IkinParams::default(),
        }
    }

    fn start(f: &Fixture) -> TrajStart {
        TrajStart {
            time_s: 2.0,
            q: f.chain.rest_config().clone(),
            qd: DVector::zeros(3),
        }
    }

    /// Planar hit target at `goal`, `duration` after the start.
    fn target(f: &Fixture, goal: [f64; 2], duration: f64) -> HitTarget {
        let task = TaskSpace::PlanarPosition;
        let style = StrikeStyle::default();
        let solver = IkSolver::new(&f.chain, &f.resolver, &f.ikin_params);
        let pose = TaskPose::new(
            Vector3::new(goal[0], goal[1], 0.0),
            UnitQuaternion::identity(),
        );
        let paddle_velocity = Vector3::new(0.3, 0.2, 0.0);

        let sol = solver
            .solve(task, &pose, f.chain.rest_config(), &style)
            .unwrap();
        let twist = task.twist(&paddle_velocity, &Vector3::zeros(), &pose);
        let qd = solver
            .terminal_velocity(task, &sol.config, &twist, &style)
            .unwrap()
            .qd;

        HitTarget {
            time_s: 2.0 + duration,
            pose,
            task,
            paddle_velocity,
            free_velocity: FreeVelocity {
                axis: Unit::new_normalize(Vector3::x()),
                min_ms: 0.0,
                max_ms: 0.0,
                chosen_ms: 0.0,
            },
            ball_velocity_in: Vector3::zeros(),
            ball_velocity_out: Vector3::zeros(),
            style,
            q: sol.config,
            qd,
        }
    }

    fn assert_strike(f: &Fixture, traj: &Trajectory, target: &HitTarget) {
        let samples = traj.samples();
        assert_eq!(samples.len(), 101);
        assert_eq!(samples[0].time_s, 2.0);
        assert_eq!(traj.end_time_s(), Some(target.time_s));
        for w in samples.windows(2) {
            let dt = w[1].time_s - w[0].time_s;
            assert!((dt - 0.01).abs() < 1e-9);
            let step = f.chain.joint_delta(&w[0].q, &w[1].q);
            for (s, v) in step.iter().zip(f.chain.max_vel().iter()) {
                assert!(s.abs() <= v * dt + 1e-6);
            }
        }

        let pose = f.chain.forward_kinematics(&samples[100].q);
        assert!((pose.position - target.pose.position).norm() < 1e-3);
    }

    #[test]
    fn test_sample_times() {
        let times = sample_times(1.0, 1.035, 0.01);
        assert_eq!(times.len(), 5);
        assert_eq!(times[0], 1.0);
        assert_eq!(*times.last().unwrap(), 1.035);

        let times = sample_times(0.0, 0.03, 0.01);
        assert_eq!(times.len(), 4);
        assert_eq!(*times.last().unwrap(), 0.03);
    }

    #[test]
    fn test_waypoint_strategy() {
        let f = fixture();
        let params = TrajGenParams::default();
        let gen = TrajGen::new(&f.chain, &f.resolver, &f.ikin_params, &params);
        let target = target(&f, [1.3, -0.2], 1.0);

        let traj = gen.generate(&start(&f), &target).unwrap();

        assert_eq!(traj.kind, TrajKind::Strike);
        assert_strike(&f, &traj, &target);
        // Knots are hit exactly at both ends
        assert_eq!(traj.last().unwrap().q, target.q);
        assert!((&traj.last().unwrap().qd - &target.qd).norm() < 1e-12);
        assert_eq!(traj.first().unwrap().q, *f.chain.rest_config());
    }

    #[test]
    fn test_velocity_integration_strategy() {
        let f = fixture();
        let params = TrajGenParams {
            strategy: TrajStrategy::VelocityIntegration,
            ..TrajGenParams::default()
        };
        let gen = TrajGen::new(&f.chain, &f.resolver, &f.ikin_params, &params);
        let target = target(&f, [1.3, -0.2], 1.0);

        let traj = gen.generate(&start(&f), &target).unwrap();

        assert_strike(&f, &traj, &target);
        assert_eq!(traj.singular_samples, 0);
    }

    #[test]
    fn test_too_fast_is_discontinuous() {
        let f = fixture();
        let params = TrajGenParams::default();
        let gen = TrajGen::new(&f.chain, &f.resolver, &f.ikin_params, &params);
        let target = target(&f, [1.3, -0.2], 0.05);

        assert!(matches!(
            gen.generate(&start(&f), &target),
            Err(TrajGenError::Discontinuity { .. })
        ));

        let late = HitTarget {
            time_s: 1.0,
            ..target
        };
        assert!(matches!(
            gen.generate(&start(&f), &late),
            Err(TrajGenError::InvalidTiming { .. })
        ));
    }

    #[test]
    fn test_idle_return() {
        let f = fixture();
        let params = TrajGenParams::default();
        let gen = TrajGen::new(&f.chain, &f.resolver, &f.ikin_params, &params);

        // Far from rest and moving away from it, the return has to be slowed
        // down to respect the velocity limits.
        let (q, _) = f
            .chain
            .config(DVector::from_vec(vec![2.0, 1.5, 1.0]))
            .unwrap();
        let moving = TrajStart {
            time_s: 0.0,
            q,
            qd: DVector::from_vec(vec![1.0, 1.0, 1.0]),
        };

        let traj = gen.generate_idle(&moving).unwrap();
        let last = traj.last().unwrap();

        assert_eq!(traj.kind, TrajKind::Idle);
        assert!(traj.end_time_s().unwrap() > params.idle_return_time_s);
        assert_eq!(last.q, *f.chain.rest_config());
        assert_eq!(last.qd, DVector::zeros(3));
    }

    #[test]
    fn test_sample_at() {
        let f = fixture();
        let params = TrajGenParams::default();
        let gen = TrajGen::new(&f.chain, &f.resolver, &f.ikin_params, &params);
        let traj = gen.generate_idle(&TrajStart {
            time_s: 0.0,
            q: f.chain.config(DVector::from_vec(vec![0.5, -0.5, 0.0])).unwrap().0,
            qd: DVector::zeros(3),
        })
        .unwrap();

        let before = traj.sample_at(&f.chain, -1.0).unwrap();
        assert_eq!(before.q, traj.first().unwrap().q);

        let after = traj.sample_at(&f.chain, 10.0).unwrap();
        assert_eq!(after.q, *f.chain.rest_config());
        assert_eq!(after.qd, DVector::zeros(3));
        assert!(traj.is_finished(10.0));

        // Halfway between two samples
        let a = &traj.samples()[10];
        let b = &traj.samples()[11];
        let mid = traj.sample_at(&f.chain, 0.5 * (a.time_s + b.time_s)).unwrap();
        let expected = 0.5 * (a.q.as_vector() + b.q.as_vector());
        assert!((mid.q.as_vector() - expected).norm() < 1e-12);
    }
}
