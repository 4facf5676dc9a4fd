//! Task spaces
//!
//! A task space selects which directions of the paddle pose are constrained.
//! The task Jacobian and task error for a space are always built from the same
//! basis so that a resolved joint velocity drives the error to zero.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Unit, Vector3};
use serde::{Deserialize, Serialize};

use super::TaskPose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PARALLEL_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The constrained directions of the paddle pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskSpace {
    /// World x and y position only.
    PlanarPosition,

    /// World position only.
    Position,

    /// World position and the direction of the paddle normal. Rotation about
    /// the normal is free.
    PositionNormal,

    /// World position and full orientation.
    Full,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TaskSpace {
    /// Number of constrained task directions.
    pub fn dim(&self) -> usize {
        match self {
            TaskSpace::PlanarPosition => 2,
            TaskSpace::Position => 3,
            TaskSpace::PositionNormal => 5,
            TaskSpace::Full => 6,
        }
    }

    /// Project the 6 x n geometric Jacobian at `pose` into this task space.
    pub fn jacobian(&self, geometric: &DMatrix<f64>, pose: &TaskPose) -> DMatrix<f64> {
        let n = geometric.ncols();

        match self {
            TaskSpace::PlanarPosition => geometric.rows(0, 2).into_owned(),
            TaskSpace::Position => geometric.rows(0, 3).into_owned(),
            TaskSpace::Full => geometric.clone(),
            TaskSpace::PositionNormal => {
                let (u, v) = tilt_basis(&pose.normal());
                let jw = geometric.rows(3, 3);

                let mut jac = DMatrix::zeros(self.dim(), n);
                jac.rows_mut(0, 3).copy_from(&geometric.rows(0, 3));
                jac.row_mut(3).copy_from(&(u.transpose() * jw));
                jac.row_mut(4).copy_from(&(v.transpose() * jw));
                jac
            }
        }
    }

    /// Error `target - current` expressed in this task space.
    ///
    /// Rotational errors are axis-angle vectors, so a proportional correction
    /// through the task Jacobian rotates the paddle toward the target.
    pub fn error(&self, current: &TaskPose, target: &TaskPose) -> DVector<f64> {
        let dp = target.position - current.position;

        match self {
            TaskSpace::PlanarPosition => DVector::from_column_slice(&[dp.x, dp.y]),
            TaskSpace::Position => DVector::from_column_slice(dp.as_slice()),
            TaskSpace::PositionNormal => {
                let n = current.normal();
                let (u, v) = tilt_basis(&n);
                let w = normal_rotation(&n, &target.normal());

                DVector::from_column_slice(&[dp.x, dp.y, dp.z, u.dot(&w), v.dot(&w)])
            }
            TaskSpace::Full => {
                let w = (target.rotation * current.rotation.inverse()).scaled_axis();

                DVector::from_column_slice(&[dp.x, dp.y, dp.z, w.x, w.y, w.z])
            }
        }
    }

    /// Express a world frame paddle twist (linear velocity, angular velocity)
    /// at `pose` in this task space.
    pub fn twist(&self, linear: &Vector3<f64>, angular: &Vector3<f64>, pose: &TaskPose) -> DVector<f64> {
        match self {
            TaskSpace::PlanarPosition => DVector::from_column_slice(&[linear.x, linear.y]),
            TaskSpace::Position => DVector::from_column_slice(linear.as_slice()),
            TaskSpace::PositionNormal => {
                let (u, v) = tilt_basis(&pose.normal());

                DVector::from_column_slice(&[
                    linear.x,
                    linear.y,
                    linear.z,
                    u.dot(angular),
                    v.dot(angular),
                ])
            }
            TaskSpace::Full => DVector::from_column_slice(&[
                linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Two unit vectors spanning the plane perpendicular to `n`.
///
/// The basis is a deterministic function of `n`.
pub fn tilt_basis(n: &Unit<Vector3<f64>>) -> (Vector3<f64>, Vector3<f64>) {
    let reference = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };

    let u = n.cross(&reference).normalize();
    let v = n.cross(&u);

    (u, v)
}

/// Axis-angle vector of the shortest rotation taking `from` onto `to`.
///
/// For opposite vectors the rotation is about an arbitrary perpendicular axis.
pub fn normal_rotation(from: &Unit<Vector3<f64>>, to: &Unit<Vector3<f64>>) -> Vector3<f64> {
    let (from_v, to_v) = (from.into_inner(), to.into_inner());
    let cross = from_v.cross(&to_v);
    let sin = cross.norm();
    let angle = sin.atan2(from_v.dot(&to_v));

    if sin > PARALLEL_EPS {
        cross * (angle / sin)
    } else if angle > std::f64::consts::FRAC_PI_2 {
        tilt_basis(from).0 * angle
    } else {
        Vector3::zeros()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::KinematicChain;
    use crate::swing_ctrl::SwingCtrlParams;
    use crate::test_fixtures;
    use nalgebra::UnitQuaternion;

    const PARAMS_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../params/swing_ctrl.toml");

    /// Check that moving each joint changes the task error at the rate the
    /// task Jacobian predicts, with the target at the current pose.
    fn assert_jacobian_matches_error(chain: &KinematicChain, task: TaskSpace) {
        const H: f64 = 1e-6;

        let n = chain.num_joints();
        let offset = DVector::from_fn(n, |i, _| 0.3 * ((i as f64) * 1.3 + 0.4).sin());
        let (q, report) = chain
            .config(chain.rest_config().as_vector() + offset)
            .unwrap();
        assert!(report.is_clear());

        let target = chain.forward_kinematics(&q);
        let jac = task.jacobian(&chain.geometric_jacobian(&q), &target);
        assert_eq!(jac.shape(), (task.dim(), n));

        for j in 0..n {
            let mut step = DVector::zeros(n);
            step[j] = H;
            let (q_plus, _) = chain.config(q.as_vector() + &step).unwrap();
            let (q_minus, _) = chain.config(q.as_vector() - &step).unwrap();

            let e_plus = task.error(&chain.forward_kinematics(&q_plus), &target);
            let e_minus = task.error(&chain.forward_kinematics(&q_minus), &target);

            // The error is target - current, so it falls along the Jacobian
            let rate = (e_plus - e_minus) / (2.0 * H);
            let predicted = -jac.column(j);
            assert!(
                (&rate - &predicted).norm() < 1e-5,
                "joint {}: finite difference {} vs Jacobian {}",
                j,
                rate,
                predicted
            );
        }
    }

    fn pose(rpy: [f64; 3]) -> TaskPose {
        TaskPose::new(
            Vector3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
        )
    }

    #[test]
    fn test_tilt_basis() {
        for n in [Vector3::x(), Vector3::z(), Vector3::new(0.3, -0.4, 0.8)].iter() {
            let n_unit = Unit::new_normalize(*n);
            let (u, v) = tilt_basis(&n_unit);
            let n = n_unit.into_inner();

            assert!((u.norm() - 1.0).abs() < 1e-12);
            assert!((v.norm() - 1.0).abs() < 1e-12);
            assert!(u.dot(&n).abs() < 1e-12);
            assert!(v.dot(&n).abs() < 1e-12);
            assert!(u.dot(&v).abs() < 1e-12);
        }
    }

    #[test]
    fn test_normal_error_ignores_spin() {
        // Spinning the paddle about its own normal leaves the normal error at
        // zero, but not the full orientation error.
        let current = pose([0.2, -0.1, 0.0]);
        let spin = UnitQuaternion::from_axis_angle(&current.normal(), 0.7);
        let target = TaskPose::new(current.position, spin * current.rotation);

        let err = TaskSpace::PositionNormal.error(&current, &target);
        assert!(err.norm() < 1e-9);

        let err = TaskSpace::Full.error(&current, &target);
        assert!((err.norm() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_normal_rotation() {
        let from = Unit::new_normalize(Vector3::z());
        let to = Unit::new_normalize(Vector3::new(0.0, 1.0, 1.0));

        let w = normal_rotation(&from, &to);
        let rotated = UnitQuaternion::from_scaled_axis(w) * from.into_inner();
        assert!((rotated - to.into_inner()).norm() < 1e-12);

        let back = Unit::new_normalize(-Vector3::z());
        let w = normal_rotation(&from, &back);
        assert!((w.norm() - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_jacobian_matches_error() {
        let spatial = test_fixtures::spatial_arm();
        for task in [TaskSpace::Position, TaskSpace::PositionNormal, TaskSpace::Full].iter() {
            assert_jacobian_matches_error(&spatial, *task);
        }

        let params: SwingCtrlParams = util::params::load_from_path(PARAMS_PATH).unwrap();
        let deployed = KinematicChain::new(&params.chain).unwrap();
        for task in [TaskSpace::PositionNormal, TaskSpace::Full].iter() {
            assert_jacobian_matches_error(&deployed, *task);
        }
    }
}
