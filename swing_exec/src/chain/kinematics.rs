//! Forward kinematics and the geometric Jacobian

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector, Isometry3, Unit, UnitQuaternion, Vector3};
use serde::Serialize;

// Internal
use super::{ChainConfig, ChainError, ChainParams, Joint, JointType, LimitReport};
use util::maths::rem_euclid;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The kinematic chain of the arm.
///
/// Built once from `ChainParams` and immutable afterwards. All kinematic
/// functions are pure functions of the configuration passed in.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<Joint>,

    tool_tf: Isometry3<f64>,

    rest: ChainConfig,
}

/// Pose of the paddle reference point in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TaskPose {
    /// Units: meters
    pub position: Vector3<f64>,

    pub rotation: UnitQuaternion<f64>,
}

/// World frame origin and axis of every joint, plus the paddle pose, at a
/// single configuration.
#[derive(Debug, Clone)]
pub struct ChainFrames {
    pub origins: Vec<Vector3<f64>>,

    pub axes: Vec<Unit<Vector3<f64>>>,

    pub tool: Isometry3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TaskPose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Unit normal of the paddle face (the tool frame z axis).
    pub fn normal(&self) -> Unit<Vector3<f64>> {
        Unit::new_unchecked(self.rotation * Vector3::z())
    }
}

impl KinematicChain {
    /// Build and validate a chain from its description.
    pub fn new(params: &ChainParams) -> Result<Self, ChainError> {
        if params.joints.is_empty() {
            return Err(ChainError::InvalidDescription(String::from(
                "the chain must have at least one joint",
            )));
        }

        let joints = params
            .joints
            .iter()
            .enumerate()
            .map(|(i, d)| Joint::from_desc(i, d))
            .collect::<Result<Vec<_>, _>>()?;

        if params.rest_pos.len() != joints.len() {
            return Err(ChainError::InvalidDescription(format!(
                "rest position has {} values for {} joints",
                params.rest_pos.len(),
                joints.len()
            )));
        }

        let mut chain = Self {
            joints,
            tool_tf: params.tool.isometry(),
            rest: ChainConfig(DVector::zeros(0)),
        };

        let (rest, report) = chain.config(DVector::from_column_slice(&params.rest_pos))?;
        if !report.is_clear() {
            return Err(ChainError::InvalidDescription(format!(
                "rest position is outside the limits of joint(s) {:?}",
                report.pos_limited
            )));
        }
        chain.rest = rest;

        Ok(chain)
    }

    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// The ready configuration.
    pub fn rest_config(&self) -> &ChainConfig {
        &self.rest
    }

    /// Velocity limit of every joint.
    pub fn max_vel(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.joints.len(),
            self.joints.iter().map(|j| j.limits.max_vel),
        )
    }

    /// Build a configuration from raw joint values.
    ///
    /// Continuous joints are wrapped into their range, all other values
    /// outside the position limits are saturated and reported.
    pub fn config(&self, values: DVector<f64>) -> Result<(ChainConfig, LimitReport), ChainError> {
        self.check_dims(values.len())?;

        let mut values = values;
        let mut report = LimitReport::default();

        for (joint, value) in self.joints.iter().zip(values.iter_mut()) {
            if joint.is_continuous() {
                *value = joint.limits.min_pos
                    + rem_euclid(*value - joint.limits.min_pos, std::f64::consts::TAU);
            }

            let (clamped, limited) = joint.clamp_pos(*value);
            if limited {
                trace!(
                    "Joint {} position {:.4} clamped to {:.4}",
                    joint.name,
                    *value,
                    clamped
                );
                report.pos_limited.push(joint.index);
            }
            *value = clamped;
        }

        Ok((ChainConfig(values), report))
    }

    /// Saturate positions and velocities at the joint limits.
    ///
    /// Violations are returned in the report rather than dropped, so callers
    /// can decide whether the clamped result is acceptable.
    pub fn clamp_to_limits(
        &self,
        q: DVector<f64>,
        qd: DVector<f64>,
    ) -> Result<(ChainConfig, DVector<f64>, LimitReport), ChainError> {
        self.check_dims(qd.len())?;

        let (config, mut report) = self.config(q)?;

        let mut qd = qd;
        for (joint, vel) in self.joints.iter().zip(qd.iter_mut()) {
            let (clamped, limited) = joint.clamp_vel(*vel);
            if limited {
                report.vel_limited.push(joint.index);
            }
            *vel = clamped;
        }

        Ok((config, qd, report))
    }

    /// Difference `to - from` per joint, taking the short way round for
    /// continuous joints.
    pub fn joint_delta(&self, from: &ChainConfig, to: &ChainConfig) -> DVector<f64> {
        let mut delta = &to.0 - &from.0;

        for (joint, d) in self.joints.iter().zip(delta.iter_mut()) {
            if joint.is_continuous() {
                *d = util::maths::wrap_pi(*d);
            }
        }

        delta
    }

    /// Pose of the paddle at the given configuration.
    pub fn forward_kinematics(&self, q: &ChainConfig) -> TaskPose {
        let mut tf = Isometry3::identity();

        for (joint, &value) in self.joints.iter().zip(q.0.iter()) {
            tf *= joint.local_tf(value);
        }

        tf *= self.tool_tf;

        TaskPose::new(tf.translation.vector, tf.rotation)
    }

    /// World origins and axes of every joint at the given configuration.
    pub fn frames(&self, q: &ChainConfig) -> ChainFrames {
        let mut tf = Isometry3::identity();
        let mut origins = Vec::with_capacity(self.joints.len());
        let mut axes = Vec::with_capacity(self.joints.len());

        for (joint, &value) in self.joints.iter().zip(q.0.iter()) {
            let joint_frame = tf * joint.parent_tf;

            origins.push(joint_frame.translation.vector);
            axes.push(Unit::new_normalize(joint_frame.rotation * joint.axis.into_inner()));

            tf = tf * joint.local_tf(value);
        }

        ChainFrames {
            origins,
            axes,
            tool: tf * self.tool_tf,
        }
    }

    /// The 6 x n geometric Jacobian of the paddle reference point, linear
    /// velocity rows first then angular velocity rows.
    pub fn geometric_jacobian(&self, q: &ChainConfig) -> DMatrix<f64> {
        let frames = self.frames(q);
        let p_tip = frames.tool.translation.vector;

        let mut jac = DMatrix::zeros(6, self.joints.len());

        for (i, joint) in self.joints.iter().enumerate() {
            let a = frames.axes[i].into_inner();

            match joint.joint_type {
                JointType::Revolute => {
                    let lin = a.cross(&(p_tip - frames.origins[i]));
                    jac.fixed_view_mut::<3, 1>(0, i).copy_from(&lin);
                    jac.fixed_view_mut::<3, 1>(3, i).copy_from(&a);
                }
                JointType::Prismatic => {
                    jac.fixed_view_mut::<3, 1>(0, i).copy_from(&a);
                }
            }
        }

        jac
    }

    fn check_dims(&self, found: usize) -> Result<(), ChainError> {
        if found != self.joints.len() {
            Err(ChainError::DimensionMismatch {
                expected: self.joints.len(),
                found,
            })
        } else {
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check the conditioning of a Jacobian from its singular values, returning
/// the smallest one if it is not below `threshold`.
///
/// A Jacobian without singular values is treated as fully singular.
pub fn check_conditioning(
    singular_values: &DVector<f64>,
    threshold: f64,
) -> Result<f64, ChainError> {
    let sigma_min = singular_values
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let sigma_min = if sigma_min.is_finite() { sigma_min } else { 0.0 };

    if sigma_min < threshold {
        Err(ChainError::KinematicSingularity { sigma_min })
    } else {
        Ok(sigma_min)
    }
}
