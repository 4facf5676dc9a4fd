//! # Resolver module
//!
//! Maps a task space velocity onto joint velocities for a redundant arm.
//!
//! The primary task is resolved with a weighted, damped pseudoinverse of the
//! task Jacobian. Damping is only applied close to singular configurations,
//! keeping the joint velocities bounded at the cost of some tracking error.
//! A secondary objective is projected into the null space of the Jacobian so
//! that it never disturbs the primary task. The projector is built from the
//! undamped row space of the Jacobian, damping only affects the primary task.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod style;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

// Internal
use crate::chain::{check_conditioning, ChainError};
pub use params::*;
pub use style::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Denominators of the pseudoinverse below this are treated as zero.
const PINV_EPS: f64 = 1e-12;

/// Singular values below this are rank deficient directions of the Jacobian
/// and do not belong to its row space.
const RANK_EPS: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Redundancy resolver.
#[derive(Debug, Clone)]
pub struct Resolver {
    params: ResolverParams,
}

/// A weighted, damped pseudoinverse and the conditioning it was computed at.
#[derive(Debug, Clone)]
pub struct Pinv {
    /// The n x m pseudoinverse.
    pub matrix: DMatrix<f64>,

    /// The n x n weighted null space projector `I - J^# J`, where `J^#` is
    /// the undamped pseudoinverse truncated to the rank of the Jacobian.
    pub null_projector: DMatrix<f64>,

    /// Smallest singular value of the weighted Jacobian.
    pub sigma_min: f64,

    /// Damping factor used, zero away from singularities.
    pub damping: f64,

    /// Set if the weighted Jacobian is ill-conditioned.
    pub singularity: Option<ChainError>,
}

/// Result of resolving a task velocity.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    /// Total joint velocity, after clipping if limits were given.
    pub qd: DVector<f64>,

    /// Component achieving the primary task, before clipping.
    pub qd_primary: DVector<f64>,

    /// Null space component from the secondary objective, before clipping.
    pub qd_secondary: DVector<f64>,

    /// Smallest singular value of the weighted Jacobian.
    pub sigma_min: f64,

    /// Damping factor used.
    pub damping: f64,

    /// `ChainError::KinematicSingularity` if the configuration was singular
    /// and damping was applied.
    #[serde(skip)]
    pub singularity: Option<ChainError>,

    /// Uniform scale applied to stay within the velocity limits, one if no
    /// clipping was needed.
    pub clip_scale: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during resolution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolverError {
    #[error("Expected {expected} values for the {what} but found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Joint weights must be positive and finite, found {0}")]
    InvalidWeight(f64),

    #[error("Singular value decomposition of the Jacobian failed")]
    DecompositionFailed,

    #[error("Chain error: {0}")]
    ChainError(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Resolver {
    pub fn new(params: ResolverParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ResolverParams {
        &self.params
    }

    /// Compute the weighted, damped pseudoinverse of `jac`.
    ///
    /// With `W` the diagonal weight matrix this is
    /// `W^-1/2 (J W^-1/2)^+`, where the inner pseudoinverse is computed from
    /// the SVD with damped inverse singular values `s / (s^2 + l^2)`.
    pub fn weighted_pinv(
        &self,
        jac: &DMatrix<f64>,
        weights: &DVector<f64>,
    ) -> Result<Pinv, ResolverError> {
        let (m, n) = jac.shape();

        if weights.len() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "joint weights",
                expected: n,
                found: weights.len(),
            });
        }
        if let Some(bad) = weights.iter().find(|&&w| !(w > 0.0) || !w.is_finite()) {
            return Err(ResolverError::InvalidWeight(*bad));
        }

        let w_inv_sqrt = weights.map(|w| 1.0 / w.sqrt());

        let mut jac_w = jac.clone();
        for (mut col, s) in jac_w.column_iter_mut().zip(w_inv_sqrt.iter()) {
            col *= *s;
        }

        let svd = jac_w.svd(true, true);
        let u = svd.u.as_ref().ok_or(ResolverError::DecompositionFailed)?;
        let v_t = svd.v_t.as_ref().ok_or(ResolverError::DecompositionFailed)?;

        // Only the first min(m, n) singular values exist, for a redundant arm
        // the smallest one measures the distance to a rank drop.
        let (sigma_min, singularity) =
            match check_conditioning(&svd.singular_values, self.params.singular_threshold) {
                Ok(s) => (s, None),
                Err(ChainError::KinematicSingularity { sigma_min }) => (
                    sigma_min,
                    Some(ChainError::KinematicSingularity { sigma_min }),
                ),
                Err(e) => return Err(e.into()),
            };

        let damping = self.damping(sigma_min);
        let damping_sq = damping * damping;

        let inv_sv = svd.singular_values.map(|s| {
            let denom = s * s + damping_sq;
            if denom < PINV_EPS {
                0.0
            } else {
                s / denom
            }
        });

        let pinv_w = v_t.transpose() * DMatrix::from_diagonal(&inv_sv) * u.transpose();

        let mut matrix = pinv_w;
        for (mut row, s) in matrix.row_iter_mut().zip(w_inv_sqrt.iter()) {
            row *= *s;
        }

        debug_assert_eq!(matrix.shape(), (n, m));

        // Projector onto the row space of the weighted Jacobian, from the
        // right singular vectors of its non-zero singular values.
        let mut row_space = DMatrix::<f64>::zeros(n, n);
        for (v, s) in v_t.row_iter().zip(svd.singular_values.iter()) {
            if *s > RANK_EPS {
                row_space += v.transpose() * v;
            }
        }

        // Back to joint space, N = W^-1/2 (I - V V^T) W^1/2
        let mut null_projector = DMatrix::identity(n, n) - row_space;
        for (mut row, s) in null_projector.row_iter_mut().zip(w_inv_sqrt.iter()) {
            row *= *s;
        }
        for (mut col, s) in null_projector.column_iter_mut().zip(w_inv_sqrt.iter()) {
            col /= *s;
        }

        Ok(Pinv {
            matrix,
            null_projector,
            sigma_min,
            damping,
            singularity,
        })
    }

    /// Resolve the task velocity `xd` into joint velocities.
    ///
    /// `z` is the secondary joint velocity to be projected into the null
    /// space of `jac`.
    ///
    /// If `max_vel` is given the result is scaled uniformly so that no joint
    /// exceeds it. Commanded velocities must always be limited. Only callers
    /// which check the limits themselves, such as the hit planner's impact
    /// velocity, pass `None`.
    pub fn resolve(
        &self,
        jac: &DMatrix<f64>,
        xd: &DVector<f64>,
        z: Option<&DVector<f64>>,
        weights: &DVector<f64>,
        max_vel: Option<&DVector<f64>>,
    ) -> Result<Resolution, ResolverError> {
        let (m, n) = jac.shape();

        if xd.len() != m {
            return Err(ResolverError::DimensionMismatch {
                what: "task velocity",
                expected: m,
                found: xd.len(),
            });
        }

        let pinv = self.weighted_pinv(jac, weights)?;
        let qd_primary = &pinv.matrix * xd;

        let qd_secondary = match z {
            Some(z) => {
                if z.len() != n {
                    return Err(ResolverError::DimensionMismatch {
                        what: "secondary term",
                        expected: n,
                        found: z.len(),
                    });
                }
                &pinv.null_projector * z
            }
            None => DVector::zeros(n),
        };

        let qd = &qd_primary + &qd_secondary;
        let (qd, clip_scale) = match max_vel {
            Some(max) => {
                if max.len() != n {
                    return Err(ResolverError::DimensionMismatch {
                        what: "velocity limits",
                        expected: n,
                        found: max.len(),
                    });
                }
                clip_uniform(&qd, max)
            }
            None => (qd, 1.0),
        };

        Ok(Resolution {
            qd,
            qd_primary,
            qd_secondary,
            sigma_min: pinv.sigma_min,
            damping: pinv.damping,
            singularity: pinv.singularity,
            clip_scale,
        })
    }

    /// Damping factor for the given smallest singular value.
    fn damping(&self, sigma_min: f64) -> f64 {
        let threshold = self.params.singular_threshold;

        if sigma_min >= threshold || threshold <= 0.0 {
            0.0
        } else {
            let ratio = sigma_min / threshold;
            self.params.max_damping * (1.0 - ratio * ratio).sqrt()
        }
    }
}

impl Resolution {
    pub fn is_singular(&self) -> bool {
        self.singularity.is_some()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale `qd` uniformly so that `|qd_i| <= max_i` for every joint.
///
/// Returns the scaled vector and the scale applied. Scaling the whole vector
/// keeps its direction, so the task space direction of motion is unchanged.
pub fn clip_uniform(qd: &DVector<f64>, max: &DVector<f64>) -> (DVector<f64>, f64) {
    let scale = qd
        .iter()
        .zip(max.iter())
        .filter(|(v, _)| v.abs() > 0.0)
        .map(|(v, m)| m.abs() / v.abs())
        .fold(1.0f64, f64::min);

    (qd * scale, scale)
}
