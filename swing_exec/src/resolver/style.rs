//! Strike styles and secondary objectives

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::ResolverError;
use crate::chain::{ChainConfig, KinematicChain};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Objective pursued in the null space of the primary task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SecondaryObjective {
    /// No secondary motion.
    None,

    /// Pull toward a preferred configuration, the chain's ready configuration
    /// if `q_rest` is not given.
    RestPose {
        #[serde(default)]
        q_rest: Option<Vec<f64>>,
    },

    /// Pull every joint toward the middle of its range.
    JointCentering,
}

/// How the arm should use its redundancy during a swing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeStyle {
    /// Per-joint weights. A higher weight makes the resolver use a joint less.
    /// All joints are weighted equally if not given.
    #[serde(default)]
    pub joint_weights: Option<Vec<f64>>,

    /// Gain applied to the secondary objective gradient.
    ///
    /// Units: 1/second
    pub secondary_gain: f64,

    pub secondary: SecondaryObjective,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for StrikeStyle {
    fn default() -> Self {
        Self {
            joint_weights: None,
            secondary_gain: 1.0,
            secondary: SecondaryObjective::RestPose { q_rest: None },
        }
    }
}

impl SecondaryObjective {
    /// Gradient of the objective at `q`, as a joint velocity direction.
    pub fn gradient(
        &self,
        chain: &KinematicChain,
        q: &ChainConfig,
    ) -> Result<Option<DVector<f64>>, ResolverError> {
        match self {
            SecondaryObjective::None => Ok(None),
            SecondaryObjective::RestPose { q_rest: None } => {
                Ok(Some(chain.joint_delta(q, chain.rest_config())))
            }
            SecondaryObjective::RestPose { q_rest: Some(q_rest) } => {
                if q_rest.len() != chain.num_joints() {
                    return Err(ResolverError::DimensionMismatch {
                        what: "rest pose",
                        expected: chain.num_joints(),
                        found: q_rest.len(),
                    });
                }

                // Rest poses outside the limits are pulled toward their
                // clamped value.
                let (rest, _) = chain.config(DVector::from_column_slice(q_rest))?;
                Ok(Some(chain.joint_delta(q, &rest)))
            }
            SecondaryObjective::JointCentering => {
                let grad = chain
                    .joints()
                    .iter()
                    .zip(q.as_slice().iter())
                    .map(|(joint, &value)| {
                        let half_range = 0.5 * (joint.limits.max_pos - joint.limits.min_pos);
                        if half_range > 0.0 {
                            (joint.centre_pos() - value) / (half_range * half_range)
                        } else {
                            0.0
                        }
                    });

                Ok(Some(DVector::from_iterator(chain.num_joints(), grad)))
            }
        }
    }
}

impl StrikeStyle {
    /// Joint weights for a chain of `num_joints` joints.
    pub fn weights(&self, num_joints: usize) -> Result<DVector<f64>, ResolverError> {
        match &self.joint_weights {
            None => Ok(DVector::from_element(num_joints, 1.0)),
            Some(w) => {
                if w.len() != num_joints {
                    return Err(ResolverError::DimensionMismatch {
                        what: "joint weights",
                        expected: num_joints,
                        found: w.len(),
                    });
                }
                if let Some(bad) = w.iter().find(|&&v| !(v > 0.0) || !v.is_finite()) {
                    return Err(ResolverError::InvalidWeight(*bad));
                }

                Ok(DVector::from_column_slice(w))
            }
        }
    }

    /// The secondary term `z` to project into the null space, or `None` if
    /// the style has no secondary objective.
    pub fn secondary_term(
        &self,
        chain: &KinematicChain,
        q: &ChainConfig,
    ) -> Result<Option<DVector<f64>>, ResolverError> {
        if self.secondary_gain == 0.0 {
            return Ok(None);
        }

        Ok(self
            .secondary
            .gradient(chain, q)?
            .map(|g| g * self.secondary_gain))
    }
}
