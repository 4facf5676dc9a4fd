//! Chain configuration and limit reporting

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DVector;
use serde::Serialize;

use super::ChainError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The position of every joint in the chain.
///
/// A configuration can only be built by `KinematicChain::config`, so its
/// length always matches the chain and every element is within its joint's
/// position limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainConfig(pub(super) DVector<f64>);

/// Joints which had to be saturated while building a configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LimitReport {
    /// Indices of joints whose position was clamped.
    pub pos_limited: Vec<usize>,

    /// Indices of joints whose velocity was clamped.
    pub vel_limited: Vec<usize>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ChainConfig {
    /// Joint positions as a vector.
    ///
    /// Units: radians or meters, per joint
    pub fn as_vector(&self) -> &DVector<f64> {
        &self.0
    }

    pub fn as_slice(&self) -> &[f64] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.iter().copied().collect()
    }
}

impl LimitReport {
    /// True if no joint was saturated.
    pub fn is_clear(&self) -> bool {
        self.pos_limited.is_empty() && self.vel_limited.is_empty()
    }

    /// Combine with another report, keeping each joint index once.
    pub fn merge(&mut self, other: &LimitReport) {
        for &i in other.pos_limited.iter() {
            if !self.pos_limited.contains(&i) {
                self.pos_limited.push(i);
            }
        }
        for &i in other.vel_limited.iter() {
            if !self.vel_limited.contains(&i) {
                self.vel_limited.push(i);
            }
        }
    }

    /// Convert the report into an error for callers which must not accept a
    /// saturated result.
    pub fn into_result(self) -> Result<(), ChainError> {
        if self.is_clear() {
            return Ok(());
        }

        let mut joints = self.pos_limited;
        for i in self.vel_limited {
            if !joints.contains(&i) {
                joints.push(i);
            }
        }
        joints.sort_unstable();

        Err(ChainError::JointLimitViolation(joints))
    }
}
