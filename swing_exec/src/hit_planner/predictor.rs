//! Ball trajectory prediction

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::Serialize;

use comms_if::eqpt::ball::BallState;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Predicts the future states of the ball from a snapshot.
pub trait BallPredictor {
    /// Predicted samples from just after the snapshot up to `horizon_s`
    /// after it, in time order.
    fn predict(&self, ball: &BallState, horizon_s: f64) -> Vec<BallSample>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A predicted ball state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BallSample {
    /// Units: seconds, exec time
    pub time_s: f64,

    /// Units: meters
    pub position: Vector3<f64>,

    /// Units: meters/second
    pub velocity: Vector3<f64>,
}

/// Drag free flight under gravity.
#[derive(Debug, Clone)]
pub struct BallisticPredictor {
    /// Units: meters/second^2
    pub gravity: Vector3<f64>,

    /// Units: seconds
    pub step_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BallisticPredictor {
    pub fn new(gravity_mss: [f64; 3], step_s: f64) -> Self {
        Self {
            gravity: Vector3::from(gravity_mss),
            step_s,
        }
    }
}

impl BallPredictor for BallisticPredictor {
    fn predict(&self, ball: &BallState, horizon_s: f64) -> Vec<BallSample> {
        if !(self.step_s > 0.0) || !(horizon_s > 0.0) {
            return Vec::new();
        }

        let num_steps = (horizon_s / self.step_s + 1e-9).floor() as usize;
        let mut samples = Vec::with_capacity(num_steps);

        let mut position = Vector3::from(ball.position_m);
        let mut velocity = Vector3::from(ball.velocity_ms);

        for k in 1..=num_steps {
            position += velocity * self.step_s;
            velocity += self.gravity * self.step_s;

            samples.push(BallSample {
                time_s: ball.timestamp_s + k as f64 * self.step_s,
                position,
                velocity,
            });
        }

        samples
    }
}
