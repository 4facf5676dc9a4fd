//! # Ball simulation
//!
//! Flies balls launched by telecommand under gravity and publishes their
//! state each cycle, standing in for the ball state estimator. A ball which
//! is struck leaves the paddle with the velocity the strike was planned for.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};
use nalgebra::Vector3;

use crate::params::BallSimParams;
use comms_if::eqpt::ball::{BallLaunch, BallState};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Ballistic simulation of a single ball.
pub struct BallSim {
    gravity: Vector3<f64>,
    step_s: f64,
    floor_height_m: f64,

    ball: Option<SimBall>,
}

struct SimBall {
    position: Vector3<f64>,
    velocity: Vector3<f64>,

    /// Units: seconds, exec time
    time_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BallSim {
    pub fn new(params: &BallSimParams) -> Self {
        Self {
            gravity: Vector3::from(params.gravity_mss),
            step_s: params.step_s,
            floor_height_m: params.floor_height_m,
            ball: None,
        }
    }

    /// Throw a new ball, replacing any ball already in flight.
    pub fn launch(&mut self, launch: &BallLaunch, time_s: f64) {
        info!(
            "Ball launched from {:?} at {:?} m/s",
            launch.position_m, launch.velocity_ms
        );

        self.ball = Some(SimBall {
            position: Vector3::from(launch.position_m),
            velocity: Vector3::from(launch.velocity_ms),
            time_s,
        });
    }

    /// Give the ball a new velocity, as the paddle does on impact.
    pub fn deflect(&mut self, velocity_ms: [f64; 3]) {
        if let Some(ref mut ball) = self.ball {
            debug!("Ball deflected to {:?} m/s", velocity_ms);
            ball.velocity = Vector3::from(velocity_ms);
        }
    }

    /// Advance the ball to `time_s` and return its state.
    ///
    /// The flight is integrated in whole steps, so the snapshot is timestamped
    /// at the last step before `time_s`. Returns `None` if there is no ball in
    /// flight.
    pub fn step(&mut self, time_s: f64) -> Option<BallState> {
        let ball = self.ball.as_mut()?;

        while ball.time_s + self.step_s <= time_s + 1e-9 {
            ball.position += ball.velocity * self.step_s;
            ball.velocity += self.gravity * self.step_s;
            ball.time_s += self.step_s;
        }

        if ball.position.z < self.floor_height_m {
            info!("Ball landed at {:.3} s", ball.time_s);
            self.ball = None;
            return None;
        }

        Some(BallState {
            position_m: ball.position.into(),
            velocity_ms: ball.velocity.into(),
            timestamp_s: ball.time_s,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hit_planner::{BallPredictor, BallisticPredictor};

    fn params() -> BallSimParams {
        BallSimParams {
            gravity_mss: [0.0, 0.0, -9.82],
            step_s: 0.01,
            floor_height_m: 0.0,
        }
    }

    #[test]
    fn test_flight_matches_prediction() {
        let mut sim = BallSim::new(&params());
        let launch = BallLaunch {
            position_m: [2.0, 0.1, 1.0],
            velocity_ms: [-3.0, 0.0, 1.5],
        };
        sim.launch(&launch, 0.0);

        let first = sim.step(0.0).unwrap();
        assert_eq!(first.position_m, launch.position_m);

        let predicted = BallisticPredictor::new(params().gravity_mss, 0.01).predict(&first, 1.0);

        let state = sim.step(0.3).unwrap();
        let sample = &predicted[29];
        assert!((state.timestamp_s - sample.time_s).abs() < 1e-9);
        assert!((Vector3::from(state.position_m) - sample.position).norm() < 1e-9);
        assert!((Vector3::from(state.velocity_ms) - sample.velocity).norm() < 1e-9);
    }

    #[test]
    fn test_deflect_and_land() {
        let mut sim = BallSim::new(&params());
        sim.launch(
            &BallLaunch {
                position_m: [0.0, 0.0, 1.0],
                velocity_ms: [0.0, 0.0, 0.0],
            },
            0.0,
        );

        sim.step(0.1);
        sim.deflect([0.0, 1.0, 2.0]);
        let state = sim.step(0.11).unwrap();
        assert!((state.velocity_ms[1] - 1.0).abs() < 1e-12);
        assert!(state.velocity_ms[2] < 2.0);

        // Falls through the floor and is removed, a late strike cannot
        // bring it back
        assert!(sim.step(5.0).is_none());
        sim.deflect([0.0, 0.0, 5.0]);
        assert!(sim.step(5.1).is_none());
    }
}
