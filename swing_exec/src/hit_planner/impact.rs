//! Impact conditions
//!
//! Given the ball state at the interception point and the point it should be
//! returned to, these functions work out the paddle orientation and velocity
//! needed at impact. The paddle is modelled as a perfectly elastic plane, so
//! the change in ball velocity is along the paddle normal.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::Serialize;

use crate::chain::tilt_basis;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const DEGENERATE_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paddle state needed at impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImpactConditions {
    /// Ball velocity after impact.
    ///
    /// Units: meters/second
    pub ball_velocity_out: Vector3<f64>,

    /// Orientation of the paddle, the z axis is the paddle normal.
    pub rotation: UnitQuaternion<f64>,

    /// Paddle speed along the normal.
    ///
    /// Units: meters/second
    pub normal_speed_ms: f64,

    /// Unit axis in the paddle plane along which the paddle speed does not
    /// affect the return.
    pub free_axis: Unit<Vector3<f64>>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Ball velocity needed at `position` to land on `goal` after `flight_time_s`.
pub fn return_velocity(
    position: &Vector3<f64>,
    goal: &Vector3<f64>,
    gravity: &Vector3<f64>,
    flight_time_s: f64,
) -> Vector3<f64> {
    (goal - position - gravity * (0.5 * flight_time_s * flight_time_s)) / flight_time_s
}

/// Orientation whose z axis is `normal`.
///
/// The y axis is kept as close to world y as possible, falling back to world x
/// when the normal is along world y.
pub fn paddle_frame(normal: &Unit<Vector3<f64>>) -> UnitQuaternion<f64> {
    let z = normal.into_inner();

    let guess = if z.cross(&Vector3::y()).norm() > DEGENERATE_EPS {
        Vector3::y()
    } else {
        Vector3::x()
    };

    let x = guess.cross(&z).normalize();
    let y = z.cross(&x);

    let rot = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    UnitQuaternion::from_rotation_matrix(&rot)
}

/// Work out the impact conditions, or `None` if the incoming and outgoing
/// velocities are equal and no normal can be found.
pub fn impact_conditions(
    position: &Vector3<f64>,
    velocity_in: &Vector3<f64>,
    goal: &Vector3<f64>,
    gravity: &Vector3<f64>,
    flight_time_s: f64,
) -> Option<ImpactConditions> {
    if !(flight_time_s > 0.0) {
        return None;
    }

    let velocity_out = return_velocity(position, goal, gravity, flight_time_s);

    let normal = Unit::try_new(velocity_out - velocity_in, DEGENERATE_EPS)?;
    let normal_speed_ms = 0.5 * normal.dot(&(velocity_in + velocity_out));

    // The free axis follows the tangential part of the incoming velocity
    let tangential = velocity_in - normal.into_inner() * normal.dot(velocity_in);
    let free_axis = Unit::try_new(tangential, DEGENERATE_EPS)
        .unwrap_or_else(|| Unit::new_normalize(tilt_basis(&normal).0));

    Some(ImpactConditions {
        ball_velocity_out: velocity_out,
        rotation: paddle_frame(&normal),
        normal_speed_ms,
        free_axis,
    })
}
