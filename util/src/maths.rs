//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(value: T) -> T
where
    T: Float,
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t = pi_t + pi_t;

    rem_euclid(value + pi_t, tau_t) - pi_t
}

/// Position and velocity at time `t` of the cubic which starts at `p0` with
/// velocity `v0` and reaches `p1` with velocity `v1` after `duration`.
///
/// `t` is clamped into `[0, duration]`. A non-positive duration returns the
/// end state.
pub fn cubic_hermite(p0: f64, v0: f64, p1: f64, v1: f64, duration: f64, t: f64) -> (f64, f64) {
    if !(duration > 0.0) {
        return (p1, v1);
    }

    let (a2, a3) = cubic_coeffs(p0, v0, p1, v1, duration);
    let s = t.max(0.0).min(duration);

    (
        p0 + v0 * s + a2 * s * s + a3 * s * s * s,
        v0 + 2.0 * a2 * s + 3.0 * a3 * s * s,
    )
}

/// Largest absolute velocity reached by the cubic described in
/// `cubic_hermite`.
pub fn cubic_hermite_peak_speed(p0: f64, v0: f64, p1: f64, v1: f64, duration: f64) -> f64 {
    if !(duration > 0.0) {
        return v1.abs();
    }

    let (a2, a3) = cubic_coeffs(p0, v0, p1, v1, duration);
    let mut peak = v0.abs().max(v1.abs());

    // Velocity is a parabola, check its vertex if it lies inside the segment
    if a3 != 0.0 {
        let s = -a2 / (3.0 * a3);
        if s > 0.0 && s < duration {
            peak = peak.max((v0 + 2.0 * a2 * s + 3.0 * a3 * s * s).abs());
        }
    }

    peak
}

fn cubic_coeffs(p0: f64, v0: f64, p1: f64, v1: f64, duration: f64) -> (f64, f64) {
    let d = p1 - p0;
    let a2 = (3.0 * d - (2.0 * v0 + v1) * duration) / (duration * duration);
    let a3 = (-2.0 * d + (v0 + v1) * duration) / (duration * duration * duration);

    (a2, a3)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wrap_pi() {
        const PI: f64 = std::f64::consts::PI;

        assert!((wrap_pi(0.5f64) - 0.5).abs() < 1e-12);
        assert!((wrap_pi(-0.5f64) + 0.5).abs() < 1e-12);
        assert!((wrap_pi(PI + 0.5) - (-PI + 0.5)).abs() < 1e-12);
        assert!((wrap_pi(-PI - 0.5) - (PI - 0.5)).abs() < 1e-12);
        assert!((wrap_pi(4.0 * PI + 0.25) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cubic_hermite() {
        // Boundary conditions
        assert_eq!(cubic_hermite(1.0, 0.5, 3.0, -1.0, 2.0, 0.0), (1.0, 0.5));
        let (p, v) = cubic_hermite(1.0, 0.5, 3.0, -1.0, 2.0, 2.0);
        assert!((p - 3.0).abs() < 1e-12);
        assert!((v + 1.0).abs() < 1e-12);

        // Rest to rest peaks at the midpoint with 1.5 times the mean speed
        let (p, v) = cubic_hermite(0.0, 0.0, 2.0, 0.0, 2.0, 1.0);
        assert!((p - 1.0).abs() < 1e-12);
        assert!((v - 1.5).abs() < 1e-12);
        assert!((cubic_hermite_peak_speed(0.0, 0.0, 2.0, 0.0, 2.0) - 1.5).abs() < 1e-12);

        // Monotonic velocity peaks at an end
        assert!((cubic_hermite_peak_speed(0.0, 1.0, 1.0, 1.0, 1.0) - 1.0).abs() < 1e-12);
    }
}
