use crate::kinematic_traits::Position;

/// Radius (meters) below which a point is treated as lying at the origin.
const MIN_RADIUS: f64 = 1e-6;

/// Angle between directions below which spherical interpolation is not worth it.
const MIN_ANGLE: f64 = std::f64::consts::PI / 180.0;

/// Linear interpolation between two positions, `t` in 0.0 to 1.0.
pub fn lerp(from: &Position, to: &Position, t: f64) -> Position {
    from * (1.0 - t) + to * t
}

/// Spherical interpolation of a single position. Directions (as seen from the origin)
/// are interpolated along the great circle, distances from the origin linearly.
/// Falls back to `lerp` when a point lies at the origin, the directions are nearly the
/// same, or they are opposite.
pub fn slerp_at(from: &Position, to: &Position, t: f64) -> Position {
    let r1 = from.norm();
    let r2 = to.norm();
    if r1 < MIN_RADIUS || r2 < MIN_RADIUS {
        return lerp(from, to, t);
    }

    let u1 = from / r1;
    let u2 = to / r2;
    let omega = u1.dot(&u2).clamp(-1.0, 1.0).acos();
    let sin_omega = omega.sin();
    if omega < MIN_ANGLE || sin_omega.abs() < 1e-9 {
        return lerp(from, to, t);
    }

    let direction = u1 * (((1.0 - t) * omega).sin() / sin_omega)
        + u2 * ((t * omega).sin() / sin_omega);
    direction * (r1 + (r2 - r1) * t)
}

/// Evenly spaced spherical interpolation from `from` to `to`: `steps` positions for
/// t = 1/steps .. 1. The starting point is not included, the end point is.
pub fn slerp(from: &Position, to: &Position, steps: usize) -> Vec<Position> {
    (1..=steps)
        .map(|i| slerp_at(from, to, i as f64 / steps as f64))
        .collect()
}
