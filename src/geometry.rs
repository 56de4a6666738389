// src/geometry.rs
use nalgebra::Point2;

use crate::error::{PostureError, PostureResult};

/// Angle in degrees at vertex `b` between the rays `b -> a` and `b -> c`.
///
/// The result is always in `[0, 180]`. Coincident points (a zero-length
/// ray) or non-finite coordinates yield [`PostureError::DegenerateGeometry`].
pub fn angle_at_vertex(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> PostureResult<f64> {
    let ab = a - b;
    let cb = c - b;

    let mag1 = ab.norm();
    let mag2 = cb.norm();

    // Also rejects NaN magnitudes
    if !(mag1 > f64::EPSILON && mag2 > f64::EPSILON) || !mag1.is_finite() || !mag2.is_finite() {
        return Err(PostureError::DegenerateGeometry);
    }

    // Rounding can push the cosine just outside [-1, 1], where acos is NaN
    let cos_angle = (ab.dot(&cb) / (mag1 * mag2)).clamp(-1.0, 1.0);
    Ok(cos_angle.acos().to_degrees())
}

/// Absolute vertical distance between two points, in input units.
pub fn vertical_offset(a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.y - b.y).abs()
}
