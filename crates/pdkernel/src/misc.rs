//! Miscellaneous machinery used to implement the package

use pdkernel_nostd_internal::{Point, Real, padded_len};

/// Sums values of the working precision in double precision.
///
/// The values are summed in order, so the result only depends on the order
/// of `values`.
pub fn sum_f64<T: Real>(values: &[T]) -> f64 {
    let mut sum = 0.0;
    for v in values {
        sum += v.to_f64();
    }
    sum
}

/// Returns a copy of `points` extended with zero points until its length is a
/// multiple of `granularity`.
///
/// # Note
/// A zero point lies on the diagonal, so it contributes nothing to either
/// kernel.
pub fn padded_points(points: &[Point<f64>], granularity: usize) -> Vec<Point<f64>> {
    let len = padded_len(points.len(), granularity);
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(points);
    out.resize(len, Point::zero());
    out
}
