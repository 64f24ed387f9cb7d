use crate::real::Real;

/// A single (birth, death) pair of a persistence diagram.
///
/// The layout matches the 2-component vector type a device program would
/// read from an operand buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point<T> {
    pub birth: T,
    pub death: T,
}

impl<T: Real> Point<T> {
    pub fn new(birth: T, death: T) -> Self {
        Point { birth, death }
    }

    /// The point used to pad an operand up to a multiple of the tile shape.
    ///
    /// It lies on the diagonal, so every pair function assigns it a
    /// contribution of exactly zero.
    pub fn zero() -> Self {
        Point {
            birth: T::zero(),
            death: T::zero(),
        }
    }

    /// reflection across the diagonal
    #[inline(always)]
    pub fn reflected(&self) -> Self {
        Point {
            birth: self.death,
            death: self.birth,
        }
    }

    #[inline(always)]
    pub fn persistence(&self) -> T {
        self.death - self.birth
    }

    /// converts the point to another working precision
    pub fn cast<U: Real>(&self) -> Point<U> {
        Point {
            birth: U::from_f64(self.birth.to_f64()),
            death: U::from_f64(self.death.to_f64()),
        }
    }
}

/// squared euclidean distance between 2 points
#[inline(always)]
pub fn squared_dist<T: Real>(p: &Point<T>, q: &Point<T>) -> T {
    let db = p.birth - q.birth;
    let dd = p.death - q.death;
    db * db + dd * dd // NOTE: .powi can't be used in no_std crates
}

/// Returns the smallest multiple of `granularity` that is no less than `len`
///
/// `granularity` must be positive.
pub fn padded_len(len: usize, granularity: usize) -> usize {
    len.div_ceil(granularity) * granularity
}

/// The number of zero points that must be appended to an operand holding
/// `len` points so that its length is a multiple of `granularity`.
pub fn n_padding(len: usize, granularity: usize) -> usize {
    padded_len(len, granularity) - len
}
