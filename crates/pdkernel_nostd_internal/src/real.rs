//! The working precision of a kernel evaluation.
//!
//! Pair functions are evaluated in either single or double precision (the
//! same choice a device program is built for). Partial sums are always
//! combined in `f64` by the caller, regardless of the working precision.

use core::fmt::Debug;
use core::ops::{Add, Div, Mul, Neg, Sub};

/// A floating point type that pair functions can be evaluated in.
///
/// # Note
/// The transcendental functions aren't available from `core`, so we forward
/// them to `libm`.
pub trait Real:
    Copy
    + Debug
    + Default
    + PartialOrd
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// short name used in diagnostics (e.g. `"f32"`)
    const NAME: &'static str;

    fn zero() -> Self;
    fn from_f64(val: f64) -> Self;
    fn to_f64(self) -> f64;
    fn exp(self) -> Self;
    fn atan(self) -> Self;
    fn powf(self, exponent: Self) -> Self;
}

impl Real for f32 {
    const NAME: &'static str = "f32";

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline(always)]
    fn from_f64(val: f64) -> Self {
        val as f32
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline(always)]
    fn exp(self) -> Self {
        libm::expf(self)
    }

    #[inline(always)]
    fn atan(self) -> Self {
        libm::atanf(self)
    }

    #[inline(always)]
    fn powf(self, exponent: Self) -> Self {
        libm::powf(self, exponent)
    }
}

impl Real for f64 {
    const NAME: &'static str = "f64";

    #[inline(always)]
    fn zero() -> Self {
        0.0
    }

    #[inline(always)]
    fn from_f64(val: f64) -> Self {
        val
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline(always)]
    fn exp(self) -> Self {
        libm::exp(self)
    }

    #[inline(always)]
    fn atan(self) -> Self {
        libm::atan(self)
    }

    #[inline(always)]
    fn powf(self, exponent: Self) -> Self {
        libm::pow(self, exponent)
    }
}
