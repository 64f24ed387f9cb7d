//! Pair functions: the per-(point, point) term summed by a kernel.
//!
//! A kernel value between diagrams `F` and `G` is
//! `prefactor * sum_{p in F, q in G} contribution(p, q)`. The sum is what
//! gets distributed over the tiles of a launch; the prefactor is applied once
//! after the (double precision) reduction.

use crate::point::{Point, squared_dist};
use crate::real::Real;

/// The device-side part of a similarity kernel.
///
/// Implementors must return exactly zero whenever either point lies on the
/// diagonal (`birth == death`). Padding relies on this.
pub trait PairFunction<T: Real>: Clone + Send + Sync {
    /// name of the kernel variant (used in diagnostics)
    const NAME: &'static str;

    fn contribution(&self, p: &Point<T>, q: &Point<T>) -> T;

    /// factor applied to the reduced sum
    fn global_prefactor(&self) -> f64;
}

/// The persistence scale-space (heat) kernel.
///
/// Every pair contributes the difference between a Gaussian comparing `p` to
/// `q` and a Gaussian comparing `p` to the reflection of `q` across the
/// diagonal, both with bandwidth `8σ`.
#[derive(Clone, Copy, Debug)]
pub struct HeatPair<T> {
    eight_sigma: T,
    prefactor: f64,
}

impl<T: Real> HeatPair<T> {
    pub fn new(sigma: f64) -> Result<Self, &'static str> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            Err("sigma must be positive and finite")
        } else {
            let eight_sigma = 8.0 * sigma;
            Ok(HeatPair {
                eight_sigma: T::from_f64(eight_sigma),
                prefactor: 1.0 / (eight_sigma * core::f64::consts::PI),
            })
        }
    }
}

impl<T: Real> PairFunction<T> for HeatPair<T> {
    const NAME: &'static str = "heat";

    #[inline(always)]
    fn contribution(&self, p: &Point<T>, q: &Point<T>) -> T {
        let direct = (-squared_dist(p, q) / self.eight_sigma).exp();
        let mirrored = (-squared_dist(p, &q.reflected()) / self.eight_sigma).exp();
        direct - mirrored
    }

    fn global_prefactor(&self) -> f64 {
        self.prefactor
    }
}

/// The persistence weighted Gaussian kernel.
///
/// Every pair contributes a Gaussian similarity (`exp(-|x-y|^2 / 2σ^2)`)
/// weighted by `w(x) * w(y)`, where `w(x) = atan(c * persistence(x)^p)`.
#[derive(Clone, Copy, Debug)]
pub struct WeightedGaussianPair<T> {
    two_sigma_sq: T,
    power: T,
    weight: T,
}

impl<T: Real> WeightedGaussianPair<T> {
    pub fn new(sigma: f64, power: f64, weight: f64) -> Result<Self, &'static str> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            Err("sigma must be positive and finite")
        } else if !(power > 0.0 && power.is_finite()) {
            Err("the power must be positive and finite")
        } else if !(weight > 0.0 && weight.is_finite()) {
            Err("the weight must be positive and finite")
        } else {
            Ok(WeightedGaussianPair {
                two_sigma_sq: T::from_f64(2.0 * sigma * sigma),
                power: T::from_f64(power),
                weight: T::from_f64(weight),
            })
        }
    }

    #[inline(always)]
    fn persistence_weight(&self, x: &Point<T>) -> T {
        let pers = x.persistence();
        // points below the diagonal never come out of a diagram source, but
        // a negative base would make powf produce NaN
        if pers > T::zero() {
            (self.weight * pers.powf(self.power)).atan()
        } else {
            T::zero()
        }
    }
}

impl<T: Real> PairFunction<T> for WeightedGaussianPair<T> {
    const NAME: &'static str = "pwgk";

    #[inline(always)]
    fn contribution(&self, p: &Point<T>, q: &Point<T>) -> T {
        let w = self.persistence_weight(p) * self.persistence_weight(q);
        w * (-squared_dist(p, q) / self.two_sigma_sq).exp()
    }

    fn global_prefactor(&self) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_single_pair() {
        let f = HeatPair::<f64>::new(1.0).unwrap();
        let p = Point::new(0.0, 1.0);
        let expected = 1.0 - libm::exp(-0.25);
        assert!((f.contribution(&p, &p) - expected).abs() < 1e-15);
        let prefactor = 1.0 / (8.0 * core::f64::consts::PI);
        assert!((f.global_prefactor() - prefactor).abs() < 1e-15);
    }

    #[test]
    fn heat_is_symmetric() {
        let f = HeatPair::<f64>::new(0.3).unwrap();
        let p = Point::new(0.1, 0.9);
        let q = Point::new(0.4, 1.3);
        assert!((f.contribution(&p, &q) - f.contribution(&q, &p)).abs() < 1e-15);
    }

    #[test]
    fn diagonal_points_contribute_nothing() {
        let heat = HeatPair::<f64>::new(0.7).unwrap();
        let pwgk = WeightedGaussianPair::<f64>::new(0.7, 2.0, 0.5).unwrap();
        let q = Point::new(0.2, 1.1);
        for diag in [Point::zero(), Point::new(0.5, 0.5), Point::new(3.0, 3.0)] {
            assert_eq!(heat.contribution(&diag, &q), 0.0);
            assert_eq!(heat.contribution(&q, &diag), 0.0);
            assert_eq!(pwgk.contribution(&diag, &q), 0.0);
            assert_eq!(pwgk.contribution(&q, &diag), 0.0);
        }
    }

    #[test]
    fn pwgk_single_pair() {
        let f = WeightedGaussianPair::<f64>::new(2.0, 1.0, 1.0).unwrap();
        let p = Point::new(0.0, 1.0);
        let q = Point::new(1.0, 3.0);
        let w = libm::atan(1.0) * libm::atan(2.0);
        let expected = w * libm::exp(-2.0 / 8.0);
        assert!((f.contribution(&p, &q) - expected).abs() < 1e-15);
        assert_eq!(f.global_prefactor(), 1.0);
    }

    #[test]
    fn invalid_parameters() {
        assert!(HeatPair::<f32>::new(0.0).is_err());
        assert!(HeatPair::<f32>::new(f64::NAN).is_err());
        assert!(HeatPair::<f32>::new(f64::INFINITY).is_err());
        assert!(WeightedGaussianPair::<f32>::new(1.0, 0.0, 1.0).is_err());
        assert!(WeightedGaussianPair::<f32>::new(1.0, 1.0, -1.0).is_err());
        assert!(WeightedGaussianPair::<f32>::new(-1.0, 1.0, 1.0).is_err());
    }
}
