//! Price surface capability trait
//!
//! The local volatility estimator only needs to read an externally fitted
//! call-price surface at perturbed coordinates. Expressing that as a single
//! method keeps the estimator independent of any concrete surface-fitting
//! strategy: spline interpolators, parametric smiles, and closed-form model
//! surfaces all plug in the same way.

use crate::core::VolResult;

/// A bivariate European call-price surface C(T, K).
///
/// Implementations must be deterministic and pure: the estimator evaluates
/// the surface at several nearby coordinates per call and never caches, so a
/// surface that mutates under its own feet produces inconsistent derivatives.
pub trait PriceSurface {
    /// Call price at maturity `time` (years) and strike `strike`.
    ///
    /// A surface with no data near the query point should return an error
    /// rather than extrapolate silently.
    fn price(&self, time: f64, strike: f64) -> VolResult<f64>;
}

/// Adapter turning an infallible closure `(time, strike) -> price` into a
/// [`PriceSurface`]; convenient for fitted interpolators that are total over
/// the queried region.
#[derive(Debug, Clone, Copy)]
pub struct ClosureSurface<F>(pub F);

impl<F> PriceSurface for ClosureSurface<F>
where
    F: Fn(f64, f64) -> f64,
{
    fn price(&self, time: f64, strike: f64) -> VolResult<f64> {
        Ok((self.0)(time, strike))
    }
}
