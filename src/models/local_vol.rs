//! Local Volatility (Dupire)
//!
//! Dupire's formula extracts a deterministic volatility function σ(T, K)
//! from an externally fitted call-price surface C(T, K):
//!
//! σ_local²(T, K) = 2 · (∂C/∂T + r·K·∂C/∂K) / (K² · ∂²C/∂K²)
//!
//! The partial derivatives are taken numerically with central differences on
//! the supplied surface, so the estimator works with any [`PriceSurface`]
//! implementation: a spline fit to market quotes, a parametric smile, or a
//! closed-form model surface. The estimator reads the surface at exactly five
//! perturbed coordinates per call and never caches, since the surface may be
//! refitted between calls.

use crate::core::{PriceSurface, VolError, VolResult};
use ndarray::Array2;

/// Central-difference step on the maturity axis
pub const TIME_STEP: f64 = 1e-4;

/// Central-difference step on the strike axis
pub const STRIKE_STEP: f64 = 1e-4;

/// Read one surface node, rejecting non-finite or negative prices. A fitted
/// surface that returns either cannot yield meaningful derivatives.
fn read_surface<S: PriceSurface + ?Sized>(surface: &S, time: f64, strike: f64) -> VolResult<f64> {
    let px = surface.price(time, strike)?;
    if !px.is_finite() || px < 0.0 {
        return Err(VolError::singularity(format!(
            "surface returned inadmissible price {px} at (T={time}, K={strike})"
        )));
    }
    Ok(px)
}

/// Dupire local volatility at a single (maturity, strike) point.
///
/// Derivatives: ∂C/∂T and ∂C/∂K via central differences with steps
/// [`TIME_STEP`] and [`STRIKE_STEP`]; ∂²C/∂K² via the three-point stencil.
///
/// Fails with [`VolError::Singularity`] when the Dupire denominator vanishes
/// or the radicand goes negative — both are common on surfaces fitted to
/// sparse or noisy quotes that are not consistently twice differentiable —
/// rather than returning NaN.
pub fn dupire_local_vol<S: PriceSurface + ?Sized>(
    surface: &S,
    time: f64,
    strike: f64,
    rate: f64,
) -> VolResult<f64> {
    if !(time > TIME_STEP) {
        return Err(VolError::invalid_input(format!(
            "maturity {time} too small for the centered stencil (needs T > {TIME_STEP})"
        )));
    }
    if !(strike > STRIKE_STEP) {
        return Err(VolError::invalid_input(format!(
            "strike {strike} too small for the centered stencil (needs K > {STRIKE_STEP})"
        )));
    }

    let c = read_surface(surface, time, strike)?;
    let c_t_up = read_surface(surface, time + TIME_STEP, strike)?;
    let c_t_dn = read_surface(surface, time - TIME_STEP, strike)?;
    let c_k_up = read_surface(surface, time, strike + STRIKE_STEP)?;
    let c_k_dn = read_surface(surface, time, strike - STRIKE_STEP)?;

    let dc_dt = (c_t_up - c_t_dn) / (2.0 * TIME_STEP);
    let dc_dk = (c_k_up - c_k_dn) / (2.0 * STRIKE_STEP);
    let d2c_dk2 = (c_k_up - 2.0 * c + c_k_dn) / (STRIKE_STEP * STRIKE_STEP);

    let denominator = strike * strike * d2c_dk2;
    if denominator.abs() < 1e-12 {
        return Err(VolError::singularity(format!(
            "Dupire denominator K²·∂²C/∂K² = {denominator:.3e} at (T={time}, K={strike})"
        )));
    }

    let radicand = 2.0 * (dc_dt + rate * strike * dc_dk) / denominator;
    if radicand < 0.0 {
        return Err(VolError::singularity(format!(
            "negative local variance {radicand:.3e} at (T={time}, K={strike}); \
             surface is not arbitrage-consistent there"
        )));
    }

    Ok(radicand.sqrt())
}

/// Local volatility sampled on a (strikes × times) grid, with bilinear
/// interpolation of local *variance* between nodes and flat extrapolation at
/// the edges.
///
/// Construction fails fast on the first grid node where the Dupire estimator
/// is singular; a partially filled surface would silently distort every
/// interpolated query around the hole.
#[derive(Debug, Clone)]
pub struct LocalVolSurface {
    /// Strike grid (ascending)
    pub strikes: Vec<f64>,
    /// Maturity grid (ascending, years)
    pub times: Vec<f64>,
    /// Local variance grid, shape (strikes, times)
    pub local_var: Array2<f64>,
    /// Risk-free rate used in the Dupire formula
    pub rate: f64,
}

impl LocalVolSurface {
    /// Sample the Dupire estimator over the given grid.
    pub fn from_price_surface<S: PriceSurface + ?Sized>(
        surface: &S,
        strikes: &[f64],
        times: &[f64],
        rate: f64,
    ) -> VolResult<Self> {
        if strikes.is_empty() || times.is_empty() {
            return Err(VolError::invalid_input(
                "local vol grid needs at least one strike and one maturity",
            ));
        }
        if strikes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VolError::invalid_input("strike grid must be strictly ascending"));
        }
        if times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VolError::invalid_input("maturity grid must be strictly ascending"));
        }

        let mut local_var = Array2::zeros((strikes.len(), times.len()));
        for (ti, &t) in times.iter().enumerate() {
            for (si, &k) in strikes.iter().enumerate() {
                let lv = dupire_local_vol(surface, t, k, rate)?;
                local_var[[si, ti]] = lv * lv;
            }
        }

        tracing::debug!(
            strikes = strikes.len(),
            times = times.len(),
            "sampled local volatility grid"
        );

        Ok(Self {
            strikes: strikes.to_vec(),
            times: times.to_vec(),
            local_var,
            rate,
        })
    }

    /// Local volatility at (maturity, strike) by bilinear interpolation of
    /// the sampled variance grid.
    pub fn local_vol(&self, time: f64, strike: f64) -> f64 {
        let (si_lo, si_hi, s_frac) = find_bracket(&self.strikes, strike);
        let (ti_lo, ti_hi, t_frac) = find_bracket(&self.times, time);

        let v00 = self.local_var[[si_lo, ti_lo]];
        let v10 = self.local_var[[si_hi, ti_lo]];
        let v01 = self.local_var[[si_lo, ti_hi]];
        let v11 = self.local_var[[si_hi, ti_hi]];

        let v0 = v00 * (1.0 - s_frac) + v10 * s_frac;
        let v1 = v01 * (1.0 - s_frac) + v11 * s_frac;
        let var = v0 * (1.0 - t_frac) + v1 * t_frac;

        var.max(0.0).sqrt()
    }

    /// Local vol smile at a fixed maturity
    pub fn smile_at_time(&self, time: f64) -> Vec<(f64, f64)> {
        self.strikes
            .iter()
            .map(|&k| (k, self.local_vol(time, k)))
            .collect()
    }
}

/// Bracketing indices and interpolation fraction for an ascending axis;
/// clamps outside the grid (flat extrapolation).
fn find_bracket(axis: &[f64], value: f64) -> (usize, usize, f64) {
    let last = axis.len() - 1;

    if value <= axis[0] {
        return (0, 0, 0.0);
    }
    if value >= axis[last] {
        return (last, last, 0.0);
    }

    for i in 0..last {
        if value >= axis[i] && value <= axis[i + 1] {
            let frac = (value - axis[i]) / (axis[i + 1] - axis[i]);
            return (i, i + 1, frac);
        }
    }

    (last, last, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ClosureSurface, PriceSurface, VolError};
    use crate::models::black_scholes::ConstantVolSurface;

    fn flat_surface() -> ConstantVolSurface {
        ConstantVolSurface {
            spot: 100.0,
            rate: 0.05,
            vol: 0.2,
        }
    }

    #[test]
    fn test_recovers_constant_vol() {
        // A flat-vol Black-Scholes surface must give back its own vol at
        // interior points, up to finite-difference truncation error.
        let surface = flat_surface();
        for (t, k) in [(0.5, 100.0), (1.0, 90.0), (0.25, 110.0), (2.0, 100.0)] {
            let lv = dupire_local_vol(&surface, t, k, 0.05).unwrap();
            assert!((lv - 0.2).abs() < 1e-3, "local vol {lv} at (T={t}, K={k})");
        }
    }

    #[test]
    fn test_closure_surface_accepted() {
        // The estimator works against any callable surface
        let spot = 100.0;
        let surface = ClosureSurface(move |t: f64, k: f64| {
            crate::models::black_scholes::price(
                spot,
                k,
                0.05,
                0.2,
                t,
                crate::core::OptionType::Call,
            )
            .unwrap()
        });
        let lv = dupire_local_vol(&surface, 1.0, 100.0, 0.05).unwrap();
        assert!((lv - 0.2).abs() < 1e-3);
    }

    #[test]
    fn test_flat_price_surface_is_singular() {
        // C(T,K) constant: zero strike convexity, zero denominator
        let surface = ClosureSurface(|_t: f64, _k: f64| 5.0);
        let err = dupire_local_vol(&surface, 1.0, 100.0, 0.05).unwrap_err();
        assert!(matches!(err, VolError::Singularity(_)));
    }

    #[test]
    fn test_negative_radicand_is_singular() {
        // Calendar-decreasing surface with mild strike convexity: the
        // numerator goes negative while the denominator stays positive.
        let surface =
            ClosureSurface(|t: f64, k: f64| 10.0 - t + 0.001 * (k - 100.0) * (k - 100.0));
        let err = dupire_local_vol(&surface, 1.0, 100.0, 0.0).unwrap_err();
        assert!(matches!(err, VolError::Singularity(_)));
    }

    #[test]
    fn test_nan_surface_rejected() {
        let surface = ClosureSurface(|_t: f64, _k: f64| f64::NAN);
        let err = dupire_local_vol(&surface, 1.0, 100.0, 0.05).unwrap_err();
        assert!(matches!(err, VolError::Singularity(_)));
    }

    #[test]
    fn test_stencil_domain_checks() {
        let surface = flat_surface();
        assert!(matches!(
            dupire_local_vol(&surface, 0.0, 100.0, 0.05),
            Err(VolError::InvalidInput(_))
        ));
        assert!(matches!(
            dupire_local_vol(&surface, 1.0, 0.0, 0.05),
            Err(VolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_surface_errors_propagate() {
        struct Sparse;
        impl PriceSurface for Sparse {
            fn price(&self, time: f64, strike: f64) -> crate::core::VolResult<f64> {
                Err(VolError::invalid_input(format!(
                    "no quotes near (T={time}, K={strike})"
                )))
            }
        }
        let err = dupire_local_vol(&Sparse, 1.0, 100.0, 0.05).unwrap_err();
        assert!(matches!(err, VolError::InvalidInput(_)));
    }

    #[test]
    fn test_grid_sampling_and_interpolation() {
        let surface = flat_surface();
        let strikes: Vec<f64> = (80..=120).step_by(5).map(|k| k as f64).collect();
        let times = vec![0.25, 0.5, 1.0, 2.0];

        let lv = LocalVolSurface::from_price_surface(&surface, &strikes, &times, 0.05).unwrap();

        assert_eq!(lv.local_var.dim(), (strikes.len(), times.len()));

        // On-node, between nodes, and beyond the edges (flat extrapolation)
        assert!((lv.local_vol(0.5, 100.0) - 0.2).abs() < 1e-3);
        assert!((lv.local_vol(0.75, 102.5) - 0.2).abs() < 1e-3);
        assert!((lv.local_vol(5.0, 150.0) - 0.2).abs() < 1e-3);

        let smile = lv.smile_at_time(1.0);
        assert_eq!(smile.len(), strikes.len());
        assert!(smile.iter().all(|(_, v)| (v - 0.2).abs() < 1e-3));
    }

    #[test]
    fn test_grid_validation() {
        let surface = flat_surface();
        assert!(matches!(
            LocalVolSurface::from_price_surface(&surface, &[], &[0.5], 0.05),
            Err(VolError::InvalidInput(_))
        ));
        assert!(matches!(
            LocalVolSurface::from_price_surface(&surface, &[100.0, 90.0], &[0.5], 0.05),
            Err(VolError::InvalidInput(_))
        ));
    }
}
