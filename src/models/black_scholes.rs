//! Black-Scholes Model
//!
//! Provides:
//! - European option pricing (closed form)
//! - Analytic Greeks
//! - Numerical vega via central differences
//! - Implied volatility solver (Newton-Raphson)
//!
//! The Black-Scholes model is the baseline: the implied vol solver inverts it
//! against market prices, and the flat-vol call surface built on it serves as
//! the reference input for the Dupire local volatility estimator.

use crate::core::{Greeks, OptionType, PriceSurface, VolError, VolResult};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;

/// Central-difference bump for the numerical vega. Larger bumps bias the
/// estimate, smaller ones amplify floating-point cancellation.
pub const VEGA_BUMP: f64 = 1e-5;

/// Newton-Raphson price tolerance for the implied vol solver
pub const IV_TOLERANCE: f64 = 1e-8;

/// Newton-Raphson iteration budget for the implied vol solver
pub const IV_MAX_ITER: usize = 100;

/// Starting volatility for the implied vol solver
pub const IV_INITIAL_GUESS: f64 = 0.2;

/// Standard normal CDF
pub fn norm_cdf(x: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).unwrap();
    normal.cdf(x)
}

/// Standard normal PDF
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Black-Scholes d1 parameter. Assumes validated inputs (positive spot,
/// strike, vol, time).
pub fn d1(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
    ((spot / strike).ln() + (rate + 0.5 * vol * vol) * time) / (vol * time.sqrt())
}

/// Black-Scholes d2 parameter
pub fn d2(spot: f64, strike: f64, rate: f64, vol: f64, time: f64) -> f64 {
    d1(spot, strike, rate, vol, time) - vol * time.sqrt()
}

fn validate_domain(spot: f64, strike: f64, vol: f64, time: f64) -> VolResult<()> {
    if !(spot > 0.0) {
        return Err(VolError::invalid_input(format!("spot must be positive, got {spot}")));
    }
    if !(strike > 0.0) {
        return Err(VolError::invalid_input(format!(
            "strike must be positive, got {strike}"
        )));
    }
    if !(time > 0.0) {
        return Err(VolError::invalid_input(format!(
            "time to expiry must be positive, got {time}"
        )));
    }
    if !(vol > 0.0) {
        return Err(VolError::invalid_input(format!("vol must be positive, got {vol}")));
    }
    Ok(())
}

/// Black-Scholes European option price.
///
/// Requires `spot > 0`, `strike > 0`, `time > 0`, `vol > 0`; violating a
/// precondition fails with [`VolError::InvalidInput`] rather than returning a
/// silently wrong number (d1 divides by σ√T and takes ln(S/K)).
pub fn price(
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
    option_type: OptionType,
) -> VolResult<f64> {
    validate_domain(spot, strike, vol, time)?;

    let d1 = d1(spot, strike, rate, vol, time);
    let d2 = d2(spot, strike, rate, vol, time);
    let df = (-rate * time).exp();

    let px = match option_type {
        OptionType::Call => spot * norm_cdf(d1) - strike * df * norm_cdf(d2),
        OptionType::Put => strike * df * norm_cdf(-d2) - spot * norm_cdf(-d1),
    };
    Ok(px)
}

/// Numerical vega: central-difference derivative of the price with respect
/// to volatility, with the tuned default bump [`VEGA_BUMP`].
pub fn vega(
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
    option_type: OptionType,
) -> VolResult<f64> {
    vega_with_bump(spot, strike, rate, vol, time, option_type, VEGA_BUMP)
}

/// Numerical vega with an explicit central-difference bump
pub fn vega_with_bump(
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
    option_type: OptionType,
    bump: f64,
) -> VolResult<f64> {
    if !(bump > 0.0) {
        return Err(VolError::invalid_input(format!(
            "vega bump must be positive, got {bump}"
        )));
    }
    let up = price(spot, strike, rate, vol + bump, time, option_type)?;
    let down = price(spot, strike, rate, vol - bump, time, option_type)?;
    Ok((up - down) / (2.0 * bump))
}

/// Analytic Black-Scholes Greeks, in natural units (vega per unit vol,
/// rho per unit rate, theta per year).
pub fn greeks(
    spot: f64,
    strike: f64,
    rate: f64,
    vol: f64,
    time: f64,
    option_type: OptionType,
) -> VolResult<Greeks> {
    validate_domain(spot, strike, vol, time)?;

    let d1 = d1(spot, strike, rate, vol, time);
    let d2 = d2(spot, strike, rate, vol, time);
    let df = (-rate * time).exp();
    let sqrt_t = time.sqrt();
    let pdf_d1 = norm_pdf(d1);

    let delta = match option_type {
        OptionType::Call => norm_cdf(d1),
        OptionType::Put => norm_cdf(d1) - 1.0,
    };

    // Gamma and vega are side-independent
    let gamma = pdf_d1 / (spot * vol * sqrt_t);
    let vega = spot * pdf_d1 * sqrt_t;

    let decay = -spot * pdf_d1 * vol / (2.0 * sqrt_t);
    let theta = match option_type {
        OptionType::Call => decay - rate * strike * df * norm_cdf(d2),
        OptionType::Put => decay + rate * strike * df * norm_cdf(-d2),
    };

    let rho = match option_type {
        OptionType::Call => strike * time * df * norm_cdf(d2),
        OptionType::Put => -strike * time * df * norm_cdf(-d2),
    };

    Ok(Greeks::new(delta, gamma, theta, vega, rho))
}

/// Result of the implied volatility solver: the recovered volatility and the
/// number of Newton iterations it took.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpliedVol {
    pub vol: f64,
    pub iterations: usize,
}

/// Implied volatility via Newton-Raphson with the default tolerance and
/// iteration budget. See [`implied_volatility_with`].
pub fn implied_volatility(
    market_price: f64,
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
    option_type: OptionType,
) -> VolResult<ImpliedVol> {
    implied_volatility_with(
        market_price,
        spot,
        strike,
        rate,
        time,
        option_type,
        IV_TOLERANCE,
        IV_MAX_ITER,
    )
}

/// Implied volatility via Newton-Raphson.
///
/// Starts at σ = [`IV_INITIAL_GUESS`] and iterates
/// σ ← σ − (price(σ) − market) / vega(σ), using the numerical vega.
///
/// The convergence test |price(σ) − market| < tol is evaluated on the price
/// *before* the Newton update, so the reported σ is the one whose model price
/// meets tolerance (the iterate is never advanced past it). Failure modes:
///
/// - vanishing vega (deep ITM/OTM, pathological inputs) fails with
///   [`VolError::Singularity`],
/// - a Newton step that leaves the positive-vol domain or produces a
///   non-finite σ fails with [`VolError::Singularity`] — the iterate is not
///   clamped back into range,
/// - exhausting `max_iter` fails with [`VolError::Convergence`].
#[allow(clippy::too_many_arguments)]
pub fn implied_volatility_with(
    market_price: f64,
    spot: f64,
    strike: f64,
    rate: f64,
    time: f64,
    option_type: OptionType,
    tol: f64,
    max_iter: usize,
) -> VolResult<ImpliedVol> {
    if !(market_price > 0.0) {
        return Err(VolError::invalid_input(format!(
            "market price must be positive, got {market_price}"
        )));
    }
    if max_iter == 0 {
        return Err(VolError::invalid_input("max_iter must be at least 1"));
    }

    let mut vol = IV_INITIAL_GUESS;
    let mut residual = f64::INFINITY;

    for iter in 0..max_iter {
        let model_price = price(spot, strike, rate, vol, time, option_type)?;
        let diff = model_price - market_price;
        residual = diff.abs();

        if residual < tol {
            return Ok(ImpliedVol { vol, iterations: iter });
        }

        let vega = vega(spot, strike, rate, vol, time, option_type)?;
        if vega.abs() < 1e-12 {
            return Err(VolError::singularity(format!(
                "vega {vega:.3e} at sigma={vol:.6} (iteration {iter}); Newton step undefined"
            )));
        }

        vol -= diff / vega;

        if !vol.is_finite() {
            return Err(VolError::singularity(format!(
                "Newton iterate diverged to sigma={vol} (iteration {iter})"
            )));
        }
        if vol <= 0.0 {
            return Err(VolError::singularity(format!(
                "Newton step left the positive-vol domain: sigma={vol:.6} (iteration {iter}); \
                 market price {market_price} may be unattainable"
            )));
        }
    }

    Err(VolError::Convergence {
        iterations: max_iter,
        residual,
    })
}

/// Flat-volatility Black-Scholes call surface.
///
/// The simplest concrete [`PriceSurface`]: every (T, K) node is priced with
/// the same volatility. Used as a known-answer input for the Dupire
/// estimator, which must recover `vol` at interior points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstantVolSurface {
    pub spot: f64,
    pub rate: f64,
    pub vol: f64,
}

impl PriceSurface for ConstantVolSurface {
    fn price(&self, time: f64, strike: f64) -> VolResult<f64> {
        price(self.spot, strike, self.rate, self.vol, time, OptionType::Call)
    }
}
