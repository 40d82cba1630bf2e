//! Heston Stochastic Volatility Model
//!
//! Variance follows a mean-reverting square-root process driven by a Brownian
//! motion correlated with the spot driver:
//!
//! dS = r * S * dt + √v * S * dW_S
//! dv = κ(θ - v) * dt + σ_v * √v * dW_v,   corr(dW_S, dW_v) = ρ
//!
//! Pricing here is Monte Carlo: all paths are advanced in lockstep, one time
//! step at a time, with an Euler-Maruyama variance update under the full
//! truncation scheme (negative variance is floored at zero before every
//! square root) and a log-Euler spot update. A semi-analytic price via the
//! characteristic function is included as a benchmark for the estimator.

use crate::core::{OptionType, VolError, VolResult};
use crate::models::black_scholes::{self, ImpliedVol};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Heston model parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HestonParams {
    /// Initial variance (v0)
    pub v0: f64,
    /// Mean reversion speed (κ)
    pub kappa: f64,
    /// Long-term variance (θ)
    pub theta: f64,
    /// Volatility of volatility (σ_v)
    pub sigma: f64,
    /// Correlation between spot and variance Brownians (ρ)
    pub rho: f64,
}

impl HestonParams {
    pub fn new(v0: f64, kappa: f64, theta: f64, sigma: f64, rho: f64) -> Self {
        Self {
            v0,
            kappa,
            theta,
            sigma,
            rho,
        }
    }

    /// Typical parameters for an equity index
    pub fn typical_equity() -> Self {
        Self {
            v0: 0.04,    // 20% initial vol
            kappa: 2.0,  // Mean reversion
            theta: 0.04, // 20% long-term vol
            sigma: 0.3,  // Vol-of-vol
            rho: -0.7,   // Leverage effect
        }
    }

    /// Check Feller condition: 2κθ > σ² (the continuous-time variance stays
    /// strictly positive). The discretized simulator does not rely on it; the
    /// truncation scheme handles excursions below zero.
    pub fn feller_condition(&self) -> bool {
        2.0 * self.kappa * self.theta > self.sigma * self.sigma
    }

    /// Validate parameters
    pub fn validate(&self) -> VolResult<()> {
        if !(self.v0 >= 0.0) {
            return Err(VolError::invalid_input(format!(
                "v0 must be nonnegative, got {}",
                self.v0
            )));
        }
        if !(self.kappa > 0.0) {
            return Err(VolError::invalid_input(format!(
                "kappa must be positive, got {}",
                self.kappa
            )));
        }
        if !(self.theta >= 0.0) {
            return Err(VolError::invalid_input(format!(
                "theta must be nonnegative, got {}",
                self.theta
            )));
        }
        if !(self.sigma >= 0.0) {
            return Err(VolError::invalid_input(format!(
                "sigma must be nonnegative, got {}",
                self.sigma
            )));
        }
        if !(-1.0..=1.0).contains(&self.rho) {
            return Err(VolError::invalid_input(format!(
                "rho must be in [-1, 1], got {}",
                self.rho
            )));
        }
        if !self.feller_condition() {
            tracing::warn!(
                kappa = self.kappa,
                theta = self.theta,
                sigma = self.sigma,
                "Feller condition violated; variance paths will hit zero"
            );
        }
        Ok(())
    }

    /// Long-term volatility
    pub fn long_term_vol(&self) -> f64 {
        self.theta.sqrt()
    }

    /// Initial volatility
    pub fn initial_vol(&self) -> f64 {
        self.v0.sqrt()
    }
}

impl Default for HestonParams {
    fn default() -> Self {
        Self::typical_equity()
    }
}

/// Simulated path ensemble: spot and variance trajectories in two parallel
/// (paths × steps+1) grids. Column 0 holds the initial state; column N the
/// terminal one. Pricing reduces the terminal column and discards the rest.
#[derive(Debug, Clone)]
pub struct PathEnsemble {
    /// Spot paths, shape (n_paths, n_steps + 1)
    pub spots: Array2<f64>,
    /// Variance paths, shape (n_paths, n_steps + 1)
    pub variances: Array2<f64>,
    /// Time step size
    pub dt: f64,
}

impl PathEnsemble {
    pub fn n_paths(&self) -> usize {
        self.spots.nrows()
    }

    pub fn n_steps(&self) -> usize {
        self.spots.ncols() - 1
    }

    /// Terminal spot per path
    pub fn terminal_spots(&self) -> ndarray::ArrayView1<'_, f64> {
        self.spots.column(self.spots.ncols() - 1)
    }
}

/// Heston model bound to a risk-free rate
pub struct HestonModel {
    params: HestonParams,
    rate: f64,
}

impl HestonModel {
    pub fn new(params: HestonParams, rate: f64) -> Self {
        Self { params, rate }
    }

    pub fn params(&self) -> &HestonParams {
        &self.params
    }

    fn validate_run(
        &self,
        spot: f64,
        time: f64,
        n_steps: usize,
        n_paths: usize,
    ) -> VolResult<()> {
        self.params.validate()?;
        if !(spot > 0.0) {
            return Err(VolError::invalid_input(format!(
                "spot must be positive, got {spot}"
            )));
        }
        if !(time > 0.0) {
            return Err(VolError::invalid_input(format!(
                "time horizon must be positive, got {time}"
            )));
        }
        if n_steps == 0 {
            return Err(VolError::invalid_input("n_steps must be at least 1"));
        }
        if n_paths == 0 {
            return Err(VolError::invalid_input("n_paths must be at least 1"));
        }
        Ok(())
    }

    /// One Euler step for a single path. Full truncation: the variance enters
    /// every square root floored at zero, so a negative excursion never
    /// produces a NaN.
    #[inline]
    fn step(&self, s: f64, v: f64, dt: f64, w1: f64, w2: f64) -> (f64, f64) {
        let p = &self.params;
        let vol_term = (v * dt).max(0.0).sqrt();
        let s_next = s * ((self.rate - 0.5 * v) * dt + vol_term * w1).exp();
        let v_next = v + p.kappa * (p.theta - v) * dt + p.sigma * vol_term * w2;
        (s_next, v_next)
    }

    /// Simulate the full path ensemble: `n_paths` trajectories over
    /// `n_steps` steps of size `time / n_steps`, advanced in lockstep.
    ///
    /// Each step draws two independent standard-normal vectors Z1, Z2 of
    /// length `n_paths` from the caller's generator and builds the correlated
    /// drivers W1 = Z1, W2 = ρ·Z1 + √(1−ρ²)·Z2, so the two driving processes
    /// have correlation ρ while each remains standard normal.
    ///
    /// Reproducibility is the caller's to control through the generator seed;
    /// there is no process-global RNG state.
    pub fn simulate(
        &self,
        spot: f64,
        time: f64,
        n_steps: usize,
        n_paths: usize,
        rng: &mut impl Rng,
    ) -> VolResult<PathEnsemble> {
        self.validate_run(spot, time, n_steps, n_paths)?;

        let p = &self.params;
        let dt = time / n_steps as f64;
        let rho_bar = (1.0 - p.rho * p.rho).sqrt();

        let mut spots = Array2::zeros((n_paths, n_steps + 1));
        let mut variances = Array2::zeros((n_paths, n_steps + 1));
        spots.column_mut(0).fill(spot);
        variances.column_mut(0).fill(p.v0);

        for step in 0..n_steps {
            let z1: Array1<f64> = Array1::from_shape_fn(n_paths, |_| StandardNormal.sample(&mut *rng));
            let z2: Array1<f64> = Array1::from_shape_fn(n_paths, |_| StandardNormal.sample(&mut *rng));

            for path in 0..n_paths {
                let w2 = p.rho * z1[path] + rho_bar * z2[path];
                let (s, v) = self.step(
                    spots[[path, step]],
                    variances[[path, step]],
                    dt,
                    z1[path],
                    w2,
                );
                spots[[path, step + 1]] = s;
                variances[[path, step + 1]] = v;
            }
        }

        Ok(PathEnsemble {
            spots,
            variances,
            dt,
        })
    }

    /// Terminal spots only: same scheme as [`simulate`](Self::simulate) but
    /// keeps just the current time slice, so pricing does not pay for the
    /// full (paths × steps) grids it would immediately discard.
    fn terminal_spots(
        &self,
        spot: f64,
        time: f64,
        n_steps: usize,
        n_paths: usize,
        rng: &mut impl Rng,
    ) -> VolResult<Array1<f64>> {
        self.validate_run(spot, time, n_steps, n_paths)?;

        let p = &self.params;
        let dt = time / n_steps as f64;
        let rho_bar = (1.0 - p.rho * p.rho).sqrt();

        let mut spots = Array1::from_elem(n_paths, spot);
        let mut variances = Array1::from_elem(n_paths, p.v0);

        for _ in 0..n_steps {
            let z1: Array1<f64> = Array1::from_shape_fn(n_paths, |_| StandardNormal.sample(&mut *rng));
            let z2: Array1<f64> = Array1::from_shape_fn(n_paths, |_| StandardNormal.sample(&mut *rng));

            for path in 0..n_paths {
                let w2 = p.rho * z1[path] + rho_bar * z2[path];
                let (s, v) = self.step(spots[path], variances[path], dt, z1[path], w2);
                spots[path] = s;
                variances[path] = v;
            }
        }

        Ok(spots)
    }

    /// Monte Carlo price of a European option: discounted mean terminal
    /// payoff over `n_paths` simulated paths of `n_steps` steps.
    pub fn mc_price(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        option_type: OptionType,
        n_steps: usize,
        n_paths: usize,
        rng: &mut impl Rng,
    ) -> VolResult<f64> {
        if !(strike > 0.0) {
            return Err(VolError::invalid_input(format!(
                "strike must be positive, got {strike}"
            )));
        }
        self.mc_price_with_payoff(spot, time, n_steps, n_paths, rng, |terminal| {
            option_type.payoff(terminal, strike)
        })
    }

    /// Monte Carlo price with a custom terminal payoff (a pure function of
    /// the terminal spot).
    pub fn mc_price_with_payoff<F>(
        &self,
        spot: f64,
        time: f64,
        n_steps: usize,
        n_paths: usize,
        rng: &mut impl Rng,
        payoff: F,
    ) -> VolResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        let terminal = self.terminal_spots(spot, time, n_steps, n_paths, rng)?;
        let mean_payoff = terminal.iter().map(|&s| payoff(s)).sum::<f64>() / n_paths as f64;
        Ok((-self.rate * time).exp() * mean_payoff)
    }

    /// Black-Scholes implied volatility of the Monte Carlo price
    pub fn implied_vol(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        option_type: OptionType,
        n_steps: usize,
        n_paths: usize,
        rng: &mut impl Rng,
    ) -> VolResult<ImpliedVol> {
        let px = self.mc_price(spot, strike, time, option_type, n_steps, n_paths, rng)?;
        black_scholes::implied_volatility(px, spot, strike, self.rate, time, option_type)
    }

    /// Semi-analytic European price via the characteristic function and
    /// Gil-Pelaez inversion. Serves as the benchmark the Monte Carlo
    /// estimator is tested against.
    pub fn price(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        option_type: OptionType,
    ) -> VolResult<f64> {
        self.params.validate()?;
        if !(spot > 0.0) || !(strike > 0.0) {
            return Err(VolError::invalid_input(format!(
                "spot and strike must be positive, got spot={spot}, strike={strike}"
            )));
        }
        if !(time > 0.0) {
            return Err(VolError::invalid_input(format!(
                "time to expiry must be positive, got {time}"
            )));
        }

        let df = (-self.rate * time).exp();
        let forward = spot * (self.rate * time).exp();
        let log_strike = strike.ln();
        let i = Complex64::i();

        // Rectangle-rule Gil-Pelaez: P_j = 1/2 + (1/π)∫ Re[e^{-iuk} φ_j(u) / iu] du
        let n_points = 4096;
        let du = 0.01;

        let mut sum1 = 0.0;
        let mut sum2 = 0.0;
        for j in 1..n_points {
            let u = j as f64 * du;
            let u_c = Complex64::new(u, 0.0);

            let phi1 = self.char_fn(u_c - i, spot, time);
            let phi2 = self.char_fn(u_c, spot, time);
            let kernel = (-i * u * log_strike).exp() / (i * u);

            sum1 += (phi1 * kernel).re * du;
            sum2 += (phi2 * kernel).re * du;
        }

        let p1 = 0.5 + sum1 / PI;
        let p2 = 0.5 + sum2 / PI;
        let call = df * (forward * p1 - strike * p2);

        let px = match option_type {
            OptionType::Call => call.max(0.0),
            // Put-call parity
            OptionType::Put => (call - df * (forward - strike)).max(0.0),
        };
        Ok(px)
    }

    /// Heston characteristic function of log-spot at maturity, in the
    /// branch-stable formulation (Albrecher et al.).
    fn char_fn(&self, u: Complex64, spot: f64, time: f64) -> Complex64 {
        let p = &self.params;
        let i = Complex64::i();

        let x = spot.ln();
        let a = p.kappa * p.theta;
        let sigma2 = p.sigma * p.sigma;

        let beta = p.kappa - p.rho * p.sigma * u * i;
        let d = (beta * beta + sigma2 * (i * u + u * u)).sqrt();

        let g_den = beta + d;
        let g = if g_den.norm() < 1e-12 {
            Complex64::new(0.0, 0.0)
        } else {
            (beta - d) / g_den
        };

        let exp_dt = (-d * time).exp();

        let c = self.rate * i * u * time
            + if sigma2 < 1e-12 || (1.0 - g).norm() < 1e-12 {
                Complex64::new(0.0, 0.0)
            } else {
                (a / sigma2)
                    * ((beta - d) * time - 2.0 * ((1.0 - g * exp_dt) / (1.0 - g)).ln())
            };

        let d_coef = {
            let denom = sigma2 * (1.0 - g * exp_dt);
            if denom.norm() < 1e-12 {
                Complex64::new(0.0, 0.0)
            } else {
                (beta - d) * (1.0 - exp_dt) / denom
            }
        };

        (c + d_coef * p.v0 + i * u * x).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spec_params() -> HestonParams {
        HestonParams::new(0.04, 2.0, 0.04, 0.5, -0.7)
    }

    #[test]
    fn test_validate() {
        assert!(HestonParams::typical_equity().validate().is_ok());
        assert!(HestonParams::new(0.04, 0.0, 0.04, 0.3, -0.7).validate().is_err());
        assert!(HestonParams::new(-0.01, 2.0, 0.04, 0.3, -0.7).validate().is_err());
        assert!(HestonParams::new(0.04, 2.0, 0.04, 0.3, -1.5).validate().is_err());
        // v0 = 0 and sigma = 0 are admissible boundaries
        assert!(HestonParams::new(0.0, 2.0, 0.04, 0.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_feller_condition() {
        // 2 * 2.0 * 0.04 = 0.16 > 0.3² = 0.09
        assert!(HestonParams::typical_equity().feller_condition());
        // 0.16 < 0.5²
        assert!(!spec_params().feller_condition());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let model = HestonModel::new(HestonParams::typical_equity(), 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(
            model.mc_price(100.0, 100.0, 1.0, OptionType::Call, 0, 100, &mut rng),
            Err(VolError::InvalidInput(_))
        ));
        assert!(matches!(
            model.mc_price(100.0, 100.0, 1.0, OptionType::Call, 100, 0, &mut rng),
            Err(VolError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_ensemble_shape_and_truncation() {
        let model = HestonModel::new(spec_params(), 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let ens = model.simulate(100.0, 1.0, 50, 200, &mut rng).unwrap();
        assert_eq!(ens.n_paths(), 200);
        assert_eq!(ens.n_steps(), 50);
        assert_eq!(ens.spots.dim(), (200, 51));
        assert_eq!(ens.variances.dim(), (200, 51));

        // Initial column carries the starting state
        assert!(ens.spots.column(0).iter().all(|&s| s == 100.0));
        assert!(ens.variances.column(0).iter().all(|&v| v == 0.04));

        // Log-Euler keeps spots positive; truncation keeps everything finite
        // even though these params violate the Feller condition
        assert!(ens.spots.iter().all(|s| s.is_finite() && *s > 0.0));
        assert!(ens.variances.iter().all(|v| v.is_finite()));
        assert!(ens.terminal_spots().len() == 200);
    }

    #[test]
    fn test_seed_reproducibility() {
        let model = HestonModel::new(spec_params(), 0.05);

        let mut rng_a = ChaCha8Rng::seed_from_u64(42);
        let mut rng_b = ChaCha8Rng::seed_from_u64(42);
        let mut rng_c = ChaCha8Rng::seed_from_u64(43);

        let a = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 20, 500, &mut rng_a)
            .unwrap();
        let b = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 20, 500, &mut rng_b)
            .unwrap();
        let c = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 20, 500, &mut rng_c)
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_constant_vol_limit_matches_black_scholes() {
        // sigma_v = 0 and v0 = theta pin the variance at v0, and the
        // log-Euler step is then exact GBM, so the estimate converges to the
        // Black-Scholes price with error ~1/sqrt(M).
        let params = HestonParams::new(0.04, 2.0, 0.04, 0.0, 0.0);
        let model = HestonModel::new(params, 0.05);
        let bs = black_scholes::price(100.0, 100.0, 0.05, 0.2, 1.0, OptionType::Call).unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let coarse = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 10, 400, &mut rng)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let fine = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 10, 25_600, &mut rng)
            .unwrap();

        assert!((coarse - bs).abs() < 2.5, "coarse={coarse} bs={bs}");
        assert!((fine - bs).abs() < 0.4, "fine={fine} bs={bs}");
    }

    #[test]
    fn test_spec_scenario_within_band() {
        // S0=100, v0=0.04, r=5%, kappa=2, theta=0.04, sigma_v=0.5, rho=-0.7,
        // K=100, T=1, N=252, M=10000: the estimate should land within the
        // stated confidence band of the semi-analytic benchmark.
        let model = HestonModel::new(spec_params(), 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let mc = model
            .mc_price(100.0, 100.0, 1.0, OptionType::Call, 252, 10_000, &mut rng)
            .unwrap();
        assert!(mc > 9.9 && mc < 11.3, "mc price {mc} outside band");

        let benchmark = model.price(100.0, 100.0, 1.0, OptionType::Call).unwrap();
        assert!((mc - benchmark).abs() < 1.0, "mc={mc} benchmark={benchmark}");
    }

    #[test]
    fn test_semi_analytic_parity() {
        let model = HestonModel::new(HestonParams::typical_equity(), 0.05);
        let call = model.price(100.0, 100.0, 0.5, OptionType::Call).unwrap();
        let put = model.price(100.0, 100.0, 0.5, OptionType::Put).unwrap();

        assert!(call > 0.0 && put > 0.0);
        let forward = 100.0 * (0.05_f64 * 0.5).exp();
        let df = (-0.05_f64 * 0.5).exp();
        let parity = call - put - df * (forward - 100.0);
        assert!(parity.abs() < 0.05, "parity residual {parity}");
    }

    #[test]
    fn test_custom_payoff() {
        let model = HestonModel::new(HestonParams::typical_equity(), 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(9);

        // Cash-or-nothing digital paying 1 above the strike
        let digital = model
            .mc_price_with_payoff(100.0, 0.5, 50, 4000, &mut rng, |s| {
                if s > 100.0 {
                    1.0
                } else {
                    0.0
                }
            })
            .unwrap();

        // Bounded by the discount factor
        assert!(digital > 0.0 && digital < 1.0);
    }

    #[test]
    fn test_mc_implied_vol_near_initial_vol() {
        // Short maturity ATM: implied vol should sit near sqrt(v0)
        let model = HestonModel::new(HestonParams::typical_equity(), 0.05);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let iv = model
            .implied_vol(100.0, 100.0, 0.25, OptionType::Call, 64, 20_000, &mut rng)
            .unwrap();
        assert!((iv.vol - 0.2).abs() < 0.05, "implied vol {}", iv.vol);
    }
}
