//! Pricing models
//!
//! Implements:
//! - Black-Scholes (closed-form pricing, numerical vega, IV solver)
//! - Heston stochastic volatility (Monte Carlo, semi-analytic benchmark)
//! - Local Volatility (Dupire estimator over a fitted price surface)

pub mod black_scholes;
pub mod heston;
pub mod local_vol;

pub use black_scholes::*;
pub use heston::*;
pub use local_vol::*;
