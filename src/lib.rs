//! # volkit - European option pricing and volatility calibration
//!
//! A pricing library covering three models that feed one another:
//!
//! - **Black-Scholes**: closed-form European pricing, numerical vega, and a
//!   Newton-Raphson implied volatility solver
//! - **Heston**: stochastic-volatility Monte Carlo with correlated Gaussian
//!   drivers and the full truncation scheme, plus a characteristic-function
//!   benchmark price
//! - **Local Volatility (Dupire)**: finite-difference estimator over an
//!   externally fitted call-price surface, expressed as a capability trait so
//!   any surface-fitting strategy plugs in
//!
//! Market prices invert to implied volatilities, fitted price surfaces yield
//! local volatilities, and model parameters drive the simulator; all three
//! share the same numerical-differentiation and root-finding machinery.
//!
//! ## Usage
//!
//! ```rust
//! use volkit::prelude::*;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! // Closed-form price and its implied vol round trip
//! let call = bs_price(100.0, 100.0, 0.05, 0.2, 1.0, OptionType::Call).unwrap();
//! let iv = implied_volatility(call, 100.0, 100.0, 0.05, 1.0, OptionType::Call).unwrap();
//! assert!((iv.vol - 0.2).abs() < 1e-4);
//!
//! // Heston Monte Carlo with a caller-owned, explicitly seeded generator
//! let model = HestonModel::new(HestonParams::typical_equity(), 0.05);
//! let mut rng = ChaCha8Rng::seed_from_u64(7);
//! let mc = model
//!     .mc_price(100.0, 100.0, 1.0, OptionType::Call, 64, 2_000, &mut rng)
//!     .unwrap();
//! assert!(mc > 0.0);
//!
//! // Dupire local vol from a fitted price surface
//! let surface = ConstantVolSurface { spot: 100.0, rate: 0.05, vol: 0.2 };
//! let lv = dupire_local_vol(&surface, 0.5, 100.0, 0.05).unwrap();
//! assert!((lv - 0.2).abs() < 1e-3);
//! ```
//!
//! ## What this crate does NOT do
//!
//! - Fetch market data or fit surfaces (surfaces come in as a callable)
//! - Price American or exotic payoffs
//! - Variance reduction beyond plain Monte Carlo
//! - Persist calibrated surfaces or serve real-time quotes

pub mod core;
pub mod models;

/// Prelude with commonly used types
pub mod prelude {
    // Core types
    pub use crate::core::{ClosureSurface, Greeks, OptionType, PriceSurface, VolError, VolResult};

    // Black-Scholes
    pub use crate::models::black_scholes::{
        greeks as bs_greeks, implied_volatility, implied_volatility_with, norm_cdf, norm_pdf,
        price as bs_price, vega as bs_vega, ConstantVolSurface, ImpliedVol,
    };

    // Heston
    pub use crate::models::heston::{HestonModel, HestonParams, PathEnsemble};

    // Local vol
    pub use crate::models::local_vol::{dupire_local_vol, LocalVolSurface};
}

// Re-export main types at crate root
pub use crate::core::{VolError, VolResult};
pub use crate::models::{HestonModel, HestonParams};
