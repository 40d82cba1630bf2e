//! Core data types for volkit
//!
//! Defines fundamental types:
//! - OptionType: call/put side and terminal payoff
//! - Greeks: price sensitivities
//! - PriceSurface: capability trait for externally fitted call-price surfaces
//! - VolError/VolResult: error taxonomy

pub mod error;
pub mod greeks;
pub mod option;
pub mod surface;

pub use error::*;
pub use greeks::*;
pub use option::*;
pub use surface::*;
