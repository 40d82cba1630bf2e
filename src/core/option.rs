//! Option side and payoff definitions
//!
//! European options only; exercise style and contract metadata are out of
//! scope for this crate.

use serde::{Deserialize, Serialize};

/// Option type (Call or Put)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Payoff direction: +1 for call, -1 for put
    pub fn phi(&self) -> f64 {
        match self {
            OptionType::Call => 1.0,
            OptionType::Put => -1.0,
        }
    }

    /// Intrinsic value at given spot
    pub fn intrinsic(&self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionType::Call => (spot - strike).max(0.0),
            OptionType::Put => (strike - spot).max(0.0),
        }
    }

    /// Terminal payoff as a pure function of the underlying's terminal
    /// price. Same value as [`intrinsic`](Self::intrinsic); the name marks
    /// the Monte Carlo reduction use.
    pub fn payoff(&self, terminal: f64, strike: f64) -> f64 {
        self.intrinsic(terminal, strike)
    }
}
