//! Engine module - the decision loop and its supporting calculators

pub mod decision;
pub mod risk;
pub mod vwap;
pub mod windows;

pub use decision::DecisionEngine;
pub use risk::{DrawdownBreach, RiskGuard};
