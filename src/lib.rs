//! PoE2 combat mechanics engine: library entry point.
//!
//! Exposes the damage, EHP, stun and support gem synergy calculators, plus
//! config, gem store, defense analysis and reports for the CLI and tests.

pub mod analysis;
pub mod config;
pub mod damage;
pub mod ehp;
pub mod error;
pub mod report;
pub mod store;
pub mod stun;
pub mod synergy;
pub mod util;

pub use error::{CalcError, Result};
