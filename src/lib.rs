//! Treasury Sweeper Library
//!
//! Sweeps reward tokens out of custodial wallets and keeps their gas balance
//! topped up from a pool of funding wallets.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod price;
pub mod reconcile;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
