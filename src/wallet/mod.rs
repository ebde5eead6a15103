//! Wallet management module
//!
//! Provides the custodial wallet side of reconciliation:
//! - Wallet registry (wallets.json with managed and funding wallets plus
//!   watch-only addresses)
//! - Key derivation from recovery phrases
//! - Transfer execution
//!
//! # Architecture
//!
//! ```text
//! JsonWalletRegistry → ReconciliationRunner → TransferExecutor → ChainGateway
//!         ↑                                          ↑
//!    derive (phrase → key)                    SigningHandle
//! ```
//!
//! # Security
//!
//! Recovery phrases and cached keys never appear in logs or reports:
//! - `SigningHandle` redacts key material in its `Debug` output
//! - wallets.json is written with owner-only permissions

pub mod derive;
pub mod registry;
pub mod transfer;
pub mod types;

pub use registry::{JsonWalletRegistry, WalletRegistry};
pub use transfer::TransferExecutor;
pub use types::{
    FundingWallet, ManagedWallet, RegistryFile, SigningHandle, WalletKind, WatchedAddress,
};
