//! Core types for wallet management
//!
//! Defines managed wallets, funding wallets, watched addresses and the
//! registry file layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Custodial wallet whose balances are swept and topped up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedWallet {
    /// Unique identifier
    pub id: String,

    /// Lowercase 0x-prefixed address, immutable once registered
    pub address: String,

    /// Recovery phrase the signing key is derived from
    pub mnemonic: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Soft delete flag
    #[serde(default)]
    pub deleted: bool,

    /// When the wallet was registered
    pub created_at: DateTime<Utc>,
}

impl ManagedWallet {
    /// Signing handle that derives the key from the stored phrase
    pub fn signing_handle(&self, derivation_path: &str) -> SigningHandle {
        SigningHandle::RecoveryPhrase {
            phrase: self.mnemonic.clone(),
            derivation_path: derivation_path.to_string(),
        }
    }
}

/// Custodial wallet used only as a top-up source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingWallet {
    /// Unique identifier
    pub id: String,

    /// Lowercase 0x-prefixed address
    pub address: String,

    /// Recovery phrase the key was derived from
    pub mnemonic: String,

    /// Private key hex (64 chars, no 0x), derived once at registration
    pub private_key: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    /// Soft delete flag
    #[serde(default)]
    pub deleted: bool,

    /// When the wallet was registered
    pub created_at: DateTime<Utc>,
}

impl FundingWallet {
    /// Signing handle using the cached key
    pub fn signing_handle(&self) -> SigningHandle {
        SigningHandle::PrivateKey(self.private_key.clone())
    }
}

/// Address tracked for balance display only; holds no key material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedAddress {
    pub id: String,

    /// Lowercase 0x-prefixed address, unique among watched addresses
    pub address: String,

    pub name: String,

    #[serde(default)]
    pub deleted: bool,

    pub created_at: DateTime<Utc>,
}

/// Where a transfer's signing key comes from
#[derive(Clone)]
pub enum SigningHandle {
    /// Derive from a recovery phrase
    RecoveryPhrase {
        phrase: String,
        derivation_path: String,
    },

    /// Cached hex private key
    PrivateKey(String),
}

impl std::fmt::Debug for SigningHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        match self {
            SigningHandle::RecoveryPhrase {
                derivation_path, ..
            } => write!(f, "RecoveryPhrase({})", derivation_path),
            SigningHandle::PrivateKey(_) => write!(f, "PrivateKey(***)"),
        }
    }
}

/// Which registry collection a wallet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Managed,
    Funding,
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletKind::Managed => write!(f, "managed"),
            WalletKind::Funding => write!(f, "funding"),
        }
    }
}

/// Wallet registry file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Registry format version
    #[serde(default = "default_version")]
    pub version: String,

    /// Managed wallets, in registration order
    #[serde(default)]
    pub managed: Vec<ManagedWallet>,

    /// Funding wallets, in registration order
    #[serde(default)]
    pub funding: Vec<FundingWallet>,

    /// Watch-only addresses, in registration order
    #[serde(default)]
    pub addresses: Vec<WatchedAddress>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            managed: Vec::new(),
            funding: Vec::new(),
            addresses: Vec::new(),
        }
    }
}
