//! Error types for the treasury sweeper

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the treasury sweeper
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),

    // Chain gateway errors
    #[error("Balance read failed for {address}: {reason}")]
    BalanceRead { address: String, reason: String },

    #[error("Fee estimation failed for {address}: {reason}")]
    FeeEstimation { address: String, reason: String },

    #[error("Submission failed for {address}: {reason}")]
    Submission { address: String, reason: String },

    // Transfer errors
    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported token symbol: {0}")]
    UnsupportedToken(String),

    // Funding errors
    #[error("NoFundingAvailable: no funding wallets available for top-up")]
    NoFundingAvailable,

    // Key material errors
    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    // Registry errors
    #[error("Wallet address already registered: {0}")]
    DuplicateAddress(String),

    #[error("Signing key already registered for wallet {0}")]
    DuplicateKey(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Registry error: {0}")]
    Registry(String),

    // Pass coordination
    #[error("A reconciliation pass is already in progress")]
    PassInProgress,

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Stable error code used in pass reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::MissingSetting(_) => "ConfigurationError",
            Error::BalanceRead { .. } => "BalanceReadError",
            Error::FeeEstimation { .. } => "FeeEstimationError",
            Error::Submission { .. } => "SubmissionError",
            Error::TransferFailed { .. } => "TransferFailed",
            Error::InvalidAmount(_) => "InvalidAmount",
            Error::InvalidAddress(_) => "InvalidAddress",
            Error::UnsupportedToken(_) => "UnsupportedToken",
            Error::NoFundingAvailable => "NoFundingAvailable",
            Error::Derivation(_) => "DerivationError",
            Error::InvalidMnemonic(_) => "InvalidMnemonic",
            Error::DuplicateAddress(_) => "DuplicateAddress",
            Error::DuplicateKey(_) => "DuplicateKey",
            Error::WalletNotFound(_) => "WalletNotFound",
            Error::Registry(_) => "RegistryError",
            Error::PassInProgress => "PassInProgress",
            Error::Http(_) => "HttpError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
            Error::Anyhow(_) => "InternalError",
        }
    }

    /// Check if this error aborts a whole pass rather than a single wallet
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::MissingSetting(_) | Error::PassInProgress
        )
    }

    /// Check if this error belongs to registration, not to a pass
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidMnemonic(_)
                | Error::InvalidAddress(_)
                | Error::DuplicateAddress(_)
                | Error::DuplicateKey(_)
        )
    }
}

// Conversion from reqwest errors
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
