//! Key derivation from recovery phrases
//!
//! Wallets are derived with the standard BIP-39/BIP-44 scheme. VeChain uses
//! coin type 818, so the first account lives at `m/44'/818'/0'/0/0`.

use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// First account on VeChain's BIP-44 path
pub const VECHAIN_DERIVATION_PATH: &str = "m/44'/818'/0'/0/0";

/// Accepted recovery phrase lengths
const VALID_WORD_COUNTS: [usize; 2] = [12, 24];

static ADDRESS_PATTERN: OnceLock<Regex> = OnceLock::new();

fn address_pattern() -> &'static Regex {
    ADDRESS_PATTERN.get_or_init(|| Regex::new(r"^0x[0-9a-f]{40}$").expect("Invalid address regex"))
}

/// Normalize a recovery phrase and check its word count.
///
/// Returns the words joined by single spaces.
pub fn normalize_phrase(phrase: &str) -> Result<String> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    if !VALID_WORD_COUNTS.contains(&words.len()) {
        return Err(Error::InvalidMnemonic(format!(
            "recovery phrase must be 12 or 24 words, got {}",
            words.len()
        )));
    }
    Ok(words.join(" "))
}

/// Fresh random recovery phrase of 12 or 24 words
pub fn generate_phrase(word_count: usize) -> Result<String> {
    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(Error::InvalidMnemonic(format!(
            "recovery phrase must be 12 or 24 words, got {}",
            word_count
        )));
    }

    let mnemonic = Mnemonic::<English>::new_with_count(&mut rand::thread_rng(), word_count)
        .map_err(|e| Error::Derivation(e.to_string()))?;
    Ok(mnemonic.to_phrase())
}

/// Derive a signer from a recovery phrase at the given path
pub fn signer_from_phrase(phrase: &str, derivation_path: &str) -> Result<PrivateKeySigner> {
    let phrase = normalize_phrase(phrase).map_err(|e| Error::Derivation(e.to_string()))?;

    MnemonicBuilder::<English>::default()
        .phrase(phrase)
        .derivation_path(derivation_path)
        .map_err(|e| Error::Derivation(format!("invalid derivation path {}: {}", derivation_path, e)))?
        .build()
        .map_err(|e| Error::Derivation(e.to_string()))
}

/// Load a signer from a cached hex private key (with or without 0x)
pub fn signer_from_key(private_key_hex: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key_hex.trim().trim_start_matches("0x");
    if trimmed.len() != 64 {
        return Err(Error::Derivation(format!(
            "private key must be 64 hex characters, got {}",
            trimmed.len()
        )));
    }

    trimmed
        .parse::<PrivateKeySigner>()
        .map_err(|e| Error::Derivation(format!("invalid private key: {}", e)))
}

/// Hex encoding of a signer's private key, without 0x prefix
pub fn private_key_hex(signer: &PrivateKeySigner) -> String {
    alloy::hex::encode(signer.to_bytes())
}

/// Lowercase 0x-prefixed address of a signer
pub fn signer_address(signer: &PrivateKeySigner) -> String {
    normalize_address(&signer.address().to_string())
}

/// Lowercase and trim an address for storage and comparison
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Normalize an address, rejecting anything but 0x and 40 hex digits
pub fn validate_address(address: &str) -> Result<String> {
    let normalized = normalize_address(address);
    if address_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(Error::InvalidAddress(address.trim().to_string()))
    }
}
