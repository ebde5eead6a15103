//! Token transfer execution
//!
//! Handles the actual on-chain transfer of a token between wallets: key
//! resolution, exact amount encoding, fee estimation and submission.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use tracing::{debug, info};

use crate::chain::units::to_base_units;
use crate::chain::{ChainGateway, TokenKind, TransferRequest};
use crate::error::{Error, Result};

use super::derive::{signer_from_key, signer_from_phrase};
use super::types::SigningHandle;

/// Transfer executor for token transfers
pub struct TransferExecutor {
    gateway: Arc<dyn ChainGateway>,
}

impl TransferExecutor {
    /// Create a new transfer executor
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve a signing handle into a signer
    pub fn resolve_signer(handle: &SigningHandle) -> Result<PrivateKeySigner> {
        match handle {
            SigningHandle::RecoveryPhrase {
                phrase,
                derivation_path,
            } => signer_from_phrase(phrase, derivation_path),
            SigningHandle::PrivateKey(key) => signer_from_key(key),
        }
    }

    /// Execute a transfer
    ///
    /// # Arguments
    /// * `from` - Signing handle of the source wallet
    /// * `to_address` - Destination address
    /// * `amount` - Amount in display units (e.g. 5.0 = 5 tokens)
    /// * `token` - Native coin or contract token
    ///
    /// # Returns
    /// Transaction hash once the node accepts it
    pub async fn execute(
        &self,
        from: &SigningHandle,
        to_address: &str,
        amount: f64,
        token: &TokenKind,
    ) -> Result<String> {
        let signer = Self::resolve_signer(from)?;
        self.execute_with_signer(&signer, to_address, amount, token)
            .await
    }

    /// Execute a transfer with an already resolved signer
    pub async fn execute_with_signer(
        &self,
        signer: &PrivateKeySigner,
        to_address: &str,
        amount: f64,
        token: &TokenKind,
    ) -> Result<String> {
        let to = to_address
            .trim()
            .parse::<Address>()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", to_address, e)))?;

        let raw_amount = to_base_units(amount, token.decimals())?;

        let request = TransferRequest {
            from: signer.address(),
            to,
            token: token.clone(),
            raw_amount,
        };

        debug!(
            "Executing transfer: {} ({} base units) of {} from {} to {}",
            amount, raw_amount, token, request.from, request.to
        );

        let fee = self
            .gateway
            .estimate_fee(&request)
            .await
            .map_err(|e| Error::TransferFailed {
                reason: e.to_string(),
            })?;

        let tx_hash = self
            .gateway
            .submit(signer, &request, &fee)
            .await
            .map_err(|e| Error::TransferFailed {
                reason: e.to_string(),
            })?;

        info!(
            "Transfer accepted: {} of {} to {} (tx: {})",
            amount, token, to_address, tx_hash
        );

        Ok(tx_hash)
    }
}
