//! Node RPC gateway
//!
//! Implements [`ChainGateway`] on top of an alloy HTTP provider. One gateway
//! is constructed per process and passed to the runner; there is no shared
//! global client. Every node request is bounded by the configured timeout.

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::explorer::ExplorerClient;
use super::units::from_base_units;
use super::{BalanceReading, ChainGateway, FeeSpec, TokenKind, TransferRequest};

// ── Token contract interface ───────────────────────────────────────

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    contract IToken {
        function balanceOf(address owner) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Gateway backed by a node's JSON-RPC endpoint and an optional explorer
pub struct RpcGateway {
    rpc_url: reqwest::Url,
    /// Shared by the read provider and every signing provider
    http: reqwest::Client,
    provider: DynProvider,
    explorer: Option<ExplorerClient>,
}

impl RpcGateway {
    /// Connect to a node. An explorer is used for energy readings when given.
    pub fn new(rpc_url: &str, timeout_ms: u64, explorer: Option<ExplorerClient>) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid rpc url {}: {}", rpc_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build rpc client: {}", e)))?;

        let provider = ProviderBuilder::new()
            .connect_reqwest(http.clone(), url.clone())
            .erased();

        Ok(Self {
            rpc_url: url,
            http,
            provider,
            explorer,
        })
    }

    fn parse_address(address: &str) -> Result<Address> {
        address
            .trim()
            .parse::<Address>()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
    }

    /// Unsigned transaction for a transfer request
    fn build_transaction(request: &TransferRequest) -> TransactionRequest {
        match &request.token {
            TokenKind::NativeCoin => TransactionRequest::default()
                .with_from(request.from)
                .with_to(request.to)
                .with_value(request.raw_amount),
            TokenKind::FungibleToken { contract, .. } => {
                let call = IToken::transferCall {
                    to: request.to,
                    amount: request.raw_amount,
                };
                TransactionRequest::default()
                    .with_from(request.from)
                    .with_to(*contract)
                    .with_input(Bytes::from(call.abi_encode()))
            }
        }
    }

    async fn node_balance(&self, address: &str) -> Result<BalanceReading> {
        let owner = Self::parse_address(address)?;
        let raw: U256 = self
            .provider
            .get_balance(owner)
            .await
            .map_err(|e| Error::BalanceRead {
                address: address.to_lowercase(),
                reason: e.to_string(),
            })?;
        Ok(BalanceReading::new(address, from_base_units(raw, 18)))
    }
}

#[async_trait]
impl ChainGateway for RpcGateway {
    async fn native_balance(&self, address: &str) -> Result<BalanceReading> {
        if let Some(explorer) = &self.explorer {
            return Ok(explorer.energy(address).await);
        }

        match self.token_balance(address, &TokenKind::energy()).await {
            Ok(reading) => Ok(reading),
            Err(e) => {
                warn!("Failed to read energy for {}: {}", address, e);
                Ok(BalanceReading::fallback(address))
            }
        }
    }

    async fn token_balance(&self, address: &str, token: &TokenKind) -> Result<BalanceReading> {
        let (contract, decimals) = match token {
            TokenKind::NativeCoin => return self.node_balance(address).await,
            TokenKind::FungibleToken { contract, decimals } => (*contract, *decimals),
        };

        let owner = Self::parse_address(address)?;
        let raw: U256 = IToken::new(contract, &self.provider)
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| Error::BalanceRead {
                address: address.to_lowercase(),
                reason: e.to_string(),
            })?;

        let amount = from_base_units(raw, decimals);
        debug!("Token balance of {} at {}: {}", address, contract, amount);
        Ok(BalanceReading::new(address, amount))
    }

    async fn estimate_fee(&self, request: &TransferRequest) -> Result<FeeSpec> {
        let fee_error = |reason: String| Error::FeeEstimation {
            address: request.from.to_string().to_lowercase(),
            reason,
        };

        let tx = Self::build_transaction(request);
        let gas_limit = self
            .provider
            .estimate_gas(tx)
            .await
            .map_err(|e| fee_error(format!("gas estimate: {}", e)))?;

        let latest = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| fee_error(format!("latest block: {}", e)))?;

        let base_fee = latest.and_then(|block| block.header.base_fee_per_gas);

        let fee = match base_fee {
            Some(base_fee) => FeeSpec::from_base_fee(gas_limit, base_fee as u128),
            None => {
                // No fee market on this network
                let price = self
                    .provider
                    .get_gas_price()
                    .await
                    .map_err(|e| fee_error(format!("gas price: {}", e)))?;
                FeeSpec::from_node_price(gas_limit, price)
            }
        };

        debug!(
            "Fee for transfer from {}: gas={} price={} buffered={}",
            request.from, fee.gas_limit, fee.gas_price, fee.buffered
        );
        Ok(fee)
    }

    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        request: &TransferRequest,
        fee: &FeeSpec,
    ) -> Result<String> {
        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_reqwest(self.http.clone(), self.rpc_url.clone());

        let tx = Self::build_transaction(request)
            .with_gas_limit(fee.gas_limit)
            .with_gas_price(fee.gas_price);

        // Resolves once the node accepts the hash; no receipt wait
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| Error::Submission {
                address: request.from.to_string().to_lowercase(),
                reason: e.to_string(),
            })?;

        let tx_hash = pending.tx_hash().to_string();
        info!(
            "Submitted {} transfer {} -> {} (tx: {})",
            request.token, request.from, request.to, tx_hash
        );
        Ok(tx_hash)
    }
}
