//! Chain access
//!
//! Everything the reconciliation engine needs from the network goes through
//! the [`ChainGateway`] trait:
//! - Gas-token ("energy") readings, from the explorer when one is configured
//!   and from the energy contract otherwise
//! - Native coin and contract token balance reads
//! - Fee estimation with a +10% price buffer
//! - Transfer submission (resolves on hash acceptance, not finality)
//!
//! # Architecture
//!
//! ```text
//! ReconciliationRunner → TransferExecutor → ChainGateway ← RpcGateway (alloy)
//!                                                 ↑
//!                                           ExplorerClient
//! ```

pub mod explorer;
pub mod rpc;
pub mod units;

#[cfg(test)]
pub(crate) mod fake_node;

use alloy::primitives::{address, Address, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::Result;

pub use explorer::ExplorerClient;
pub use rpc::RpcGateway;

/// Gas price buffer applied on top of the base fee, as a ratio
pub const FEE_BUFFER_NUMERATOR: u128 = 11;
pub const FEE_BUFFER_DENOMINATOR: u128 = 10;

/// Built-in contract of the energy (VTHO) gas token
pub const ENERGY_CONTRACT: Address = address!("0000000000000000000000000000456e65726779");

/// Ticker of the chain's native coin
pub const NATIVE_SYMBOL: &str = "VET";

/// Ticker of the reward token
pub const REWARD_SYMBOL: &str = "B3TR";

/// Token moved by a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// The chain's native value transfer
    NativeCoin,

    /// Contract token using `transfer(address, uint256)`
    FungibleToken { contract: Address, decimals: u8 },
}

impl TokenKind {
    /// Build a token kind from configuration; empty contract means native
    pub fn from_config(contract: &str, decimals: u8) -> Result<Self> {
        if contract.trim().is_empty() {
            return Ok(TokenKind::NativeCoin);
        }
        let contract = contract.trim().parse::<Address>().map_err(|e| {
            crate::error::Error::InvalidAddress(format!("{}: {}", contract, e))
        })?;
        Ok(TokenKind::FungibleToken { contract, decimals })
    }

    /// Resolve a ticker symbol: `VET` is the native coin, `B3TR` the
    /// configured reward token.
    pub fn from_symbol(symbol: &str, reward_contract: &str, reward_decimals: u8) -> Result<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol == NATIVE_SYMBOL {
            Ok(TokenKind::NativeCoin)
        } else if symbol == REWARD_SYMBOL {
            match Self::from_config(reward_contract, reward_decimals)? {
                TokenKind::NativeCoin => Err(crate::error::Error::MissingSetting(
                    "sweep.token_contract".to_string(),
                )),
                token => Ok(token),
            }
        } else {
            Err(crate::error::Error::UnsupportedToken(symbol))
        }
    }

    /// The energy gas token
    pub fn energy() -> Self {
        TokenKind::FungibleToken {
            contract: ENERGY_CONTRACT,
            decimals: 18,
        }
    }

    /// Whether this is the energy token, which [`ChainGateway::native_balance`] reads
    pub fn is_energy(&self) -> bool {
        matches!(self, TokenKind::FungibleToken { contract, .. } if *contract == ENERGY_CONTRACT)
    }

    /// Decimal precision of the token's base unit
    pub fn decimals(&self) -> u8 {
        match self {
            TokenKind::NativeCoin => 18,
            TokenKind::FungibleToken { decimals, .. } => *decimals,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::NativeCoin => write!(f, "native"),
            TokenKind::FungibleToken { contract, .. } => write!(f, "token {}", contract),
        }
    }
}

/// Balance observed for one address during a pass
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReading {
    /// Lowercase address the reading belongs to
    pub address: String,

    /// Amount in display units
    pub amount: f64,

    /// True when the endpoint was unreachable and zero was substituted
    pub fallback: bool,
}

impl BalanceReading {
    pub fn new(address: &str, amount: f64) -> Self {
        Self {
            address: address.to_lowercase(),
            amount,
            fallback: false,
        }
    }

    /// Zero reading standing in for an unreachable endpoint
    pub fn fallback(address: &str) -> Self {
        Self {
            address: address.to_lowercase(),
            amount: 0.0,
            fallback: true,
        }
    }
}

/// Unsigned transfer ready for fee estimation and submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub token: TokenKind,
    /// Amount in integer base units
    pub raw_amount: U256,
}

/// Gas parameters for a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSpec {
    pub gas_limit: u64,
    pub gas_price: u128,
    /// Whether the price came from the base fee plus buffer
    pub buffered: bool,
}

impl FeeSpec {
    /// Fee from a block base fee with the +10% buffer
    pub fn from_base_fee(gas_limit: u64, base_fee: u128) -> Self {
        Self {
            gas_limit,
            gas_price: base_fee * FEE_BUFFER_NUMERATOR / FEE_BUFFER_DENOMINATOR,
            buffered: true,
        }
    }

    /// Fee from the node's own gas price suggestion
    pub fn from_node_price(gas_limit: u64, gas_price: u128) -> Self {
        Self {
            gas_limit,
            gas_price,
            buffered: false,
        }
    }
}

/// Narrow interface over node RPC and explorer access
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Gas-token ("energy") balance of an address.
    ///
    /// An unreachable endpoint yields a fallback reading of zero.
    async fn native_balance(&self, address: &str) -> Result<BalanceReading>;

    /// Balance of `token` held by an address, read from the node
    async fn token_balance(&self, address: &str, token: &TokenKind) -> Result<BalanceReading>;

    /// Gas limit and buffered gas price for a transfer
    async fn estimate_fee(&self, request: &TransferRequest) -> Result<FeeSpec>;

    /// Sign and broadcast; returns the transaction hash once accepted
    async fn submit(
        &self,
        signer: &PrivateKeySigner,
        request: &TransferRequest,
        fee: &FeeSpec,
    ) -> Result<String>;
}
