//! Block explorer client
//!
//! Reads account energy (the gas token balance) and token holdings from the
//! explorer's account endpoint. Response shapes vary between explorer
//! versions, so energy is looked up through a list of known field paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::units::{from_base_units, parse_quantity};
use super::BalanceReading;

/// Field paths that may carry the account energy, in lookup order
const ENERGY_PATHS: [&str; 3] = ["/account/energy", "/energy", "/data/energy"];

/// Energy uses 18 decimals
const ENERGY_DECIMALS: u8 = 18;

/// Token held by an account, as reported by the explorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHolding {
    #[serde(default)]
    pub symbol: Option<String>,
    /// Balance in base units (decimal or hex string)
    #[serde(default)]
    pub balance: Value,
    #[serde(default = "default_token_decimals")]
    pub decimals: u8,
}

fn default_token_decimals() -> u8 {
    18
}

impl TokenHolding {
    /// Balance in display units; malformed values read as zero
    pub fn amount(&self) -> f64 {
        quantity_from_value(&self.balance, self.decimals).unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
struct AccountTokens {
    #[serde(default)]
    tokens: Vec<TokenHolding>,
}

/// HTTP client for the explorer account API
pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
}

impl ExplorerClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn account_url(&self, address: &str) -> String {
        format!("{}/accounts/{}", self.base_url, address.to_lowercase())
    }

    /// Fetch the raw account document
    async fn fetch_account(&self, address: &str) -> Result<Value> {
        let url = self.account_url(address);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Http(format!(
                "explorer returned {} for {}",
                resp.status(),
                address
            )));
        }

        Ok(resp.json::<Value>().await?)
    }

    /// Energy balance of an account.
    ///
    /// Never fails: an unreachable explorer or non-200 status produces a
    /// fallback reading of zero so one bad lookup cannot stop a batch.
    pub async fn energy(&self, address: &str) -> BalanceReading {
        match self.fetch_account(address).await {
            Ok(doc) => {
                let amount = energy_from_document(&doc);
                debug!("Explorer energy for {}: {}", address, amount);
                BalanceReading::new(address, amount)
            }
            Err(e) => {
                warn!("Failed to fetch energy for {}: {}", address, e);
                BalanceReading::fallback(address)
            }
        }
    }

    /// Token holdings of an account, for display
    pub async fn account_tokens(&self, address: &str) -> Result<Vec<TokenHolding>> {
        let doc = self.fetch_account(address).await?;
        let parsed: AccountTokens = serde_json::from_value(doc)?;
        Ok(parsed.tokens)
    }
}

/// Pull the energy out of an account document, defaulting to zero
pub fn energy_from_document(doc: &Value) -> f64 {
    ENERGY_PATHS
        .iter()
        .filter_map(|path| doc.pointer(path))
        .find(|v| !v.is_null())
        .and_then(|v| quantity_from_value(v, ENERGY_DECIMALS))
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Interpret a JSON value as a base-unit quantity
fn quantity_from_value(value: &Value, decimals: u8) -> Option<f64> {
    match value {
        Value::String(s) => parse_quantity(s, decimals).ok(),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(from_base_units(alloy::primitives::U256::from(u), decimals))
            } else {
                n.as_f64().map(|f| f / 10f64.powi(decimals as i32))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake_node::FakeNode;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_energy_nested_under_account() {
        let doc = json!({ "account": { "energy": "0x22b1c8c1227a0000" } });
        assert_eq!(energy_from_document(&doc), 2.5);
    }

    #[test]
    fn test_energy_at_top_level() {
        let doc = json!({ "energy": "0xde0b6b3a7640000" });
        assert_eq!(energy_from_document(&doc), 1.0);
    }

    #[test]
    fn test_energy_under_data() {
        let doc = json!({ "data": { "energy": "3000000000000000000" } });
        assert_eq!(energy_from_document(&doc), 3.0);
    }

    #[test]
    fn test_path_order_prefers_account() {
        let doc = json!({
            "account": { "energy": "0xde0b6b3a7640000" },
            "energy": "0x22b1c8c1227a0000"
        });
        assert_eq!(energy_from_document(&doc), 1.0);
    }

    #[test]
    fn test_missing_or_garbage_energy_is_zero() {
        assert_eq!(energy_from_document(&json!({})), 0.0);
        assert_eq!(energy_from_document(&json!({ "energy": "nope" })), 0.0);
        assert_eq!(energy_from_document(&json!({ "energy": null })), 0.0);
    }

    #[test]
    fn test_token_holding_amount() {
        let holding: TokenHolding = serde_json::from_value(json!({
            "symbol": "B3TR",
            "balance": "12500000000000000000",
            "decimals": 18
        }))
        .unwrap();
        assert_eq!(holding.amount(), 12.5);
    }

    #[tokio::test]
    async fn test_unreachable_explorer_falls_back_to_zero() {
        // Port 9 (discard) on localhost refuses connections
        let client = ExplorerClient::new("http://127.0.0.1:9", 500).unwrap();
        let reading = client.energy("0xABC").await;
        assert!(reading.fallback);
        assert_eq!(reading.amount, 0.0);
        assert_eq!(reading.address, "0xabc");
    }

    #[tokio::test]
    async fn test_silent_explorer_falls_back_within_timeout() {
        let node = FakeNode::silent().await;
        let client = ExplorerClient::new(node.url(), 300).unwrap();

        let reading = tokio::time::timeout(Duration::from_secs(5), client.energy("0xabc"))
            .await
            .expect("explorer request outlived its timeout");
        assert!(reading.fallback);
    }

    #[tokio::test]
    async fn test_account_tokens_and_missing_account() {
        let node = FakeNode::builder()
            .account(
                "0xABC",
                json!({ "tokens": [{ "symbol": "B3TR", "balance": "0x22b1c8c1227a0000" }] }),
            )
            .start()
            .await;
        let client = ExplorerClient::new(node.url(), 2_000).unwrap();

        let tokens = client.account_tokens("0xabc").await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol.as_deref(), Some("B3TR"));
        assert_eq!(tokens[0].amount(), 2.5);

        assert!(matches!(
            client.account_tokens("0xdef").await,
            Err(Error::Http(_))
        ));
        assert!(client.energy("0xdef").await.fallback);
    }
}
