// Spot price client for balance display
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::PriceConfig;

/// Spot prices of one coin keyed by fiat currency
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceQuote {
    pub coin_id: String,
    pub prices: BTreeMap<String, f64>,
}

impl PriceQuote {
    /// Quote with every currency at zero
    pub fn zero(coin_id: &str, currencies: &[String]) -> Self {
        Self {
            coin_id: coin_id.to_string(),
            prices: currencies.iter().map(|c| (c.to_lowercase(), 0.0)).collect(),
        }
    }

    pub fn price(&self, currency: &str) -> f64 {
        self.prices
            .get(&currency.to_lowercase())
            .copied()
            .unwrap_or(0.0)
    }

    /// Value of `amount` coins in each quoted currency
    pub fn value_of(&self, amount: f64) -> BTreeMap<String, f64> {
        self.prices
            .iter()
            .map(|(currency, price)| (currency.clone(), amount * price))
            .collect()
    }
}

pub struct PriceOracle {
    client: reqwest::Client,
    api_url: String,
    coin_id: String,
    vs_currencies: Vec<String>,
}

impl PriceOracle {
    pub fn new(config: &PriceConfig, timeout_ms: u64) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            coin_id: config.coin_id.clone(),
            vs_currencies: config.vs_currencies.iter().map(|c| c.to_lowercase()).collect(),
        })
    }

    fn price_url(&self) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.api_url,
            self.coin_id,
            self.vs_currencies.join(",")
        )
    }

    /// Current spot price. Any failure yields zero prices.
    pub async fn spot(&self) -> PriceQuote {
        if self.vs_currencies.is_empty() {
            return PriceQuote::zero(&self.coin_id, &[]);
        }

        match self.fetch().await {
            Ok(doc) => {
                let quote = quote_from_document(&doc, &self.coin_id, &self.vs_currencies);
                debug!("Spot price for {}: {:?}", self.coin_id, quote.prices);
                quote
            }
            Err(e) => {
                warn!("Price lookup for {} failed: {}", self.coin_id, e);
                PriceQuote::zero(&self.coin_id, &self.vs_currencies)
            }
        }
    }

    async fn fetch(&self) -> anyhow::Result<Value> {
        let resp = self.client.get(self.price_url()).send().await?;

        if !resp.status().is_success() {
            anyhow::bail!("price API returned {}", resp.status());
        }

        Ok(resp.json::<Value>().await?)
    }
}

/// Read `{ "<coin>": { "<currency>": price } }`, missing entries as zero
pub fn quote_from_document(doc: &Value, coin_id: &str, currencies: &[String]) -> PriceQuote {
    let prices = currencies
        .iter()
        .map(|currency| {
            let price = doc
                .get(coin_id)
                .and_then(|coin| coin.get(currency.as_str()))
                .and_then(Value::as_f64)
                .filter(|p| p.is_finite())
                .unwrap_or(0.0);
            (currency.clone(), price)
        })
        .collect();

    PriceQuote {
        coin_id: coin_id.to_string(),
        prices,
    }
}
