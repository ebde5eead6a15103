//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::wallet::derive::VECHAIN_DERIVATION_PATH;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default)]
    pub top_up: TopUpConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub price: PriceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Node JSON-RPC endpoint. Required for passes.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: Option<String>,

    /// Block explorer API used for energy readings and display.
    /// Empty string disables the explorer; energy is then read from its
    /// token contract on the node.
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// BIP-44 path used to derive signing keys from recovery phrases
    #[serde(default = "default_derivation_path")]
    pub derivation_path: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            explorer_url: default_explorer_url(),
            timeout_ms: default_timeout_ms(),
            derivation_path: default_derivation_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Address receiving swept reward tokens. Required for sweep passes.
    #[serde(default = "default_recipient")]
    pub recipient: Option<String>,

    /// Reward token contract. Required for sweep passes.
    #[serde(default = "default_sweep_token")]
    pub token_contract: Option<String>,

    #[serde(default = "default_decimals")]
    pub token_decimals: u8,

    /// Sweep when the reward balance is at or above this
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Fixed amount moved per sweep
    #[serde(default)]
    pub amount: Option<f64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            recipient: default_recipient(),
            token_contract: default_sweep_token(),
            token_decimals: default_decimals(),
            threshold: None,
            amount: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopUpConfig {
    /// Top up when the gas balance is below this
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Fixed amount sent per top-up
    #[serde(default)]
    pub amount: Option<f64>,

    /// Gas token contract, both measured and sent by top-up passes.
    /// Empty string uses the native coin instead.
    #[serde(default = "default_energy_token")]
    pub token_contract: String,

    #[serde(default = "default_decimals")]
    pub token_decimals: u8,

    /// What to do when the gas balance endpoint is unreachable
    #[serde(default)]
    pub on_unreadable_balance: UnreadableBalance,
}

impl Default for TopUpConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            amount: None,
            token_contract: default_energy_token(),
            token_decimals: default_decimals(),
            on_unreadable_balance: UnreadableBalance::default(),
        }
    }
}

/// Handling of a zero reading substituted for an unreachable balance endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnreadableBalance {
    /// Record a balance read error for the wallet and take no action
    #[default]
    Skip,
    /// Decide on a zero balance (tops the wallet up)
    AssumeZero,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Directory holding wallets.json
    #[serde(default = "default_credentials_dir")]
    pub credentials_dir: String,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            credentials_dir: default_credentials_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_price_api_url")]
    pub api_url: String,

    /// Price oracle id of the reward token
    #[serde(default = "default_coin_id")]
    pub coin_id: String,

    #[serde(default = "default_vs_currencies")]
    pub vs_currencies: Vec<String>,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: default_price_api_url(),
            coin_id: default_coin_id(),
            vs_currencies: default_vs_currencies(),
        }
    }
}

// Default value functions
fn default_rpc_url() -> Option<String> {
    std::env::var("VECHAIN_RPC_URL").ok().filter(|s| !s.is_empty())
}

fn default_explorer_url() -> String {
    "https://explore.vechain.org/api".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_derivation_path() -> String {
    VECHAIN_DERIVATION_PATH.to_string()
}

fn default_recipient() -> Option<String> {
    std::env::var("RECIPIENT_ADDRESS").ok().filter(|s| !s.is_empty())
}

fn default_sweep_token() -> Option<String> {
    // B3TR
    Some("0x5ef79995FE8a89e0812330E4378eB2660ceDe699".to_string())
}

fn default_energy_token() -> String {
    // VTHO
    "0x0000000000000000000000000000456E65726779".to_string()
}

fn default_decimals() -> u8 {
    18
}

fn default_credentials_dir() -> String {
    "credentials".to_string()
}

fn default_price_api_url() -> String {
    "https://api.coingecko.com/api/v3".to_string()
}

fn default_coin_id() -> String {
    "vebetterdao".to_string()
}

fn default_vs_currencies() -> Vec<String> {
    vec!["usd".to_string(), "pkr".to_string()]
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("chain.explorer_url", default_explorer_url())?
            .set_default("chain.timeout_ms", default_timeout_ms() as i64)?
            .set_default("chain.derivation_path", default_derivation_path())?
            .set_default("wallet.credentials_dir", default_credentials_dir())?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SWEEPER_)
            .add_source(
                config::Environment::with_prefix("SWEEPER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("price.vs_currencies")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate the shape of configured values.
    ///
    /// Presence of the settings a pass needs is checked when the pass starts,
    /// so wallet management commands work with a partial configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chain.timeout_ms == 0 {
            anyhow::bail!("chain.timeout_ms must be positive");
        }

        if !self.chain.derivation_path.starts_with("m/") {
            anyhow::bail!(
                "chain.derivation_path must start with m/, got {}",
                self.chain.derivation_path
            );
        }

        if let Some(recipient) = &self.sweep.recipient {
            validate_address("sweep.recipient", recipient)?;
        }

        if let Some(token) = &self.sweep.token_contract {
            validate_address("sweep.token_contract", token)?;
        }

        if !self.top_up.token_contract.is_empty() {
            validate_address("top_up.token_contract", &self.top_up.token_contract)?;
        }

        for (name, value) in [
            ("sweep.threshold", self.sweep.threshold),
            ("sweep.amount", self.sweep.amount),
            ("top_up.threshold", self.top_up.threshold),
            ("top_up.amount", self.top_up.amount),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    anyhow::bail!("{} must be a positive number, got {}", name, v);
                }
            }
        }

        if let (Some(threshold), Some(amount)) = (self.sweep.threshold, self.sweep.amount) {
            if amount > threshold {
                anyhow::bail!(
                    "sweep.amount ({}) cannot exceed sweep.threshold ({})",
                    amount,
                    threshold
                );
            }
        }

        if self.sweep.token_decimals > 36 || self.top_up.token_decimals > 36 {
            anyhow::bail!("token decimals cannot exceed 36");
        }

        if self.price.vs_currencies.is_empty() {
            tracing::warn!("price.vs_currencies is empty - balance display will show no fiat value");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Chain:
    rpc_url: {}
    explorer_url: {}
    timeout: {}ms
    derivation_path: {}
  Sweep:
    recipient: {}
    token_contract: {}
    threshold: {}
    amount: {}
  Top-up:
    token_contract: {}
    threshold: {}
    amount: {}
    on_unreadable_balance: {:?}
  Wallet:
    credentials_dir: {}
  Price:
    api_url: {}
    coin_id: {}
    vs_currencies: {:?}
"#,
            self.chain
                .rpc_url
                .as_deref()
                .map(mask_url)
                .unwrap_or_else(|| "(not set)".to_string()),
            mask_url(&self.chain.explorer_url),
            self.chain.timeout_ms,
            self.chain.derivation_path,
            display_opt(&self.sweep.recipient),
            display_opt(&self.sweep.token_contract),
            display_num(self.sweep.threshold),
            display_num(self.sweep.amount),
            if self.top_up.token_contract.is_empty() {
                "(native coin)"
            } else {
                &self.top_up.token_contract
            },
            display_num(self.top_up.threshold),
            display_num(self.top_up.amount),
            self.top_up.on_unreadable_balance,
            self.wallet.credentials_dir,
            mask_url(&self.price.api_url),
            self.price.coin_id,
            self.price.vs_currencies,
        )
    }
}

/// Check a 0x-prefixed 20-byte hex address
fn validate_address(name: &str, value: &str) -> Result<()> {
    let re = regex::Regex::new(r"^0x[0-9a-fA-F]{40}$").context("address pattern")?;
    if !re.is_match(value.trim()) {
        anyhow::bail!("{} is not a valid address: {}", name, value);
    }
    Ok(())
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

fn display_num(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            sweep: SweepConfig::default(),
            top_up: TopUpConfig::default(),
            wallet: WalletConfig::default(),
            price: PriceConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chain.derivation_path, "m/44'/818'/0'/0/0");
        assert_eq!(config.sweep.token_decimals, 18);
        assert_eq!(config.top_up.on_unreadable_balance, UnreadableBalance::Skip);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unreadable_balance_deserialize() {
        let json = r#""assume_zero""#;
        let policy: UnreadableBalance = serde_json::from_str(json).unwrap();
        assert_eq!(policy, UnreadableBalance::AssumeZero);
    }

    #[test]
    fn test_rejects_bad_recipient() {
        let mut config = Config::default();
        config.sweep.recipient = Some("not-an-address".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_sweep_amount_above_threshold() {
        let mut config = Config::default();
        config.sweep.threshold = Some(5.0);
        config.sweep.amount = Some(6.0);
        assert!(config.validate().is_err());

        config.sweep.amount = Some(5.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_thresholds() {
        let mut config = Config::default();
        config.top_up.threshold = Some(0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[chain]
rpc_url = "https://node.example.com"
explorer_url = ""

[sweep]
recipient = "0x00000000000000000000000000000000000000aa"
threshold = 5.0
amount = 5.0

[top_up]
threshold = 10.0
amount = 20.0
on_unreadable_balance = "assume_zero"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.chain.rpc_url.as_deref(), Some("https://node.example.com"));
        assert!(config.chain.explorer_url.is_empty());
        assert_eq!(config.sweep.threshold, Some(5.0));
        assert_eq!(config.top_up.amount, Some(20.0));
        assert_eq!(
            config.top_up.on_unreadable_balance,
            UnreadableBalance::AssumeZero
        );
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://api.example.com?key=secret"),
            "https://api.example.com?***"
        );
        assert_eq!(
            mask_url("https://api.example.com"),
            "https://api.example.com"
        );
    }
}
