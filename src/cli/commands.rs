//! CLI command implementations

use anyhow::Result;
use dialoguer::{Confirm, Password};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::chain::{ChainGateway, ExplorerClient, RpcGateway, TokenKind};
use crate::config::Config;
use crate::price::{PriceOracle, PriceQuote};
use crate::reconcile::{PassKind, PassReport, ReconciliationRunner, RunnerSettings};
use crate::wallet::derive::{generate_phrase, signer_address, signer_from_phrase, validate_address};
use crate::wallet::{JsonWalletRegistry, TransferExecutor, WalletRegistry};

/// Wire the runner to the node, explorer and wallets.json
fn build_runner(config: &Config) -> crate::Result<ReconciliationRunner> {
    let settings = RunnerSettings::from_config(config)?;
    let gateway = node_gateway(config)?
        .ok_or_else(|| crate::Error::MissingSetting("chain.rpc_url".to_string()))?;
    let registry = load_registry(config)?;

    Ok(ReconciliationRunner::new(
        settings,
        Arc::new(gateway),
        Arc::new(registry),
    ))
}

/// Gateway to the configured node, if one is configured
fn node_gateway(config: &Config) -> crate::Result<Option<RpcGateway>> {
    match config.chain.rpc_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Some(RpcGateway::new(
            url,
            config.chain.timeout_ms,
            explorer(config)?,
        )?)),
        _ => Ok(None),
    }
}

fn explorer(config: &Config) -> crate::Result<Option<ExplorerClient>> {
    if config.chain.explorer_url.trim().is_empty() {
        Ok(None)
    } else {
        ExplorerClient::new(&config.chain.explorer_url, config.chain.timeout_ms).map(Some)
    }
}

fn load_registry(config: &Config) -> crate::Result<JsonWalletRegistry> {
    JsonWalletRegistry::load(
        Path::new(&config.wallet.credentials_dir),
        &config.chain.derivation_path,
    )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a single sweep or top-up pass and print its report
pub async fn run_pass(config: &Config, kind: PassKind) -> Result<()> {
    let report = match build_runner(config) {
        Ok(runner) => runner.run(kind).await,
        Err(e) => Err(e),
    };

    match report {
        Ok(report) => {
            print_json(&report)?;
            Ok(())
        }
        Err(e) => {
            error!("{} pass aborted: {}", kind, e);
            print_json(&PassReport::failed(e.to_string()))?;
            anyhow::bail!("{} pass aborted ({})", kind, e.kind())
        }
    }
}

/// Run sweep then top-up and print both reports
pub async fn reconcile(config: &Config) -> Result<()> {
    let reports = match build_runner(config) {
        Ok(runner) => runner.reconcile().await,
        Err(e) => Err(e),
    };

    match reports {
        Ok(reports) => {
            print_json(&reports)?;
            if reports.iter().any(|r| !r.success) {
                anyhow::bail!("reconciliation incomplete");
            }
            Ok(())
        }
        Err(e) => {
            error!("Reconciliation aborted: {}", e);
            print_json(&PassReport::failed(e.to_string()))?;
            anyhow::bail!("reconciliation aborted ({})", e.kind())
        }
    }
}

/// Token balance of an account valued in fiat
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceSummary {
    success: bool,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    symbol: String,
    balance: String,
    /// Native coin balance, when a node is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    coin_balance: Option<String>,
    prices: BTreeMap<String, f64>,
    values: BTreeMap<String, String>,
}

/// Explorer, price and node access shared across one balance listing
struct BalanceLookup {
    explorer: ExplorerClient,
    oracle: PriceOracle,
    node: Option<RpcGateway>,
    currencies: Vec<String>,
    /// Fetched on first use, then reused for every address
    quote: Option<PriceQuote>,
}

impl BalanceLookup {
    /// Summarize the first token held by `address`.
    ///
    /// Lookup failures still produce a zero summary.
    async fn summarize(&mut self, address: &str, name: Option<String>) -> BalanceSummary {
        let mut summary = BalanceSummary {
            success: true,
            address: address.to_string(),
            name,
            symbol: String::new(),
            balance: "0.00".to_string(),
            coin_balance: None,
            prices: BTreeMap::new(),
            values: BTreeMap::new(),
        };

        if let Some(node) = &self.node {
            match node.token_balance(address, &TokenKind::NativeCoin).await {
                Ok(reading) => summary.coin_balance = Some(format!("{:.2}", reading.amount)),
                Err(e) => warn!("Skipping coin balance of {}: {}", address, e),
            }
        }

        let tokens = match self.explorer.account_tokens(address).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Skipping balance lookup for {}: {}", address, e);
                return summary;
            }
        };
        let Some(token) = tokens.first() else {
            info!("No tokens held by {}", address);
            return summary;
        };

        let amount = token.amount();
        summary.symbol = token.symbol.clone().unwrap_or_else(|| "TOKEN".to_string());
        summary.balance = format!("{:.2}", amount);

        if self.quote.is_none() {
            self.quote = Some(self.oracle.spot().await);
        }
        if let Some(quote) = &self.quote {
            summary.prices = self
                .currencies
                .iter()
                .map(|currency| (currency.to_lowercase(), quote.price(currency)))
                .collect();
            summary.values = quote
                .value_of(amount)
                .into_iter()
                .map(|(currency, value)| (currency, format!("{:.2}", value)))
                .collect();
        }
        summary
    }
}

/// Show the first token held by an address, or by every watched address,
/// and its fiat value
pub async fn balance(config: &Config, address: Option<&str>) -> Result<()> {
    let registry = load_registry(config)?;

    let addresses = match address {
        Some(address) => vec![validate_address(address)?],
        None => registry
            .list_addresses()
            .into_iter()
            .map(|watched| watched.address)
            .collect(),
    };
    if addresses.is_empty() {
        println!("No watched addresses. Add one with `sweeper address add`.");
        return Ok(());
    }

    let explorer = explorer(config)?
        .ok_or_else(|| anyhow::anyhow!("chain.explorer_url is required for balance lookups"))?;

    let mut lookup = BalanceLookup {
        explorer,
        oracle: PriceOracle::new(&config.price, config.chain.timeout_ms)?,
        node: node_gateway(config)?,
        currencies: config.price.vs_currencies.clone(),
        quote: None,
    };

    let mut summaries = Vec::with_capacity(addresses.len());
    for address in &addresses {
        let name = registry.display_name(address);
        summaries.push(lookup.summarize(address, name).await);
    }

    if address.is_some() {
        print_json(&summaries[0])
    } else {
        print_json(&summaries)
    }
}

/// Accepted one-off transfer
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferReceipt {
    success: bool,
    tx_hash: String,
    from: String,
    to: String,
    amount: f64,
    symbol: String,
}

/// One-off transfer resolved against configuration
#[derive(Debug)]
struct TransferPlan {
    from: String,
    to: String,
    amount: f64,
    symbol: String,
    token: TokenKind,
}

fn plan_transfer(
    config: &Config,
    from: &str,
    to: Option<&str>,
    amount: f64,
    symbol: &str,
) -> crate::Result<TransferPlan> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(crate::Error::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }

    let token = TokenKind::from_symbol(
        symbol,
        config.sweep.token_contract.as_deref().unwrap_or_default(),
        config.sweep.token_decimals,
    )?;

    let to = match to {
        Some(to) => to.to_string(),
        None => config
            .sweep
            .recipient
            .clone()
            .ok_or_else(|| crate::Error::MissingSetting("sweep.recipient".to_string()))?,
    };

    Ok(TransferPlan {
        from: validate_address(from)?,
        to: validate_address(&to)?,
        amount,
        symbol: symbol.trim().to_uppercase(),
        token,
    })
}

/// Send a one-off amount of B3TR or VET from a registered wallet
pub async fn transfer(
    config: &Config,
    from: &str,
    to: Option<&str>,
    amount: f64,
    symbol: &str,
    force: bool,
) -> Result<()> {
    let plan = plan_transfer(config, from, to, amount, symbol)?;
    let registry = load_registry(config)?;
    let handle = registry.signing_handle_for(&plan.from)?;
    let gateway = node_gateway(config)?
        .ok_or_else(|| crate::Error::MissingSetting("chain.rpc_url".to_string()))?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send {} {} from {} to {}?",
                plan.amount, plan.symbol, plan.from, plan.to
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let executor = TransferExecutor::new(Arc::new(gateway));
    let tx_hash = executor
        .execute(&handle, &plan.to, plan.amount, &plan.token)
        .await?;

    print_json(&TransferReceipt {
        success: true,
        tx_hash,
        from: plan.from,
        to: plan.to,
        amount: plan.amount,
        symbol: plan.symbol,
    })
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// List managed and funding wallets
pub async fn wallet_list(config: &Config) -> Result<()> {
    let registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    let managed = registry.list_managed()?;
    let funding = registry.list_funding()?;

    println!("\n=== MANAGED WALLETS ({}) ===\n", managed.len());
    println!("{:<38} {:<20} {:<44} {}", "ID", "NAME", "ADDRESS", "CREATED");
    println!("{}", "-".repeat(120));
    for wallet in &managed {
        println!(
            "{:<38} {:<20} {:<44} {}",
            wallet.id,
            wallet.name,
            wallet.address,
            wallet.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!("\n=== FUNDING WALLETS ({}) ===\n", funding.len());
    println!("{:<38} {:<20} {:<44} {}", "ID", "NAME", "ADDRESS", "CREATED");
    println!("{}", "-".repeat(120));
    for (i, wallet) in funding.iter().enumerate() {
        println!(
            "{:<38} {:<20} {:<44} {}{}",
            wallet.id,
            wallet.name,
            wallet.address,
            wallet.created_at.format("%Y-%m-%d %H:%M"),
            if i == 0 { "  (next funder)" } else { "" }
        );
    }

    println!();
    Ok(())
}

/// Prompt for a recovery phrase unless one was passed
fn read_phrase(phrase: Option<String>) -> Result<String> {
    match phrase {
        Some(phrase) => Ok(phrase),
        None => Ok(Password::new()
            .with_prompt("Recovery phrase (12 or 24 words)")
            .interact()?),
    }
}

fn registration_failure(e: crate::Error) -> anyhow::Error {
    if e.is_registration_error() {
        anyhow::anyhow!("Wallet rejected: {}", e)
    } else {
        anyhow::anyhow!("Failed to register wallet: {}", e)
    }
}

/// Register a managed wallet
pub async fn wallet_add(config: &Config, name: &str, phrase: Option<String>) -> Result<()> {
    let mut registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    let phrase = read_phrase(phrase)?;
    let wallet = registry
        .register_managed(&phrase, name)
        .map_err(registration_failure)?;

    println!("Managed wallet '{}' added", wallet.name);
    println!("ID:      {}", wallet.id);
    println!("Address: {}", wallet.address);
    Ok(())
}

/// Register a funding wallet
pub async fn wallet_add_funding(config: &Config, name: &str, phrase: Option<String>) -> Result<()> {
    let mut registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    let phrase = read_phrase(phrase)?;
    let wallet = registry
        .register_funding(&phrase, name)
        .map_err(registration_failure)?;

    println!("Funding wallet '{}' added", wallet.name);
    println!("ID:      {}", wallet.id);
    println!("Address: {}", wallet.address);
    Ok(())
}

/// Generate a wallet from a fresh recovery phrase, optionally registering it
pub async fn wallet_new(
    config: &Config,
    words: usize,
    name: Option<&str>,
    funding: bool,
) -> Result<()> {
    let phrase = generate_phrase(words)?;
    let signer = signer_from_phrase(&phrase, &config.chain.derivation_path)?;

    if let Some(name) = name {
        let mut registry = load_registry(config)
            .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;
        let id = if funding {
            registry.register_funding(&phrase, name).map_err(registration_failure)?.id
        } else {
            registry.register_managed(&phrase, name).map_err(registration_failure)?.id
        };
        println!("{} wallet '{}' added", if funding { "Funding" } else { "Managed" }, name);
        println!("ID:      {}", id);
    }

    println!("Address: {}", signer_address(&signer));
    println!("Phrase:  {}", phrase);
    println!("\nWrite the recovery phrase down offline. It is the only way to restore this wallet.");
    Ok(())
}

/// Soft delete a managed or funding wallet
pub async fn wallet_remove(config: &Config, id_or_address: &str, funding: bool, force: bool) -> Result<()> {
    let mut registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    let kind = if funding { "funding" } else { "managed" };

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove {} wallet {}?", kind, id_or_address))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let address = if funding {
        registry.soft_delete_funding(id_or_address)?.address
    } else {
        registry.soft_delete_managed(id_or_address)?.address
    };

    println!("Removed {} wallet {}", kind, address);
    Ok(())
}

/// List watched addresses
pub async fn address_list(config: &Config) -> Result<()> {
    let registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;
    let addresses = registry.list_addresses();

    println!("\n=== WATCHED ADDRESSES ({}) ===\n", addresses.len());
    println!("{:<38} {:<20} {:<44} {}", "ID", "NAME", "ADDRESS", "CREATED");
    println!("{}", "-".repeat(120));
    for watched in &addresses {
        println!(
            "{:<38} {:<20} {:<44} {}",
            watched.id,
            watched.name,
            watched.address,
            watched.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    Ok(())
}

/// Watch an address for balance display
pub async fn address_add(config: &Config, address: &str, name: &str) -> Result<()> {
    let mut registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    let watched = registry
        .add_address(address, name)
        .map_err(|e| anyhow::anyhow!("Address rejected: {}", e))?;

    println!("Watching '{}'", watched.name);
    println!("ID:      {}", watched.id);
    println!("Address: {}", watched.address);
    Ok(())
}

/// Stop watching an address
pub async fn address_remove(config: &Config, id_or_address: &str, force: bool) -> Result<()> {
    let mut registry = load_registry(config)
        .map_err(|e| anyhow::anyhow!("Failed to load wallet registry: {}", e))?;

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Stop watching {}?", id_or_address))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = registry.soft_delete_address(id_or_address)?;
    println!("Stopped watching {}", removed.address);
    Ok(())
}
