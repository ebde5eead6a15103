//! Reconciliation runner
//!
//! Orchestrates one pass over the managed wallets: snapshot, read balance,
//! decide, select a funder, transfer, record. A failing wallet never stops
//! the rest of the batch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chain::{ChainGateway, TokenKind};
use crate::config::{Config, SweepConfig, TopUpConfig, UnreadableBalance};
use crate::error::{Error, Result};
use crate::wallet::derive::{normalize_address, signer_address};
use crate::wallet::{FundingWallet, ManagedWallet, TransferExecutor, WalletRegistry};

use super::policy::{ActionDecision, ThresholdPolicy};
use super::selector::select_funder;
use super::types::{PassKind, PassReport, TransferOutcome};

/// Settings a runner needs, taken from the loaded configuration.
///
/// Per-pass settings are checked when that pass starts, so a sweep can run
/// with the top-up section left empty and vice versa.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub derivation_path: String,
    sweep: SweepConfig,
    top_up: TopUpConfig,
}

/// Resolved settings for a sweep pass
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub recipient: String,
    pub token: TokenKind,
    pub policy: ThresholdPolicy,
}

/// Resolved settings for a top-up pass
#[derive(Debug, Clone)]
pub struct TopUpPlan {
    pub token: TokenKind,
    pub policy: ThresholdPolicy,
    pub on_unreadable_balance: UnreadableBalance,
}

impl RunnerSettings {
    /// Build settings from configuration. The node endpoint is required for
    /// any pass.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.chain.rpc_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {}
            _ => return Err(Error::MissingSetting("chain.rpc_url".to_string())),
        }

        Ok(Self {
            derivation_path: config.chain.derivation_path.clone(),
            sweep: config.sweep.clone(),
            top_up: config.top_up.clone(),
        })
    }

    pub fn sweep_plan(&self) -> Result<SweepPlan> {
        let recipient = required_text("sweep.recipient", &self.sweep.recipient)?;
        let contract = required_text("sweep.token_contract", &self.sweep.token_contract)?;
        let threshold = required_number("sweep.threshold", self.sweep.threshold)?;
        let amount = required_number("sweep.amount", self.sweep.amount)?;

        Ok(SweepPlan {
            recipient: normalize_address(&recipient),
            token: TokenKind::from_config(&contract, self.sweep.token_decimals)
                .map_err(|e| Error::Config(e.to_string()))?,
            policy: ThresholdPolicy::sweep_only(threshold, amount)?,
        })
    }

    pub fn top_up_plan(&self) -> Result<TopUpPlan> {
        let threshold = required_number("top_up.threshold", self.top_up.threshold)?;
        let amount = required_number("top_up.amount", self.top_up.amount)?;

        Ok(TopUpPlan {
            token: TokenKind::from_config(&self.top_up.token_contract, self.top_up.token_decimals)
                .map_err(|e| Error::Config(e.to_string()))?,
            policy: ThresholdPolicy::top_up_only(threshold, amount)?,
            on_unreadable_balance: self.top_up.on_unreadable_balance,
        })
    }
}

fn required_text(name: &str, value: &Option<String>) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::MissingSetting(name.to_string()))
}

fn required_number(name: &str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| Error::MissingSetting(name.to_string()))
}

/// Funding pool loaded at most once per pass
type FundingSnapshot = Option<Result<Vec<FundingWallet>>>;

/// Runs sweep and top-up passes over the managed wallets
pub struct ReconciliationRunner {
    settings: RunnerSettings,
    gateway: Arc<dyn ChainGateway>,
    registry: Arc<dyn WalletRegistry>,
    executor: TransferExecutor,
    /// Held for the whole pass
    run_lock: Mutex<()>,
}

impl ReconciliationRunner {
    pub fn new(
        settings: RunnerSettings,
        gateway: Arc<dyn ChainGateway>,
        registry: Arc<dyn WalletRegistry>,
    ) -> Self {
        Self {
            settings,
            executor: TransferExecutor::new(gateway.clone()),
            gateway,
            registry,
            run_lock: Mutex::new(()),
        }
    }

    /// Run one pass.
    ///
    /// Fails without touching any wallet when settings are missing or another
    /// pass holds the lock. Per-wallet failures are recorded in the report.
    pub async fn run(&self, kind: PassKind) -> Result<PassReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::PassInProgress)?;
        self.run_locked(kind).await
    }

    /// Sweep pass followed by top-up pass under one lock.
    ///
    /// A pass that cannot start is reported as failed and does not prevent
    /// the other from running.
    pub async fn reconcile(&self) -> Result<Vec<PassReport>> {
        let _guard = self.run_lock.try_lock().map_err(|_| Error::PassInProgress)?;

        let mut reports = Vec::with_capacity(2);
        for kind in [PassKind::Sweep, PassKind::TopUp] {
            let report = match self.run_locked(kind).await {
                Ok(report) => report,
                Err(e) => {
                    error!("{} pass could not start: {}", kind, e);
                    PassReport::failed(e.to_string())
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    async fn run_locked(&self, kind: PassKind) -> Result<PassReport> {
        let pass_id = Uuid::new_v4().to_string();
        let span = info_span!("pass", pass_id = %pass_id, kind = %kind);

        async {
            let started_at = Utc::now();

            let results = match kind {
                PassKind::Sweep => {
                    let plan = self.settings.sweep_plan()?;
                    let wallets = self.snapshot()?;
                    info!("Starting sweep pass over {} wallets", wallets.len());

                    let mut results = Vec::with_capacity(wallets.len());
                    for wallet in &wallets {
                        results.push(self.sweep_wallet(&plan, wallet).await);
                    }
                    results
                }
                PassKind::TopUp => {
                    let plan = self.settings.top_up_plan()?;
                    let wallets = self.snapshot()?;
                    info!("Starting top-up pass over {} wallets", wallets.len());

                    let mut funding: FundingSnapshot = None;
                    let mut results = Vec::with_capacity(wallets.len());
                    for wallet in &wallets {
                        results.push(self.top_up_wallet(&plan, wallet, &mut funding).await);
                    }
                    results
                }
            };

            let report = PassReport {
                success: true,
                pass_id: Some(pass_id.clone()),
                pass: Some(kind),
                started_at: Some(started_at),
                finished_at: Some(Utc::now()),
                results,
                error: None,
            };

            info!(
                "{} pass complete: {} wallets, {} transfers, {} errors",
                kind,
                report.results.len(),
                report.actions_taken(),
                report.errors()
            );
            Ok::<_, Error>(report)
        }
        .instrument(span)
        .await
    }

    /// Non-deleted managed wallets in registry order
    fn snapshot(&self) -> Result<Vec<ManagedWallet>> {
        Ok(self
            .registry
            .list_managed()?
            .into_iter()
            .filter(|w| !w.deleted)
            .collect())
    }

    async fn sweep_wallet(&self, plan: &SweepPlan, wallet: &ManagedWallet) -> TransferOutcome {
        let outcome = TransferOutcome::pending(&wallet.id, &wallet.address);

        let handle = wallet.signing_handle(&self.settings.derivation_path);
        let signer = match TransferExecutor::resolve_signer(&handle) {
            Ok(signer) => signer,
            Err(e) => {
                warn!("Wallet {}: cannot derive signer: {}", wallet.address, e);
                return outcome.fail(&e);
            }
        };

        // Balance is read where the key actually lives
        let address = signer_address(&signer);
        if address != wallet.address {
            warn!(
                "Wallet {}: phrase derives {}, sweeping from the derived address",
                wallet.address, address
            );
        }
        let mut outcome = TransferOutcome {
            address: address.clone(),
            ..outcome
        };

        let reading = match self.gateway.token_balance(&address, &plan.token).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Wallet {}: {}", address, e);
                return outcome.fail(&e);
            }
        };
        outcome.balance = Some(reading.amount);

        let decision = plan.policy.decide(reading.amount);
        outcome.action = decision.label().to_string();
        outcome.amount = decision.amount();

        let ActionDecision::Sweep { amount } = decision else {
            debug!("Wallet {}: balance {} below sweep threshold", address, reading.amount);
            return outcome;
        };

        match self
            .executor
            .execute_with_signer(&signer, &plan.recipient, amount, &plan.token)
            .await
        {
            Ok(tx_hash) => {
                info!("Swept {} from {} (tx: {})", amount, address, tx_hash);
                outcome.action_taken = true;
                outcome.transaction_id = Some(tx_hash);
                outcome
            }
            Err(e) => {
                error!("Sweep from {} failed: {}", address, e);
                outcome.fail(&e)
            }
        }
    }

    async fn top_up_wallet(
        &self,
        plan: &TopUpPlan,
        wallet: &ManagedWallet,
        funding: &mut FundingSnapshot,
    ) -> TransferOutcome {
        let mut outcome = TransferOutcome::pending(&wallet.id, &wallet.address);

        // Measured in the token being refilled
        let read = if plan.token.is_energy() {
            self.gateway.native_balance(&wallet.address).await
        } else {
            self.gateway.token_balance(&wallet.address, &plan.token).await
        };
        let reading = match read {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Wallet {}: {}", wallet.address, e);
                return outcome.fail(&e);
            }
        };

        if reading.fallback {
            match plan.on_unreadable_balance {
                UnreadableBalance::Skip => {
                    let e = Error::BalanceRead {
                        address: wallet.address.clone(),
                        reason: "balance endpoint unreachable".to_string(),
                    };
                    warn!("Wallet {}: skipping, {}", wallet.address, e);
                    return outcome.fail(&e);
                }
                UnreadableBalance::AssumeZero => {
                    warn!("Wallet {}: balance unreadable, assuming zero", wallet.address);
                }
            }
        }
        outcome.balance = Some(reading.amount);

        let decision = plan.policy.decide(reading.amount);
        outcome.action = decision.label().to_string();
        outcome.amount = decision.amount();

        let ActionDecision::TopUp { amount, .. } = decision else {
            debug!("Wallet {}: balance {} above top-up threshold", wallet.address, reading.amount);
            return outcome;
        };

        let pool = &*funding.get_or_insert_with(|| {
            let pool = self.registry.list_funding();
            match &pool {
                Ok(wallets) => debug!("Loaded funding pool: {} wallets", wallets.len()),
                Err(e) => error!("Failed to load funding pool: {}", e),
            }
            pool
        });

        let funder = match pool {
            Ok(pool) => match select_funder(pool) {
                Ok(funder) => funder,
                Err(e) => {
                    warn!("Wallet {}: {}", wallet.address, e);
                    return outcome.fail(&e);
                }
            },
            Err(e) => return outcome.fail(e),
        };

        let decision = ActionDecision::TopUp {
            amount,
            funding_wallet_id: Some(funder.id.clone()),
        };
        debug!("Wallet {}: {:?}", wallet.address, decision);
        outcome.funder_id = Some(funder.id.clone());

        match self
            .executor
            .execute(&funder.signing_handle(), &wallet.address, amount, &plan.token)
            .await
        {
            Ok(tx_hash) => {
                info!(
                    "Topped up {} with {} from {} (tx: {})",
                    wallet.address, amount, funder.address, tx_hash
                );
                outcome.action_taken = true;
                outcome.transaction_id = Some(tx_hash);
                outcome
            }
            Err(e) => {
                error!("Top-up of {} from {} failed: {}", wallet.address, funder.address, e);
                outcome.fail(&e)
            }
        }
    }
}
