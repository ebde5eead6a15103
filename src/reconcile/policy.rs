//! Threshold policy
//!
//! Pure decision logic mapping a balance to a sweep, a top-up or nothing.

use serde::Serialize;

use crate::error::{Error, Result};

/// What to do with one wallet for one token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDecision {
    NoAction,

    /// Move a fixed amount of reward token to the recipient
    Sweep { amount: f64 },

    /// Send a fixed amount of gas token from a funding wallet.
    /// The funder is unresolved until selection.
    TopUp {
        amount: f64,
        funding_wallet_id: Option<String>,
    },
}

impl ActionDecision {
    /// Short name used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ActionDecision::NoAction => "none",
            ActionDecision::Sweep { .. } => "sweep",
            ActionDecision::TopUp { .. } => "top_up",
        }
    }

    /// Amount the decision would move, zero for no action
    pub fn amount(&self) -> f64 {
        match self {
            ActionDecision::NoAction => 0.0,
            ActionDecision::Sweep { amount } | ActionDecision::TopUp { amount, .. } => *amount,
        }
    }
}

/// Decide the action for a balance.
///
/// Sweep is checked first: `amount >= sweep_threshold` sweeps, otherwise
/// `amount < top_up_threshold` tops up, otherwise nothing happens.
pub fn decide(
    amount: f64,
    sweep_threshold: f64,
    top_up_threshold: f64,
    sweep_amount: f64,
    top_up_amount: f64,
) -> ActionDecision {
    if amount >= sweep_threshold {
        ActionDecision::Sweep {
            amount: sweep_amount,
        }
    } else if amount < top_up_threshold {
        ActionDecision::TopUp {
            amount: top_up_amount,
            funding_wallet_id: None,
        }
    } else {
        ActionDecision::NoAction
    }
}

/// Thresholds and fixed amounts for one token
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub sweep_threshold: f64,
    pub top_up_threshold: f64,
    pub sweep_amount: f64,
    pub top_up_amount: f64,
}

impl ThresholdPolicy {
    /// Policy that can both sweep and top up the same balance.
    ///
    /// Requires `sweep_threshold > top_up_threshold` so the bands never overlap.
    pub fn new(
        sweep_threshold: f64,
        top_up_threshold: f64,
        sweep_amount: f64,
        top_up_amount: f64,
    ) -> Result<Self> {
        for (name, value) in [
            ("sweep threshold", sweep_threshold),
            ("top-up threshold", top_up_threshold),
            ("sweep amount", sweep_amount),
            ("top-up amount", top_up_amount),
        ] {
            check_positive(name, value)?;
        }

        if sweep_threshold <= top_up_threshold {
            return Err(Error::Config(format!(
                "sweep threshold ({}) must be greater than top-up threshold ({})",
                sweep_threshold, top_up_threshold
            )));
        }

        Ok(Self {
            sweep_threshold,
            top_up_threshold,
            sweep_amount,
            top_up_amount,
        })
    }

    /// Policy for the reward token: never tops up
    pub fn sweep_only(threshold: f64, amount: f64) -> Result<Self> {
        check_positive("sweep threshold", threshold)?;
        check_positive("sweep amount", amount)?;
        Ok(Self {
            sweep_threshold: threshold,
            top_up_threshold: f64::NEG_INFINITY,
            sweep_amount: amount,
            top_up_amount: 0.0,
        })
    }

    /// Policy for the gas token: never sweeps
    pub fn top_up_only(threshold: f64, amount: f64) -> Result<Self> {
        check_positive("top-up threshold", threshold)?;
        check_positive("top-up amount", amount)?;
        Ok(Self {
            sweep_threshold: f64::INFINITY,
            top_up_threshold: threshold,
            sweep_amount: 0.0,
            top_up_amount: amount,
        })
    }

    pub fn decide(&self, amount: f64) -> ActionDecision {
        decide(
            amount,
            self.sweep_threshold,
            self.top_up_threshold,
            self.sweep_amount,
            self.top_up_amount,
        )
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Config(format!(
            "{} must be a positive number, got {}",
            name, value
        )));
    }
    Ok(())
}
