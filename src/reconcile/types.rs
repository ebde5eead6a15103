//! Pass report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which operation a pass performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Sweep,
    TopUp,
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassKind::Sweep => write!(f, "sweep"),
            PassKind::TopUp => write!(f, "top_up"),
        }
    }
}

/// Result for one managed wallet in a pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub wallet_id: String,

    /// Address the balance was read at
    pub address: String,

    /// Observed balance; absent when the read failed
    pub balance: Option<f64>,

    /// Decision label: none, sweep or top_up
    pub action: String,

    /// Amount the decision called for
    pub amount: f64,

    /// True only when a transaction was accepted
    pub action_taken: bool,

    pub funder_id: Option<String>,

    pub transaction_id: Option<String>,

    pub error: Option<String>,

    /// Stable error code, see `Error::kind`
    pub error_kind: Option<String>,
}

impl TransferOutcome {
    /// Outcome before any balance has been read
    pub fn pending(wallet_id: &str, address: &str) -> Self {
        Self {
            wallet_id: wallet_id.to_string(),
            address: address.to_string(),
            balance: None,
            action: "none".to_string(),
            amount: 0.0,
            action_taken: false,
            funder_id: None,
            transaction_id: None,
            error: None,
            error_kind: None,
        }
    }

    /// Record an error against this wallet
    pub fn fail(mut self, error: &Error) -> Self {
        self.error = Some(error.to_string());
        self.error_kind = Some(error.kind().to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Report returned by one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// False only when the pass aborted before processing wallets
    pub success: bool,

    pub pass_id: Option<String>,

    pub pass: Option<PassKind>,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub results: Vec<TransferOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PassReport {
    /// Report for a pass that could not start
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pass_id: None,
            pass: None,
            started_at: None,
            finished_at: None,
            results: Vec::new(),
            error: Some(message.into()),
        }
    }

    /// Count of wallets whose transaction was accepted
    pub fn actions_taken(&self) -> usize {
        self.results.iter().filter(|r| r.action_taken).count()
    }

    pub fn errors(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}
