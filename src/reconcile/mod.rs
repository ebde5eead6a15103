//! Reconciliation engine
//!
//! Per pass, each managed wallet goes through:
//!
//! ```text
//! Pending → Skipped (no action)
//!         → Sweeping → Swept | SweepFailed
//!         → TopUpNeeded → FunderSelected → ToppedUp | TopUpFailed
//! ```
//!
//! Every state is terminal within the pass; nothing carries over to the next.

pub mod policy;
pub mod runner;
pub mod selector;
pub mod types;

pub use policy::{decide, ActionDecision, ThresholdPolicy};
pub use runner::{ReconciliationRunner, RunnerSettings};
pub use selector::select_funder;
pub use types::{PassKind, PassReport, TransferOutcome};
