//! Funding wallet selection

use crate::error::{Error, Result};
use crate::wallet::FundingWallet;

/// Choose the funder for a top-up from a pool snapshot.
///
/// Picks the most recently registered non-deleted wallet; on equal
/// timestamps the earlier pool entry wins. The funder's own balance is not
/// checked here, an underfunded funder surfaces as a transfer error.
pub fn select_funder(pool: &[FundingWallet]) -> Result<&FundingWallet> {
    pool.iter()
        .filter(|w| !w.deleted)
        .fold(None::<&FundingWallet>, |best, w| match best {
            Some(b) if b.created_at >= w.created_at => Some(b),
            _ => Some(w),
        })
        .ok_or(Error::NoFundingAvailable)
}
