//! Collateral vault adapter.
//!
//! The LP vault holds the collateral token, books margin balances, and moves
//! tokens; the engine only speaks this narrow interface. `settle_batch`
//! applies a sweep's settlements all-or-nothing so a failing leg unwinds the
//! whole sweep instead of leaving it half-paid.

use crate::types::{AccountId, Usd};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One settlement leg: debit `open_margin` from the trader's margin balance,
/// pay `close_margin` of the token back to the trader. A liquidation is the
/// `close_margin = 0` case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub trader: AccountId,
    pub open_margin: Usd,
    pub close_margin: Usd,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    #[error("token transfer of {amount} for {trader:?} failed")]
    TransferFailed { trader: AccountId, amount: Usd },

    #[error("margin balance of {trader:?} below {required}")]
    InsufficientMargin { trader: AccountId, required: Usd },
}

/// The collateral vault as the engine sees it. Mockable for tests.
pub trait Vault {
    /// Pull `amount` of the collateral token from the trader (who has
    /// pre-approved the vault) into custody and credit their margin balance.
    fn deposit_margin(&mut self, trader: AccountId, amount: Usd) -> Result<(), VaultError>;

    /// Debit `open_margin` from the trader's margin balance and transfer
    /// `close_margin` of the token back to them.
    fn settle_margin(
        &mut self,
        trader: AccountId,
        open_margin: Usd,
        close_margin: Usd,
    ) -> Result<(), VaultError>;

    /// Apply a list of settlements atomically: either every leg lands or
    /// none does.
    fn settle_batch(&mut self, settlements: &[Settlement]) -> Result<(), VaultError>;

    /// Current margin balance booked for a trader.
    fn margin_balance(&self, trader: AccountId) -> Usd;
}

/// In-memory vault for the simulation and test suite. Wallets stand in for
/// the external token, `pool` for the LP float that funds profit payouts and
/// absorbs trader losses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryVault {
    wallets: HashMap<AccountId, Usd>,
    margins: HashMap<AccountId, Usd>,
    pool: Usd,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint collateral into a trader's wallet.
    pub fn credit_wallet(&mut self, trader: AccountId, amount: Usd) {
        let balance = self.wallets.entry(trader).or_default();
        *balance = balance.checked_add(amount).expect("wallet overflow");
    }

    /// Seed the LP float backing profit payouts.
    pub fn fund_pool(&mut self, amount: Usd) {
        self.pool = self.pool.checked_add(amount).expect("pool overflow");
    }

    pub fn wallet_balance(&self, trader: AccountId) -> Usd {
        self.wallets.get(&trader).copied().unwrap_or_default()
    }

    pub fn pool_balance(&self) -> Usd {
        self.pool
    }
}

impl Vault for InMemoryVault {
    fn deposit_margin(&mut self, trader: AccountId, amount: Usd) -> Result<(), VaultError> {
        let wallet = self.wallets.entry(trader).or_default();
        *wallet = wallet
            .checked_sub(amount)
            .ok_or(VaultError::TransferFailed { trader, amount })?;
        let margin = self.margins.entry(trader).or_default();
        *margin = margin
            .checked_add(amount)
            .ok_or(VaultError::TransferFailed { trader, amount })?;
        Ok(())
    }

    fn settle_margin(
        &mut self,
        trader: AccountId,
        open_margin: Usd,
        close_margin: Usd,
    ) -> Result<(), VaultError> {
        let margin = self.margins.entry(trader).or_default();
        *margin = margin.checked_sub(open_margin).ok_or(VaultError::InsufficientMargin {
            trader,
            required: open_margin,
        })?;

        // The freed margin plus the pool fund the payout; whatever the
        // trader does not take back stays in the pool.
        let available = self
            .pool
            .checked_add(open_margin)
            .ok_or(VaultError::TransferFailed { trader, amount: close_margin })?;
        self.pool = available
            .checked_sub(close_margin)
            .ok_or(VaultError::TransferFailed { trader, amount: close_margin })?;

        let wallet = self.wallets.entry(trader).or_default();
        *wallet = wallet
            .checked_add(close_margin)
            .ok_or(VaultError::TransferFailed { trader, amount: close_margin })?;
        Ok(())
    }

    fn settle_batch(&mut self, settlements: &[Settlement]) -> Result<(), VaultError> {
        // Validate-then-apply on a working copy keeps the batch atomic.
        let mut staged = self.clone();
        for s in settlements {
            staged.settle_margin(s.trader, s.open_margin, s.close_margin)?;
        }
        *self = staged;
        Ok(())
    }

    fn margin_balance(&self, trader: AccountId) -> Usd {
        self.margins.get(&trader).copied().unwrap_or_default()
    }
}
