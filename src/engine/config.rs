//! Engine configuration options.

use crate::types::{AccountId, Usd};
use serde::{Deserialize, Serialize};

/// Smallest margin accepted for a position or order: 10 units at six
/// decimals.
pub const MIN_POSITION_MARGIN: u128 = 10_000_000;

/// Default trigger tolerance, in hundredths of a basis point (10 = 0.1%).
pub const DEFAULT_PRICE_TOLERANCE: u32 = 10;

/// Hard cap on the trigger tolerance (100 = 1%).
pub const MAX_PRICE_TOLERANCE: u32 = 100;

/// Upper bound on the stored funding rate and spread metadata.
pub const MAX_RATE: u32 = 1_000;

/// Number of market-open classes assets partition into.
pub const ASSET_CLASSES: usize = 4;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Principal allowed to list assets and halt market classes.
    pub admin: AccountId,
    /// Privileged off-engine principal that submits oracle bundles.
    pub executor: AccountId,
    /// Minimum margin per position or order.
    pub min_position_margin: Usd,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            admin: AccountId(0),
            executor: AccountId(0),
            min_position_margin: Usd::new(MIN_POSITION_MARGIN),
        }
    }
}

impl EngineConfig {
    pub fn new(admin: AccountId, executor: AccountId) -> Self {
        Self {
            admin,
            executor,
            ..Self::default()
        }
    }
}
