//! Core engine struct, admin operations, and views.

use super::config::{
    EngineConfig, ASSET_CLASSES, DEFAULT_PRICE_TOLERANCE, MAX_PRICE_TOLERANCE, MAX_RATE,
};
use super::results::EngineError;
use crate::bucket::BucketEntry;
use crate::bucket::{BucketId, BucketKind};
use crate::events::Event;
use crate::oracle::{Oracle, PriceAssertion};
use crate::order::Order;
use crate::position::{Closed, Open};
use crate::storage::Storage;
use crate::types::{AccountId, AssetIndex, OpenId, OrderId, Pnl, Price, Timestamp};
use crate::vault::Vault;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A listed asset: its price-quantization granule and market-open class.
/// Immutable after listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub bucket_size: u128,
    pub asset_type: u8,
}

/// The execution core. Generic over the injected storage, vault, and oracle
/// so each can be mocked independently; ownership of the three makes the
/// engine the only principal with a write path to any of them.
#[derive(Debug)]
pub struct Engine<S, V, O> {
    pub(super) config: EngineConfig,
    pub(super) storage: S,
    pub(super) vault: V,
    pub(super) oracle: O,
    pub(super) assets: HashMap<AssetIndex, AssetInfo>,
    pub(super) market_open: [bool; ASSET_CLASSES],
    pub(super) funding_rates: HashMap<AssetIndex, u32>,
    pub(super) spreads: HashMap<AssetIndex, u32>,
    pub(super) price_tolerance: u32,
    pub(super) current_time: Timestamp,
}

impl<S: Storage, V: Vault, O: Oracle> Engine<S, V, O> {
    pub fn new(config: EngineConfig, storage: S, vault: V, oracle: O) -> Self {
        Self {
            config,
            storage,
            vault,
            oracle,
            assets: HashMap::new(),
            market_open: [false; ASSET_CLASSES],
            funding_rates: HashMap::new(),
            spreads: HashMap::new(),
            price_tolerance: DEFAULT_PRICE_TOLERANCE,
            current_time: Timestamp::from_millis(0),
        }
    }

    /// Set the current engine time.
    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    /// Get the current engine time.
    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    /// Advance time by a duration in milliseconds.
    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    /// Register a tradable asset. Admin or executor.
    pub fn list_asset(
        &mut self,
        caller: AccountId,
        asset: AssetIndex,
        bucket_size: u128,
        asset_type: u8,
    ) -> Result<(), EngineError> {
        if caller != self.config.admin && caller != self.config.executor {
            return Err(EngineError::NotAuthorized);
        }
        if self.assets.contains_key(&asset) {
            return Err(EngineError::AssetAlreadyListed(asset));
        }
        if bucket_size == 0 {
            return Err(EngineError::InvalidBucketSize);
        }
        if asset_type as usize >= ASSET_CLASSES {
            return Err(EngineError::InvalidAssetType(asset_type));
        }

        self.assets.insert(
            asset,
            AssetInfo {
                bucket_size,
                asset_type,
            },
        );
        tracing::info!(asset = asset.0, bucket_size, asset_type, "asset listed");
        Ok(())
    }

    /// Per-class trading halt. Admin only.
    pub fn set_market_open(
        &mut self,
        caller: AccountId,
        asset_type: u8,
        open: bool,
    ) -> Result<(), EngineError> {
        self.require_admin(caller)?;
        let slot = self
            .market_open
            .get_mut(asset_type as usize)
            .ok_or(EngineError::InvalidAssetType(asset_type))?;
        *slot = open;
        Ok(())
    }

    /// Stored, informational only; no accrual is performed by the core.
    pub fn set_funding_rate(
        &mut self,
        caller: AccountId,
        asset: AssetIndex,
        rate: u32,
    ) -> Result<(), EngineError> {
        self.require_executor(caller)?;
        self.asset(asset)?;
        if rate > MAX_RATE {
            return Err(EngineError::RateTooHigh(rate));
        }
        self.funding_rates.insert(asset, rate);
        Ok(())
    }

    /// Stored, informational only.
    pub fn set_spread(
        &mut self,
        caller: AccountId,
        asset: AssetIndex,
        spread: u32,
    ) -> Result<(), EngineError> {
        self.require_executor(caller)?;
        self.asset(asset)?;
        if spread > MAX_RATE {
            return Err(EngineError::RateTooHigh(spread));
        }
        self.spreads.insert(asset, spread);
        Ok(())
    }

    /// Trigger tolerance in hundredths of a basis point, capped at 1%.
    pub fn set_tolerance(&mut self, caller: AccountId, tolerance: u32) -> Result<(), EngineError> {
        self.require_executor(caller)?;
        if tolerance > MAX_PRICE_TOLERANCE {
            return Err(EngineError::ToleranceTooHigh(tolerance));
        }
        self.price_tolerance = tolerance;
        Ok(())
    }

    // ---- views ------------------------------------------------------------

    pub fn asset_info(&self, asset: AssetIndex) -> Option<AssetInfo> {
        self.assets.get(&asset).copied()
    }

    pub fn is_market_open(&self, asset_type: u8) -> bool {
        self.market_open
            .get(asset_type as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn funding_rate(&self, asset: AssetIndex) -> u32 {
        self.funding_rates.get(&asset).copied().unwrap_or(0)
    }

    pub fn spread(&self, asset: AssetIndex) -> u32 {
        self.spreads.get(&asset).copied().unwrap_or(0)
    }

    pub fn price_tolerance(&self) -> u32 {
        self.price_tolerance
    }

    pub fn open(&self, id: OpenId) -> Option<&Open> {
        self.storage.open(id)
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.storage.order(id)
    }

    pub fn user_open_ids(&self, trader: AccountId) -> Vec<OpenId> {
        self.storage.user_open_ids(trader)
    }

    pub fn user_order_ids(&self, trader: AccountId) -> Vec<OrderId> {
        self.storage.user_order_ids(trader)
    }

    pub fn closed_trades(&self, trader: AccountId) -> &[Closed] {
        self.storage.closed_trades(trader)
    }

    /// Lifetime realized PnL of a trader, the sum of their closed ledger.
    pub fn trader_total_pnl(&self, trader: AccountId) -> Pnl {
        self.storage
            .closed_trades(trader)
            .iter()
            .fold(Pnl::zero(), |acc, c| acc.saturating_add(c.pnl))
    }

    pub fn bucket(&self, kind: BucketKind, asset: AssetIndex, bucket: BucketId) -> Vec<BucketEntry> {
        self.storage.bucket(kind, asset, bucket)
    }

    pub fn events(&self) -> &[Event] {
        self.storage.events()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    /// Mutable vault access for host wiring (test seeding, LP funding).
    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    /// Mutable oracle access for host wiring (bundle registration).
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    // ---- shared helpers ---------------------------------------------------

    pub(super) fn require_admin(&self, caller: AccountId) -> Result<(), EngineError> {
        if caller == self.config.admin {
            Ok(())
        } else {
            Err(EngineError::NotAuthorized)
        }
    }

    pub(super) fn require_executor(&self, caller: AccountId) -> Result<(), EngineError> {
        if caller == self.config.executor {
            Ok(())
        } else {
            Err(EngineError::NotAuthorized)
        }
    }

    pub(super) fn asset(&self, asset: AssetIndex) -> Result<AssetInfo, EngineError> {
        self.assets
            .get(&asset)
            .copied()
            .ok_or(EngineError::AssetNotListed(asset))
    }

    /// Price for an asset out of a verified bundle. Absence and zero are
    /// distinct failures.
    pub(super) fn price_from_bundle(
        bundle: &[PriceAssertion],
        asset: AssetIndex,
    ) -> Result<Price, EngineError> {
        let assertion = bundle
            .iter()
            .find(|a| a.pair_id == asset)
            .ok_or(EngineError::PriceNotInProof(asset))?;
        Price::new(assertion.price).ok_or(EngineError::PriceZero(asset))
    }
}
