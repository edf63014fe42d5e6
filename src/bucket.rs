//! Price-bucket trigger index.
//!
//! Every pending trigger (limit fill, stop-loss, take-profit, liquidation)
//! is filed under its quantized target price, `target / bucket_size`. An
//! executor sweep only has to scan the buckets adjacent to the oracle price
//! instead of every live entity, which keeps sweeps cheap no matter how many
//! positions exist.

use crate::storage::StorageError;
use crate::types::{AssetIndex, Price};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which index family a bucket belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketKind {
    /// Stop-loss and take-profit targets of open positions.
    SlTp,
    /// Resting limit orders waiting to be filled.
    Limit,
    /// Liquidation prices of open positions.
    Liq,
}

impl BucketKind {
    pub fn code(&self) -> u8 {
        match self {
            BucketKind::SlTp => 0,
            BucketKind::Limit => 1,
            BucketKind::Liq => 2,
        }
    }
}

impl TryFrom<u8> for BucketKind {
    type Error = StorageError;

    fn try_from(code: u8) -> Result<Self, StorageError> {
        match code {
            0 => Ok(BucketKind::SlTp),
            1 => Ok(BucketKind::Limit),
            2 => Ok(BucketKind::Liq),
            other => Err(StorageError::InvalidBucketType(other)),
        }
    }
}

/// Quantized price, `price / bucket_size` with integer division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketId(pub u128);

/// Quantize a price into its bucket. `bucket_size` is validated non-zero at
/// asset listing and immutable afterwards.
pub fn bucket_id(price: Price, bucket_size: u128) -> BucketId {
    debug_assert!(bucket_size > 0);
    BucketId(price.value() / bucket_size)
}

/// The ±1 scan window around a bucket. Targets within `bucket_size` of the
/// oracle price can land in an adjacent bucket, so sweeps must look at all
/// three. Offsets that would leave the id range are dropped.
pub fn neighbourhood(center: BucketId) -> impl Iterator<Item = BucketId> {
    [
        center.0.checked_sub(1),
        Some(center.0),
        center.0.checked_add(1),
    ]
    .into_iter()
    .flatten()
    .map(BucketId)
}

/// Trigger acceptance: `|price - target| * 10_000 <= price * tolerance`.
/// Tolerance is in hundredths of a basis point (10 = 0.1%). Both products
/// are computed in 256 bits, so the comparison is exact for any inputs.
pub fn tolerance_hit(price: Price, target: Price, tolerance: u32) -> bool {
    let diff = U256::from(price.abs_diff(target)) * U256::from(10_000u32);
    let bound = U256::from(price.value()) * U256::from(tolerance);
    diff <= bound
}

/// One pending trigger: the entity id (an open or an order, depending on the
/// bucket kind) and the exact price it is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub id: u64,
    pub target_price: Price,
}

/// One index family: `(asset, bucket) -> entries`. Insertion order inside a
/// bucket carries no meaning; a sequence is used so removal is swap-pop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketMap {
    entries: HashMap<(AssetIndex, BucketId), Vec<BucketEntry>>,
}

impl BucketMap {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn add(&mut self, asset: AssetIndex, bucket: BucketId, id: u64, target_price: Price) {
        self.entries
            .entry((asset, bucket))
            .or_default()
            .push(BucketEntry { id, target_price });
    }

    /// Swap-pop the first entry with the given id. Errors if absent:
    /// presence is a structural invariant the caller is responsible for.
    pub fn remove(
        &mut self,
        asset: AssetIndex,
        bucket: BucketId,
        id: u64,
    ) -> Result<BucketEntry, StorageError> {
        let slot = self
            .entries
            .get_mut(&(asset, bucket))
            .ok_or(StorageError::BucketEntryNotFound { id, bucket })?;
        let pos = slot
            .iter()
            .position(|e| e.id == id)
            .ok_or(StorageError::BucketEntryNotFound { id, bucket })?;
        let entry = slot.swap_remove(pos);
        if slot.is_empty() {
            self.entries.remove(&(asset, bucket));
        }
        Ok(entry)
    }

    /// Snapshot copy, safe to iterate while the map is mutated.
    pub fn snapshot(&self, asset: AssetIndex, bucket: BucketId) -> Vec<BucketEntry> {
        self.entries
            .get(&(asset, bucket))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, asset: AssetIndex, bucket: BucketId, id: u64) -> bool {
        self.entries
            .get(&(asset, bucket))
            .map(|slot| slot.iter().any(|e| e.id == id))
            .unwrap_or(false)
    }
}
