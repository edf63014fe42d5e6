// 8.0: result types and errors for engine operations.

use crate::oracle::OracleError;
use crate::storage::{StorageError, TargetKind};
use crate::types::{AccountId, AssetIndex, OpenId, OrderId, Pnl, Usd};
use crate::vault::VaultError;
use serde::{Deserialize, Serialize};

/// One limit order promoted to a position by `execute_orders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotedOrder {
    pub order_id: OrderId,
    pub open_id: OpenId,
    pub trader: AccountId,
}

/// Outcome of a limit-fill sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSweepReport {
    pub promoted: Vec<PromotedOrder>,
}

/// One position closed by an SL/TP touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedTrigger {
    pub open_id: OpenId,
    pub trader: AccountId,
    pub pnl: Pnl,
}

/// Outcome of a target-close sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSweepReport {
    pub closed: Vec<ClosedTrigger>,
}

/// One position finalized as a total loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidatedPosition {
    pub open_id: OpenId,
    pub trader: AccountId,
}

/// Outcome of a liquidation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationSweepReport {
    pub liquidated: Vec<LiquidatedPosition>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("caller is not authorized for this operation")]
    NotAuthorized,

    #[error("asset {0:?} is not listed")]
    AssetNotListed(AssetIndex),

    #[error("asset {0:?} is already listed")]
    AssetAlreadyListed(AssetIndex),

    #[error("asset type {0} is out of range")]
    InvalidAssetType(u8),

    #[error("bucket size must be positive")]
    InvalidBucketSize,

    #[error("market class {0} is closed")]
    MarketClosed(u8),

    #[error("leverage {0} outside [1, 100]")]
    InvalidLeverage(u32),

    #[error("margin {given} below minimum {min}")]
    MinSize { given: Usd, min: Usd },

    #[error("stop-loss / take-profit outside the valid range for this side")]
    InvalidSlTp,

    #[error("no price for asset {0:?} in the proof")]
    PriceNotInProof(AssetIndex),

    #[error("proof asserts a zero price for asset {0:?}")]
    PriceZero(AssetIndex),

    #[error("position {0:?} does not exist")]
    PositionNotFound(OpenId),

    #[error("position {0:?} is already closed")]
    PositionAlreadyClosed(OpenId),

    #[error("caller does not own position {0:?}")]
    NotPositionOwner(OpenId),

    #[error("order {0:?} does not exist")]
    OrderNotFound(OrderId),

    #[error("caller does not own order {0:?}")]
    NotOrderOwner(OrderId),

    #[error("position carries no {0:?} target")]
    InvalidTargetType(TargetKind),

    #[error("tolerance {0} above the cap")]
    ToleranceTooHigh(u32),

    #[error("rate {0} above the cap")]
    RateTooHigh(u32),

    #[error("arithmetic overflow in settlement math")]
    ArithmeticOverflow,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),
}
