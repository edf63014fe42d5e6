// 4.0: open position tracking. everything needed to settle or liquidate a
// position later is frozen here at open time; only the SL/TP targets may move.

use crate::bucket::BucketId;
use crate::types::{AccountId, AssetIndex, Leverage, OpenId, Pnl, Price, Side, Timestamp, Usd};
use serde::{Deserialize, Serialize};

/// A live position. `size_usd` is the deposited margin in collateral minor
/// units, not the notional exposure. The liquidation price and its bucket are
/// computed once at open and never change; the SL/TP targets are optional and
/// movable, and each carries the bucket it is currently filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    pub id: OpenId,
    pub trader: AccountId,
    pub asset: AssetIndex,
    pub side: Side,
    pub leverage: Leverage,
    pub open_price: Price,
    pub size_usd: Usd,
    pub timestamp: Timestamp,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub liquidation_price: Price,
    pub sl_bucket: Option<BucketId>,
    pub tp_bucket: Option<BucketId>,
    pub liq_bucket: BucketId,
}

impl Open {
    pub fn is_long(&self) -> bool {
        self.side.is_long()
    }
}

// 4.1: immutable record appended per trader when a position ends, whatever
// the reason: trader close, SL, TP, or liquidation (pnl = -size_usd).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closed {
    pub asset: AssetIndex,
    pub side: Side,
    pub leverage: Leverage,
    pub open_price: Price,
    pub close_price: Price,
    pub size_usd: Usd,
    pub open_ts: Timestamp,
    pub close_ts: Timestamp,
    pub pnl: Pnl,
}
