//! Pending limit orders.
//!
//! An order parks margin in the vault and waits in its `Limit` bucket until
//! an executor sweep finds the oracle price within tolerance of
//! `order_price`, at which point it is promoted to a position at
//! `order_price` — never at the oracle price. SL/TP prices travel with the
//! order and become the position's targets on promotion.

use crate::bucket::BucketId;
use crate::types::{AccountId, AssetIndex, Leverage, OrderId, Price, Side, Timestamp, Usd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub trader: AccountId,
    pub asset: AssetIndex,
    pub side: Side,
    pub leverage: Leverage,
    pub order_price: Price,
    pub size_usd: Usd,
    pub timestamp: Timestamp,
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub limit_bucket: BucketId,
}
