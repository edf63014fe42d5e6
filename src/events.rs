// 11.0: every storage mutation produces an event. these are the external
// observability contract: indexers and monitoring reconstruct venue state
// from this stream alone. emitted only on successful side effects.

use crate::bucket::{BucketId, BucketKind};
use crate::types::{AccountId, AssetIndex, OpenId, OrderId, Pnl, Price, Side, Timestamp, Usd};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    OpenStored(OpenStoredEvent),
    OrderStored(OrderStoredEvent),
    OpenRemoved(OpenRemovedEvent),
    OrderRemoved(OrderRemovedEvent),
    ClosedStored(ClosedStoredEvent),
    BucketUpdated(BucketUpdatedEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStoredEvent {
    pub id: OpenId,
    pub trader: AccountId,
    pub asset: AssetIndex,
    pub side: Side,
    pub size_usd: Usd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStoredEvent {
    pub id: OrderId,
    pub trader: AccountId,
    pub asset: AssetIndex,
    pub side: Side,
    pub size_usd: Usd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRemovedEvent {
    pub id: OpenId,
    pub trader: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRemovedEvent {
    pub id: OrderId,
    pub trader: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedStoredEvent {
    pub trader: AccountId,
    pub asset: AssetIndex,
    pub close_ts: Timestamp,
    pub pnl: Pnl,
}

/// Emitted on both insertion into and removal from a bucket; `target` is the
/// price the entry was filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketUpdatedEvent {
    pub kind: BucketKind,
    pub asset: AssetIndex,
    pub bucket: BucketId,
    pub id: u64,
    pub target: Price,
}
