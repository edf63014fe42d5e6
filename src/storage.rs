//! Storage component: entity maps, per-trader id indices, closed-trade
//! history, the three bucket families, and the event log.
//!
//! Storage performs no business validation. It enforces only structural
//! invariants: bucket-kind validity and presence on bucket removal. The
//! engine is the single mutating principal; ownership of the `&mut` path
//! enforces that at compile time. Read paths are unrestricted.

use crate::bucket::{BucketEntry, BucketId, BucketKind, BucketMap};
use crate::events::{
    BucketUpdatedEvent, ClosedStoredEvent, Event, EventId, EventPayload, OpenRemovedEvent,
    OpenStoredEvent, OrderRemovedEvent, OrderStoredEvent,
};
use crate::order::Order;
use crate::position::{Closed, Open};
use crate::types::{AccountId, AssetIndex, OpenId, OrderId, Price};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which movable target of a position an update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("invalid bucket kind code {0}")]
    InvalidBucketType(u8),

    #[error("entry {id} not found in bucket {bucket:?}")]
    BucketEntryNotFound { id: u64, bucket: BucketId },

    #[error("open position {0:?} not found")]
    OpenNotFound(OpenId),

    #[error("position has no {0:?} target")]
    TargetNotSet(TargetKind),
}

/// CRUD and index operations consumed by the engine. Mockable for tests.
pub trait Storage {
    /// Insert a position. The id field of `open` is replaced with the next
    /// monotone id (starting at 1), which is also appended to the trader's
    /// open-id index.
    fn store_open(&mut self, open: Open) -> OpenId;

    /// Symmetric to [`Storage::store_open`], on a disjoint counter.
    fn store_order(&mut self, order: Order) -> OrderId;

    /// Erase a position and swap-pop its id from the trader's index.
    /// A no-op when the id is absent; callers that depend on existence must
    /// check via [`Storage::open`] first.
    fn remove_open(&mut self, trader: AccountId, id: OpenId);

    /// Symmetric to [`Storage::remove_open`].
    fn remove_order(&mut self, trader: AccountId, id: OrderId);

    fn open(&self, id: OpenId) -> Option<&Open>;

    fn order(&self, id: OrderId) -> Option<&Order>;

    fn user_open_ids(&self, trader: AccountId) -> Vec<OpenId>;

    fn user_order_ids(&self, trader: AccountId) -> Vec<OrderId>;

    fn append_closed(&mut self, trader: AccountId, closed: Closed);

    fn closed_trades(&self, trader: AccountId) -> &[Closed];

    fn add_to_bucket(
        &mut self,
        kind: BucketKind,
        asset: AssetIndex,
        bucket: BucketId,
        id: u64,
        target_price: Price,
    );

    /// Swap-pop removal with first-match semantics. Fails when the entry is
    /// absent: bucket membership is a structural invariant and a miss means
    /// the caller's bookkeeping is wrong.
    fn remove_from_bucket(
        &mut self,
        kind: BucketKind,
        asset: AssetIndex,
        bucket: BucketId,
        id: u64,
    ) -> Result<(), StorageError>;

    /// Move a position's SL or TP to a new bucket, patching the stored
    /// bucket id and target price in the same write.
    fn update_position_target(
        &mut self,
        id: OpenId,
        kind: TargetKind,
        new_bucket: BucketId,
        new_price: Price,
    ) -> Result<(), StorageError>;

    /// Snapshot copy of a bucket, safe to iterate across mutations.
    fn bucket(&self, kind: BucketKind, asset: AssetIndex, bucket: BucketId) -> Vec<BucketEntry>;

    /// Next id the open counter will assign. Ids below this were issued at
    /// some point; ids at or above it never existed.
    fn next_open_id(&self) -> u64;

    fn next_order_id(&self) -> u64;

    fn events(&self) -> &[Event];
}

/// The in-process storage used by the venue and the test suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryStorage {
    opens: HashMap<OpenId, Open>,
    orders: HashMap<OrderId, Order>,
    user_open_ids: HashMap<AccountId, Vec<OpenId>>,
    user_order_ids: HashMap<AccountId, Vec<OrderId>>,
    closeds: HashMap<AccountId, Vec<Closed>>,
    sl_tp_buckets: BucketMap,
    limit_buckets: BucketMap,
    liq_buckets: BucketMap,
    next_open_id: u64,
    next_order_id: u64,
    events: Vec<Event>,
    next_event_id: u64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            opens: HashMap::new(),
            orders: HashMap::new(),
            user_open_ids: HashMap::new(),
            user_order_ids: HashMap::new(),
            closeds: HashMap::new(),
            sl_tp_buckets: BucketMap::new(),
            limit_buckets: BucketMap::new(),
            liq_buckets: BucketMap::new(),
            next_open_id: 1,
            next_order_id: 1,
            events: Vec::new(),
            next_event_id: 1,
        }
    }

    fn bucket_map(&self, kind: BucketKind) -> &BucketMap {
        match kind {
            BucketKind::SlTp => &self.sl_tp_buckets,
            BucketKind::Limit => &self.limit_buckets,
            BucketKind::Liq => &self.liq_buckets,
        }
    }

    fn bucket_map_mut(&mut self, kind: BucketKind) -> &mut BucketMap {
        match kind {
            BucketKind::SlTp => &mut self.sl_tp_buckets,
            BucketKind::Limit => &mut self.limit_buckets,
            BucketKind::Liq => &mut self.liq_buckets,
        }
    }

    fn emit(&mut self, payload: EventPayload) {
        let event = Event {
            id: EventId(self.next_event_id),
            payload,
        };
        self.next_event_id += 1;
        self.events.push(event);
    }
}

impl Storage for InMemoryStorage {
    fn store_open(&mut self, mut open: Open) -> OpenId {
        let id = OpenId(self.next_open_id);
        self.next_open_id += 1;
        open.id = id;

        self.user_open_ids.entry(open.trader).or_default().push(id);
        self.emit(EventPayload::OpenStored(OpenStoredEvent {
            id,
            trader: open.trader,
            asset: open.asset,
            side: open.side,
            size_usd: open.size_usd,
        }));
        self.opens.insert(id, open);
        id
    }

    fn store_order(&mut self, mut order: Order) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        order.id = id;

        self.user_order_ids.entry(order.trader).or_default().push(id);
        self.emit(EventPayload::OrderStored(OrderStoredEvent {
            id,
            trader: order.trader,
            asset: order.asset,
            side: order.side,
            size_usd: order.size_usd,
        }));
        self.orders.insert(id, order);
        id
    }

    fn remove_open(&mut self, trader: AccountId, id: OpenId) {
        let Some(open) = self.opens.remove(&id) else {
            return;
        };
        debug_assert_eq!(open.trader, trader);
        if let Some(ids) = self.user_open_ids.get_mut(&open.trader) {
            if let Some(pos) = ids.iter().position(|&oid| oid == id) {
                ids.swap_remove(pos);
            }
        }
        self.emit(EventPayload::OpenRemoved(OpenRemovedEvent {
            id,
            trader: open.trader,
        }));
    }

    fn remove_order(&mut self, trader: AccountId, id: OrderId) {
        let Some(order) = self.orders.remove(&id) else {
            return;
        };
        debug_assert_eq!(order.trader, trader);
        if let Some(ids) = self.user_order_ids.get_mut(&order.trader) {
            if let Some(pos) = ids.iter().position(|&oid| oid == id) {
                ids.swap_remove(pos);
            }
        }
        self.emit(EventPayload::OrderRemoved(OrderRemovedEvent {
            id,
            trader: order.trader,
        }));
    }

    fn open(&self, id: OpenId) -> Option<&Open> {
        self.opens.get(&id)
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    fn user_open_ids(&self, trader: AccountId) -> Vec<OpenId> {
        self.user_open_ids.get(&trader).cloned().unwrap_or_default()
    }

    fn user_order_ids(&self, trader: AccountId) -> Vec<OrderId> {
        self.user_order_ids.get(&trader).cloned().unwrap_or_default()
    }

    fn append_closed(&mut self, trader: AccountId, closed: Closed) {
        self.emit(EventPayload::ClosedStored(ClosedStoredEvent {
            trader,
            asset: closed.asset,
            close_ts: closed.close_ts,
            pnl: closed.pnl,
        }));
        self.closeds.entry(trader).or_default().push(closed);
    }

    fn closed_trades(&self, trader: AccountId) -> &[Closed] {
        self.closeds.get(&trader).map(Vec::as_slice).unwrap_or(&[])
    }

    fn add_to_bucket(
        &mut self,
        kind: BucketKind,
        asset: AssetIndex,
        bucket: BucketId,
        id: u64,
        target_price: Price,
    ) {
        self.bucket_map_mut(kind).add(asset, bucket, id, target_price);
        self.emit(EventPayload::BucketUpdated(BucketUpdatedEvent {
            kind,
            asset,
            bucket,
            id,
            target: target_price,
        }));
    }

    fn remove_from_bucket(
        &mut self,
        kind: BucketKind,
        asset: AssetIndex,
        bucket: BucketId,
        id: u64,
    ) -> Result<(), StorageError> {
        let entry = self.bucket_map_mut(kind).remove(asset, bucket, id)?;
        self.emit(EventPayload::BucketUpdated(BucketUpdatedEvent {
            kind,
            asset,
            bucket,
            id,
            target: entry.target_price,
        }));
        Ok(())
    }

    fn update_position_target(
        &mut self,
        id: OpenId,
        kind: TargetKind,
        new_bucket: BucketId,
        new_price: Price,
    ) -> Result<(), StorageError> {
        let open = self.opens.get(&id).ok_or(StorageError::OpenNotFound(id))?;
        let asset = open.asset;
        let old_bucket = match kind {
            TargetKind::StopLoss => open.sl_bucket,
            TargetKind::TakeProfit => open.tp_bucket,
        }
        .ok_or(StorageError::TargetNotSet(kind))?;

        self.remove_from_bucket(BucketKind::SlTp, asset, old_bucket, id.0)?;
        self.add_to_bucket(BucketKind::SlTp, asset, new_bucket, id.0, new_price);

        let open = self
            .opens
            .get_mut(&id)
            .expect("position present above");
        match kind {
            TargetKind::StopLoss => {
                open.sl_bucket = Some(new_bucket);
                open.stop_loss = Some(new_price);
            }
            TargetKind::TakeProfit => {
                open.tp_bucket = Some(new_bucket);
                open.take_profit = Some(new_price);
            }
        }
        Ok(())
    }

    fn bucket(&self, kind: BucketKind, asset: AssetIndex, bucket: BucketId) -> Vec<BucketEntry> {
        self.bucket_map(kind).snapshot(asset, bucket)
    }

    fn next_open_id(&self) -> u64 {
        self.next_open_id
    }

    fn next_order_id(&self) -> u64 {
        self.next_order_id
    }

    fn events(&self) -> &[Event] {
        &self.events
    }
}
