//! Trader-facing limit-order operations: place and cancel.

use super::core::Engine;
use super::results::EngineError;
use crate::bucket::{bucket_id, BucketKind};
use crate::oracle::Oracle;
use crate::order::Order;
use crate::storage::Storage;
use crate::types::{AccountId, AssetIndex, Leverage, OrderId, Price, Side, Usd};
use crate::vault::Vault;

impl<S: Storage, V: Vault, O: Oracle> Engine<S, V, O> {
    /// Park a limit order. No oracle price is consulted at placement; the
    /// order waits in its bucket until an executor sweep finds the price
    /// within tolerance.
    #[allow(clippy::too_many_arguments)]
    pub fn place_order(
        &mut self,
        caller: AccountId,
        asset: AssetIndex,
        side: Side,
        leverage: u32,
        order_price: Price,
        size_usd: Usd,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<OrderId, EngineError> {
        let info = self.asset(asset)?;
        if !self.is_market_open(info.asset_type) {
            return Err(EngineError::MarketClosed(info.asset_type));
        }
        let leverage = Leverage::new(leverage).ok_or(EngineError::InvalidLeverage(leverage))?;
        if size_usd < self.config.min_position_margin {
            return Err(EngineError::MinSize {
                given: size_usd,
                min: self.config.min_position_margin,
            });
        }

        // With both targets set they must straddle the order price.
        if let (Some(sl), Some(tp)) = (stop_loss, take_profit) {
            let straddles = match side {
                Side::Long => sl < order_price && order_price < tp,
                Side::Short => tp < order_price && order_price < sl,
            };
            if !straddles {
                return Err(EngineError::InvalidSlTp);
            }
        }

        self.vault.deposit_margin(caller, size_usd)?;

        let limit_bucket = bucket_id(order_price, info.bucket_size);
        let order = Order {
            id: OrderId(0), // assigned by storage
            trader: caller,
            asset,
            side,
            leverage,
            order_price,
            size_usd,
            timestamp: self.current_time,
            stop_loss,
            take_profit,
            limit_bucket,
        };
        let id = self.storage.store_order(order);
        self.storage
            .add_to_bucket(BucketKind::Limit, asset, limit_bucket, id.0, order_price);

        tracing::debug!(
            trader = caller.0,
            asset = asset.0,
            id = id.0,
            %order_price,
            "order placed"
        );
        Ok(id)
    }

    /// Cancel the caller's pending order and refund its margin in full.
    pub fn cancel_order(&mut self, caller: AccountId, id: OrderId) -> Result<(), EngineError> {
        let order = self
            .storage
            .order(id)
            .ok_or(EngineError::OrderNotFound(id))?
            .clone();
        if order.trader != caller {
            return Err(EngineError::NotOrderOwner(id));
        }

        // Net-zero settlement: full margin back.
        self.vault
            .settle_margin(order.trader, order.size_usd, order.size_usd)?;
        self.storage
            .remove_from_bucket(BucketKind::Limit, order.asset, order.limit_bucket, id.0)?;
        self.storage.remove_order(order.trader, id);

        tracing::debug!(trader = caller.0, id = id.0, "order canceled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketId;
    use crate::engine::EngineConfig;
    use crate::oracle::StaticOracle;
    use crate::storage::InMemoryStorage;
    use crate::types::Pnl;
    use crate::vault::InMemoryVault;

    const ADMIN: AccountId = AccountId(1);
    const EXECUTOR: AccountId = AccountId(2);
    const ALICE: AccountId = AccountId(10);
    const BOB: AccountId = AccountId(11);
    const ASSET: AssetIndex = AssetIndex(7);

    fn usd(v: u128) -> Usd {
        Usd::new(v)
    }

    fn price(v: u128) -> Price {
        Price::new(v).unwrap()
    }

    fn setup() -> Engine<InMemoryStorage, InMemoryVault, StaticOracle> {
        let mut vault = InMemoryVault::new();
        vault.credit_wallet(ALICE, usd(1_000_000_000));

        let mut engine = Engine::new(
            EngineConfig::new(ADMIN, EXECUTOR),
            InMemoryStorage::new(),
            vault,
            StaticOracle::new(),
        );
        engine.list_asset(ADMIN, ASSET, 1_000_000, 0).unwrap();
        engine.set_market_open(ADMIN, 0, true).unwrap();
        engine
    }

    #[test]
    fn place_parks_margin_and_buckets() {
        let mut engine = setup();
        let id = engine
            .place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(50_000_000),
                None,
                None,
            )
            .unwrap();

        assert_eq!(engine.vault().margin_balance(ALICE), usd(50_000_000));
        let order = engine.order(id).unwrap();
        assert_eq!(order.limit_bucket, BucketId(1_950));
        assert_eq!(
            engine.bucket(BucketKind::Limit, ASSET, BucketId(1_950)).len(),
            1
        );
        assert_eq!(engine.user_order_ids(ALICE), vec![id]);
    }

    #[test]
    fn straddle_constraint_applies_when_both_set() {
        let mut engine = setup();
        // long: sl < price < tp required
        assert_eq!(
            engine.place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(50_000_000),
                Some(price(1_960_000_000)),
                Some(price(2_100_000_000)),
            ),
            Err(EngineError::InvalidSlTp)
        );
        // short: tp < price < sl
        assert!(engine
            .place_order(
                ALICE,
                ASSET,
                Side::Short,
                5,
                price(1_950_000_000),
                usd(50_000_000),
                Some(price(2_000_000_000)),
                Some(price(1_900_000_000)),
            )
            .is_ok());
        // a single target is accepted as-is
        assert!(engine
            .place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(50_000_000),
                Some(price(1_900_000_000)),
                None,
            )
            .is_ok());
    }

    #[test]
    fn cancel_refunds_in_full() {
        let mut engine = setup();
        let wallet_before = engine.vault().wallet_balance(ALICE);
        let id = engine
            .place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(10_000_000),
                None,
                None,
            )
            .unwrap();
        engine.cancel_order(ALICE, id).unwrap();

        assert_eq!(engine.vault().wallet_balance(ALICE), wallet_before);
        assert_eq!(engine.vault().margin_balance(ALICE), usd(0));
        assert!(engine.order(id).is_none());
        assert!(engine.bucket(BucketKind::Limit, ASSET, BucketId(1_950)).is_empty());
        assert_eq!(engine.user_order_ids(ALICE), Vec::<OrderId>::new());
        assert_eq!(engine.trader_total_pnl(ALICE), Pnl::zero());
    }

    #[test]
    fn cancel_is_owner_only() {
        let mut engine = setup();
        let id = engine
            .place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(10_000_000),
                None,
                None,
            )
            .unwrap();
        assert_eq!(
            engine.cancel_order(BOB, id),
            Err(EngineError::NotOrderOwner(id))
        );
        assert_eq!(
            engine.cancel_order(ALICE, OrderId(42)),
            Err(EngineError::OrderNotFound(OrderId(42)))
        );
    }

    #[test]
    fn place_enforces_bounds() {
        let mut engine = setup();
        assert_eq!(
            engine.place_order(
                ALICE,
                ASSET,
                Side::Long,
                0,
                price(1_950_000_000),
                usd(50_000_000),
                None,
                None
            ),
            Err(EngineError::InvalidLeverage(0))
        );
        assert!(matches!(
            engine.place_order(
                ALICE,
                ASSET,
                Side::Long,
                5,
                price(1_950_000_000),
                usd(9_999_999),
                None,
                None
            ),
            Err(EngineError::MinSize { .. })
        ));
    }
}
