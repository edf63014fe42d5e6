//! Trader-facing position operations: open, close, move targets.

use super::core::Engine;
use super::results::EngineError;
use crate::bucket::{bucket_id, BucketKind};
use crate::margin::{close_margin, liquidation_price, position_pnl, recorded_pnl};
use crate::oracle::Oracle;
use crate::position::{Closed, Open};
use crate::storage::{Storage, TargetKind};
use crate::types::{AccountId, AssetIndex, Leverage, OpenId, Pnl, Price, Side, Usd};
use crate::vault::Vault;

impl<S: Storage, V: Vault, O: Oracle> Engine<S, V, O> {
    /// Open a position at the oracle price asserted in `proof`.
    ///
    /// All preconditions are checked before the margin deposit, which is the
    /// single fallible side effect; the storage and bucket writes that follow
    /// cannot fail, so an error from any step leaves state untouched.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &mut self,
        caller: AccountId,
        asset: AssetIndex,
        proof: &[u8],
        side: Side,
        leverage: u32,
        size_usd: Usd,
        stop_loss: Option<Price>,
        take_profit: Option<Price>,
    ) -> Result<OpenId, EngineError> {
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

        let bundle = self.oracle.verify(proof)?;
        let price = Self::price_from_bundle(&bundle, asset)?;
        let liq_price =
            liquidation_price(price, leverage, side).ok_or(EngineError::ArithmeticOverflow)?;
        validate_targets(side, price, liq_price, stop_loss, take_profit)?;

        self.vault.deposit_margin(caller, size_usd)?;

        let open = Open {
            id: OpenId(0), // assigned by storage
            trader: caller,
            asset,
            side,
            leverage,
            open_price: price,
            size_usd,
            timestamp: self.current_time,
            stop_loss,
            take_profit,
            liquidation_price: liq_price,
            sl_bucket: stop_loss.map(|p| bucket_id(p, info.bucket_size)),
            tp_bucket: take_profit.map(|p| bucket_id(p, info.bucket_size)),
            liq_bucket: bucket_id(liq_price, info.bucket_size),
        };
        let id = self.register_open(open);

        tracing::debug!(
            trader = caller.0,
            asset = asset.0,
            id = id.0,
            %price,
            "position opened"
        );
        Ok(id)
    }

    /// Close the caller's position at the oracle price asserted in `proof`.
    /// Returns the PnL written to the closed ledger.
    pub fn close_position(
        &mut self,
        caller: AccountId,
        id: OpenId,
        proof: &[u8],
    ) -> Result<Pnl, EngineError> {
        let open = self.lookup_open(id)?.clone();
        if open.trader != caller {
            return Err(EngineError::NotPositionOwner(id));
        }

        let bundle = self.oracle.verify(proof)?;
        let close_price = Self::price_from_bundle(&bundle, open.asset)?;
        let pnl = position_pnl(
            open.side,
            open.open_price,
            close_price,
            open.size_usd,
            open.leverage,
        )
        .ok_or(EngineError::ArithmeticOverflow)?;
        let payout = close_margin(open.size_usd, pnl).ok_or(EngineError::ArithmeticOverflow)?;
        let recorded = recorded_pnl(open.size_usd, pnl);

        self.vault.settle_margin(open.trader, open.size_usd, payout)?;
        self.remove_open_with_buckets(&open)?;
        self.storage.append_closed(
            open.trader,
            Closed {
                asset: open.asset,
                side: open.side,
                leverage: open.leverage,
                open_price: open.open_price,
                close_price,
                size_usd: open.size_usd,
                open_ts: open.timestamp,
                close_ts: self.current_time,
                pnl: recorded,
            },
        );

        tracing::debug!(trader = caller.0, id = id.0, %recorded, "position closed");
        Ok(recorded)
    }

    /// Move the caller's stop-loss or take-profit to a new price, keeping the
    /// bucket index in lockstep.
    pub fn update_target(
        &mut self,
        caller: AccountId,
        id: OpenId,
        kind: TargetKind,
        new_price: Price,
    ) -> Result<(), EngineError> {
        let open = self.lookup_open(id)?;
        if open.trader != caller {
            return Err(EngineError::NotPositionOwner(id));
        }

        let (current, other) = match kind {
            TargetKind::StopLoss => (open.stop_loss, open.take_profit),
            TargetKind::TakeProfit => (open.take_profit, open.stop_loss),
        };
        if current.is_none() {
            return Err(EngineError::InvalidTargetType(kind));
        }

        let valid = match (kind, open.side) {
            (TargetKind::StopLoss, Side::Long) => {
                new_price >= open.liquidation_price
                    && other.map_or(true, |tp| new_price < tp)
            }
            (TargetKind::StopLoss, Side::Short) => {
                new_price <= open.liquidation_price
                    && other.map_or(true, |tp| new_price > tp)
            }
            (TargetKind::TakeProfit, Side::Long) => {
                new_price > open.open_price && other.map_or(true, |sl| new_price > sl)
            }
            (TargetKind::TakeProfit, Side::Short) => {
                new_price < open.open_price && other.map_or(true, |sl| new_price < sl)
            }
        };
        if !valid {
            return Err(EngineError::InvalidSlTp);
        }

        let info = self.asset(open.asset)?;
        let new_bucket = bucket_id(new_price, info.bucket_size);
        self.storage
            .update_position_target(id, kind, new_bucket, new_price)?;
        Ok(())
    }

    // ---- shared with sweeps ----------------------------------------------

    /// Store a position and file its bucket memberships: the liquidation
    /// bucket unconditionally, SL/TP buckets when the target is set.
    pub(super) fn register_open(&mut self, open: Open) -> OpenId {
        let asset = open.asset;
        let liq_bucket = open.liq_bucket;
        let liq_price = open.liquidation_price;
        let sl = open.stop_loss.zip(open.sl_bucket);
        let tp = open.take_profit.zip(open.tp_bucket);

        let id = self.storage.store_open(open);
        self.storage
            .add_to_bucket(BucketKind::Liq, asset, liq_bucket, id.0, liq_price);
        if let Some((price, bucket)) = sl {
            self.storage
                .add_to_bucket(BucketKind::SlTp, asset, bucket, id.0, price);
        }
        if let Some((price, bucket)) = tp {
            self.storage
                .add_to_bucket(BucketKind::SlTp, asset, bucket, id.0, price);
        }
        id
    }

    /// Erase a position and every bucket membership it holds.
    pub(super) fn remove_open_with_buckets(&mut self, open: &Open) -> Result<(), EngineError> {
        self.storage
            .remove_from_bucket(BucketKind::Liq, open.asset, open.liq_bucket, open.id.0)?;
        if let Some(bucket) = open.sl_bucket {
            self.storage
                .remove_from_bucket(BucketKind::SlTp, open.asset, bucket, open.id.0)?;
        }
        if let Some(bucket) = open.tp_bucket {
            self.storage
                .remove_from_bucket(BucketKind::SlTp, open.asset, bucket, open.id.0)?;
        }
        self.storage.remove_open(open.trader, open.id);
        Ok(())
    }

    /// A live position by id; a miss on an id the counter already issued is
    /// reported as closed, anything else as unknown.
    pub(super) fn lookup_open(&self, id: OpenId) -> Result<&Open, EngineError> {
        if let Some(open) = self.storage.open(id) {
            return Ok(open);
        }
        if id.0 == 0 || id.0 >= self.storage.next_open_id() {
            Err(EngineError::PositionNotFound(id))
        } else {
            Err(EngineError::PositionAlreadyClosed(id))
        }
    }
}

/// SL/TP admission at open: for a long the stop must sit in
/// `[liquidation, price]` and the take-profit above the price; mirrored for
/// a short.
fn validate_targets(
    side: Side,
    price: Price,
    liq_price: Price,
    stop_loss: Option<Price>,
    take_profit: Option<Price>,
) -> Result<(), EngineError> {
    match side {
        Side::Long => {
            if let Some(sl) = stop_loss {
                if sl < liq_price || sl > price {
                    return Err(EngineError::InvalidSlTp);
                }
            }
            if let Some(tp) = take_profit {
                if tp <= price {
                    return Err(EngineError::InvalidSlTp);
                }
            }
        }
        Side::Short => {
            if let Some(sl) = stop_loss {
                if sl < price || sl > liq_price {
                    return Err(EngineError::InvalidSlTp);
                }
            }
            if let Some(tp) = take_profit {
                if tp >= price {
                    return Err(EngineError::InvalidSlTp);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketId;
    use crate::engine::EngineConfig;
    use crate::oracle::{PriceAssertion, StaticOracle};
    use crate::storage::InMemoryStorage;
    use crate::vault::InMemoryVault;

    const ADMIN: AccountId = AccountId(1);
    const EXECUTOR: AccountId = AccountId(2);
    const ALICE: AccountId = AccountId(10);
    const BOB: AccountId = AccountId(11);
    const ASSET: AssetIndex = AssetIndex(7);

    const PROOF_2000: &[u8] = b"proof-2000";
    const PROOF_2200: &[u8] = b"proof-2200";

    fn usd(v: u128) -> Usd {
        Usd::new(v)
    }

    fn price(v: u128) -> Price {
        Price::new(v).unwrap()
    }

    fn setup() -> Engine<InMemoryStorage, InMemoryVault, StaticOracle> {
        let mut vault = InMemoryVault::new();
        vault.credit_wallet(ALICE, usd(1_000_000_000));
        vault.credit_wallet(BOB, usd(1_000_000_000));
        vault.fund_pool(usd(10_000_000_000));

        let mut oracle = StaticOracle::new();
        oracle.register(
            PROOF_2000.to_vec(),
            vec![PriceAssertion::new(ASSET, 2_000_000_000)],
        );
        oracle.register(
            PROOF_2200.to_vec(),
            vec![PriceAssertion::new(ASSET, 2_200_000_000)],
        );

        let mut engine = Engine::new(
            EngineConfig::new(ADMIN, EXECUTOR),
            InMemoryStorage::new(),
            vault,
            oracle,
        );
        engine.list_asset(ADMIN, ASSET, 1_000_000, 0).unwrap();
        engine.set_market_open(ADMIN, 0, true).unwrap();
        engine
    }

    fn open_long(engine: &mut Engine<InMemoryStorage, InMemoryVault, StaticOracle>) -> OpenId {
        engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                None,
                None,
            )
            .unwrap()
    }

    #[test]
    fn open_then_close_long_with_profit() {
        let mut engine = setup();
        let wallet_before = engine.vault().wallet_balance(ALICE);

        let id = open_long(&mut engine);
        let open = engine.open(id).unwrap();
        assert_eq!(open.open_price, price(2_000_000_000));
        assert_eq!(open.liquidation_price, price(1_818_181_818));
        assert_eq!(engine.vault().margin_balance(ALICE), usd(100_000_000));
        assert_eq!(
            engine.bucket(BucketKind::Liq, ASSET, BucketId(1_818)).len(),
            1
        );

        let pnl = engine.close_position(ALICE, id, PROOF_2200).unwrap();
        assert_eq!(pnl, Pnl::new(100_000_000));
        assert!(engine.open(id).is_none());
        assert!(engine.bucket(BucketKind::Liq, ASSET, BucketId(1_818)).is_empty());
        assert_eq!(engine.user_open_ids(ALICE), Vec::<OpenId>::new());

        // 100 margin out, 200 back
        let wallet_after = engine.vault().wallet_balance(ALICE);
        assert_eq!(
            wallet_after.value(),
            wallet_before.value() + 100_000_000
        );
        assert_eq!(engine.closed_trades(ALICE).len(), 1);
        assert_eq!(engine.trader_total_pnl(ALICE), Pnl::new(100_000_000));
    }

    #[test]
    fn open_requires_listed_and_open_market() {
        let mut engine = setup();
        assert_eq!(
            engine.open_position(
                ALICE,
                AssetIndex(8),
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                None,
                None
            ),
            Err(EngineError::AssetNotListed(AssetIndex(8)))
        );

        engine.set_market_open(ADMIN, 0, false).unwrap();
        assert_eq!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                None,
                None
            ),
            Err(EngineError::MarketClosed(0))
        );
    }

    #[test]
    fn leverage_bounds() {
        let mut engine = setup();
        for lev in [0u32, 101] {
            assert_eq!(
                engine.open_position(
                    ALICE,
                    ASSET,
                    PROOF_2000,
                    Side::Long,
                    lev,
                    usd(100_000_000),
                    None,
                    None
                ),
                Err(EngineError::InvalidLeverage(lev))
            );
        }
        for lev in [1u32, 100] {
            assert!(engine
                .open_position(
                    ALICE,
                    ASSET,
                    PROOF_2000,
                    Side::Long,
                    lev,
                    usd(100_000_000),
                    None,
                    None
                )
                .is_ok());
        }
    }

    #[test]
    fn min_size_boundary() {
        let mut engine = setup();
        assert!(matches!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(9_999_999),
                None,
                None
            ),
            Err(EngineError::MinSize { .. })
        ));
        assert!(engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(10_000_000),
                None,
                None
            )
            .is_ok());
    }

    #[test]
    fn failed_validation_leaves_wallet_untouched() {
        let mut engine = setup();
        let before = engine.vault().wallet_balance(ALICE);
        // TP below price for a long
        let err = engine.open_position(
            ALICE,
            ASSET,
            PROOF_2000,
            Side::Long,
            10,
            usd(100_000_000),
            None,
            Some(price(1_999_000_000)),
        );
        assert_eq!(err, Err(EngineError::InvalidSlTp));
        assert_eq!(engine.vault().wallet_balance(ALICE), before);
        assert_eq!(engine.vault().margin_balance(ALICE), usd(0));
    }

    #[test]
    fn sl_tp_admission_long() {
        let mut engine = setup();
        // liq for 10x long at 2000 is 1818.181818
        // stop below liquidation rejected
        assert_eq!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                Some(price(1_800_000_000)),
                None
            ),
            Err(EngineError::InvalidSlTp)
        );
        // stop above the open price rejected
        assert_eq!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                Some(price(2_000_000_001)),
                None
            ),
            Err(EngineError::InvalidSlTp)
        );
        // both targets in range accepted and bucketed
        let id = engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                Some(price(1_900_000_000)),
                Some(price(2_100_000_000)),
            )
            .unwrap();
        let open = engine.open(id).unwrap();
        assert_eq!(open.sl_bucket, Some(BucketId(1_900)));
        assert_eq!(open.tp_bucket, Some(BucketId(2_100)));
        assert_eq!(
            engine.bucket(BucketKind::SlTp, ASSET, BucketId(1_900)).len(),
            1
        );
        assert_eq!(
            engine.bucket(BucketKind::SlTp, ASSET, BucketId(2_100)).len(),
            1
        );
    }

    #[test]
    fn sl_tp_admission_short() {
        let mut engine = setup();
        // liq for 10x short at 2000 is 2200
        assert!(engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Short,
                10,
                usd(100_000_000),
                Some(price(2_100_000_000)),
                Some(price(1_900_000_000)),
            )
            .is_ok());
        assert_eq!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Short,
                10,
                usd(100_000_000),
                Some(price(2_200_000_001)),
                None
            ),
            Err(EngineError::InvalidSlTp)
        );
        assert_eq!(
            engine.open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Short,
                10,
                usd(100_000_000),
                None,
                Some(price(2_000_000_000)),
            ),
            Err(EngineError::InvalidSlTp)
        );
    }

    #[test]
    fn close_is_owner_only() {
        let mut engine = setup();
        let id = open_long(&mut engine);
        assert_eq!(
            engine.close_position(BOB, id, PROOF_2200),
            Err(EngineError::NotPositionOwner(id))
        );
    }

    #[test]
    fn close_distinguishes_unknown_from_closed() {
        let mut engine = setup();
        let id = open_long(&mut engine);
        engine.close_position(ALICE, id, PROOF_2200).unwrap();

        assert_eq!(
            engine.close_position(ALICE, id, PROOF_2200),
            Err(EngineError::PositionAlreadyClosed(id))
        );
        assert_eq!(
            engine.close_position(ALICE, OpenId(99), PROOF_2200),
            Err(EngineError::PositionNotFound(OpenId(99)))
        );
    }

    #[test]
    fn loss_beyond_margin_clamps() {
        let mut engine = setup();
        // 100x long at 2000; a drop to 1900 is a 5x margin loss
        let id = engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                100,
                usd(100_000_000),
                None,
                None,
            )
            .unwrap();
        engine.oracle_mut().register(
            b"proof-1900".to_vec(),
            vec![PriceAssertion::new(ASSET, 1_900_000_000)],
        );

        let wallet_before = engine.vault().wallet_balance(ALICE);
        let pnl = engine.close_position(ALICE, id, b"proof-1900").unwrap();
        assert_eq!(pnl, Pnl::new(-100_000_000));
        // payout clamped to zero
        assert_eq!(engine.vault().wallet_balance(ALICE), wallet_before);
    }

    #[test]
    fn update_target_moves_bucket_and_price() {
        let mut engine = setup();
        let id = engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                Some(price(1_900_000_000)),
                Some(price(2_100_000_000)),
            )
            .unwrap();

        engine
            .update_target(ALICE, id, TargetKind::StopLoss, price(1_950_000_000))
            .unwrap();

        let open = engine.open(id).unwrap();
        assert_eq!(open.stop_loss, Some(price(1_950_000_000)));
        assert_eq!(open.sl_bucket, Some(BucketId(1_950)));
        assert!(engine.bucket(BucketKind::SlTp, ASSET, BucketId(1_900)).is_empty());
        assert_eq!(
            engine.bucket(BucketKind::SlTp, ASSET, BucketId(1_950)).len(),
            1
        );
    }

    #[test]
    fn update_target_validates_side_geometry() {
        let mut engine = setup();
        let id = engine
            .open_position(
                ALICE,
                ASSET,
                PROOF_2000,
                Side::Long,
                10,
                usd(100_000_000),
                Some(price(1_900_000_000)),
                Some(price(2_100_000_000)),
            )
            .unwrap();

        // stop under liquidation price
        assert_eq!(
            engine.update_target(ALICE, id, TargetKind::StopLoss, price(1_800_000_000)),
            Err(EngineError::InvalidSlTp)
        );
        // take-profit under the open price
        assert_eq!(
            engine.update_target(ALICE, id, TargetKind::TakeProfit, price(1_950_000_000)),
            Err(EngineError::InvalidSlTp)
        );
        // only the owner may move targets
        assert_eq!(
            engine.update_target(BOB, id, TargetKind::StopLoss, price(1_950_000_000)),
            Err(EngineError::NotPositionOwner(id))
        );
    }

    #[test]
    fn update_target_requires_existing_target() {
        let mut engine = setup();
        let id = open_long(&mut engine);
        assert_eq!(
            engine.update_target(ALICE, id, TargetKind::StopLoss, price(1_900_000_000)),
            Err(EngineError::InvalidTargetType(TargetKind::StopLoss))
        );
    }
}
