//! Executor sweeps.
//!
//! One oracle bundle per call. For every `(pair, price)` assertion the sweep
//! scans the three neighbourhood buckets `{b-1, b, b+1}` of its kind and
//! finalizes whatever the tolerance predicate accepts. Each sweep is
//! plan/apply: the read-only plan phase does all fallible arithmetic and
//! liveness filtering, the monetary legs go through one atomic settlement
//! batch, and the storage mutations that follow cannot fail. Any error
//! therefore unwinds the whole sweep. Dead entries (already finalized by an
//! earlier trigger) are silently skipped, never an error.

use super::core::Engine;
use super::results::{
    CloseSweepReport, ClosedTrigger, EngineError, FillSweepReport, LiquidatedPosition,
    LiquidationSweepReport, PromotedOrder,
};
use crate::bucket::{bucket_id, neighbourhood, tolerance_hit, BucketKind};
use crate::margin::{close_margin, liquidation_price, position_pnl, recorded_pnl};
use crate::oracle::{Oracle, PriceAssertion};
use crate::order::Order;
use crate::position::{Closed, Open};
use crate::storage::Storage;
use crate::types::{AccountId, OpenId, OrderId, Pnl, Price, Usd};
use crate::vault::{Settlement, Vault};
use std::collections::HashSet;

/// One accepted trigger out of a bucket scan: which entity, and the asserted
/// price that touched it.
struct Trigger {
    price: Price,
    entry_id: u64,
}

impl<S: Storage, V: Vault, O: Oracle> Engine<S, V, O> {
    /// Fill pending limit orders touched by the bundle: each is promoted to
    /// a position at its `order_price`, never at the oracle price.
    pub fn execute_orders(
        &mut self,
        caller: AccountId,
        proof: &[u8],
    ) -> Result<FillSweepReport, EngineError> {
        self.require_executor(caller)?;
        let bundle = self.oracle.verify(proof)?;
        let triggers = self.scan(&bundle, BucketKind::Limit)?;

        let mut seen = HashSet::new();
        let mut plan: Vec<(Order, Price)> = Vec::new();
        for trigger in &triggers {
            let id = OrderId(trigger.entry_id);
            if !seen.insert(id) {
                continue;
            }
            let Some(order) = self.storage.order(id) else {
                continue; // no longer live
            };
            let liq_price = liquidation_price(order.order_price, order.leverage, order.side)
                .ok_or(EngineError::ArithmeticOverflow)?;
            plan.push((order.clone(), liq_price));
        }

        let mut report = FillSweepReport::default();
        for (order, liq_price) in plan {
            let info = self.asset(order.asset)?;
            let open = Open {
                id: OpenId(0), // assigned by storage
                trader: order.trader,
                asset: order.asset,
                side: order.side,
                leverage: order.leverage,
                open_price: order.order_price,
                size_usd: order.size_usd,
                timestamp: self.current_time,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
                liquidation_price: liq_price,
                sl_bucket: order.stop_loss.map(|p| bucket_id(p, info.bucket_size)),
                tp_bucket: order.take_profit.map(|p| bucket_id(p, info.bucket_size)),
                liq_bucket: bucket_id(liq_price, info.bucket_size),
            };
            let open_id = self.register_open(open);
            self.storage.remove_from_bucket(
                BucketKind::Limit,
                order.asset,
                order.limit_bucket,
                order.id.0,
            )?;
            self.storage.remove_order(order.trader, order.id);
            report.promoted.push(PromotedOrder {
                order_id: order.id,
                open_id,
                trader: order.trader,
            });
        }

        tracing::info!(promoted = report.promoted.len(), "limit-fill sweep");
        Ok(report)
    }

    /// Close positions whose stop-loss or take-profit was touched, settling
    /// at the oracle price. A position with both targets in reach closes on
    /// the first trigger observed; the second sees it dead and skips.
    pub fn close_all_on_targets(
        &mut self,
        caller: AccountId,
        proof: &[u8],
    ) -> Result<CloseSweepReport, EngineError> {
        self.require_executor(caller)?;
        let bundle = self.oracle.verify(proof)?;
        let triggers = self.scan(&bundle, BucketKind::SlTp)?;

        let mut seen = HashSet::new();
        let mut plan: Vec<(Open, Price, Usd, Pnl)> = Vec::new();
        for trigger in &triggers {
            let id = OpenId(trigger.entry_id);
            if !seen.insert(id) {
                continue;
            }
            let Some(open) = self.storage.open(id) else {
                continue;
            };
            let pnl = position_pnl(
                open.side,
                open.open_price,
                trigger.price,
                open.size_usd,
                open.leverage,
            )
            .ok_or(EngineError::ArithmeticOverflow)?;
            let payout = close_margin(open.size_usd, pnl).ok_or(EngineError::ArithmeticOverflow)?;
            let recorded = recorded_pnl(open.size_usd, pnl);
            plan.push((open.clone(), trigger.price, payout, recorded));
        }

        let settlements: Vec<Settlement> = plan
            .iter()
            .map(|(open, _, payout, _)| Settlement {
                trader: open.trader,
                open_margin: open.size_usd,
                close_margin: *payout,
            })
            .collect();
        self.vault.settle_batch(&settlements)?;

        let mut report = CloseSweepReport::default();
        for (open, close_price, _, recorded) in plan {
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
            report.closed.push(ClosedTrigger {
                open_id: open.id,
                trader: open.trader,
                pnl: recorded,
            });
        }

        tracing::info!(closed = report.closed.len(), "target-close sweep");
        Ok(report)
    }

    /// Liquidate positions whose liquidation price was touched: total loss,
    /// the trader keeps nothing and the ledger records `-size_usd`.
    pub fn liquidate_positions(
        &mut self,
        caller: AccountId,
        proof: &[u8],
    ) -> Result<LiquidationSweepReport, EngineError> {
        self.require_executor(caller)?;
        let bundle = self.oracle.verify(proof)?;
        let triggers = self.scan(&bundle, BucketKind::Liq)?;

        let mut seen = HashSet::new();
        let mut plan: Vec<(Open, Price, Pnl)> = Vec::new();
        for trigger in &triggers {
            let id = OpenId(trigger.entry_id);
            if !seen.insert(id) {
                continue;
            }
            let Some(open) = self.storage.open(id) else {
                continue;
            };
            let loss = i128::try_from(open.size_usd.value())
                .map(|v| Pnl::new(-v))
                .map_err(|_| EngineError::ArithmeticOverflow)?;
            plan.push((open.clone(), trigger.price, loss));
        }

        let settlements: Vec<Settlement> = plan
            .iter()
            .map(|(open, _, _)| Settlement {
                trader: open.trader,
                open_margin: open.size_usd,
                close_margin: Usd::zero(),
            })
            .collect();
        self.vault.settle_batch(&settlements)?;

        let mut report = LiquidationSweepReport::default();
        for (open, close_price, loss) in plan {
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
                    pnl: loss,
                },
            );
            report.liquidated.push(LiquidatedPosition {
                open_id: open.id,
                trader: open.trader,
            });
        }

        tracing::info!(liquidated = report.liquidated.len(), "liquidation sweep");
        Ok(report)
    }

    /// Scan the ±1 neighbourhood buckets of `kind` for every assertion in
    /// the bundle. Unlisted pairs are skipped (no bucket can exist for
    /// them); a zero price is malformed oracle data and aborts.
    fn scan(
        &self,
        bundle: &[PriceAssertion],
        kind: BucketKind,
    ) -> Result<Vec<Trigger>, EngineError> {
        let mut triggers = Vec::new();
        for assertion in bundle {
            let Some(info) = self.assets.get(&assertion.pair_id) else {
                continue;
            };
            let price =
                Price::new(assertion.price).ok_or(EngineError::PriceZero(assertion.pair_id))?;
            let center = bucket_id(price, info.bucket_size);
            for bucket in neighbourhood(center) {
                for entry in self.storage.bucket(kind, assertion.pair_id, bucket) {
                    if tolerance_hit(price, entry.target_price, self.price_tolerance) {
                        triggers.push(Trigger {
                            price,
                            entry_id: entry.id,
                        });
                    }
                }
            }
        }
        Ok(triggers)
    }
}
