//! Margin-settlement arithmetic.
//!
//! Liquidation price is fixed once at open: the price at which a leveraged
//! adverse move of `1/lev` consumes the entire posted margin. PnL at close is
//! `Δprice * size * lev / open_price` with truncating integer division. Every
//! multiply-then-divide widens through 256 bits; narrowing back is checked,
//! and the signed conversion at close clamps instead of wrapping.

use crate::types::{Leverage, Pnl, Price, Side, Usd};
use primitive_types::U256;

fn to_u128(v: U256) -> Option<u128> {
    if v > U256::from(u128::MAX) {
        None
    } else {
        Some(v.as_u128())
    }
}

/// Price at which a position's leveraged loss equals its margin.
///
/// Long: `open * lev / (lev + 1)`. Short: `open * (lev + 1) / lev`.
/// `None` when the result leaves the price range (short with an extreme open
/// price, or a long so small the quotient truncates to zero).
pub fn liquidation_price(open_price: Price, leverage: Leverage, side: Side) -> Option<Price> {
    let p = U256::from(open_price.value());
    let lev = U256::from(leverage.value());
    let raw = match side {
        Side::Long => p * lev / (lev + U256::one()),
        Side::Short => p * (lev + U256::one()) / lev,
    };
    to_u128(raw).and_then(Price::new)
}

/// Realized PnL of a position settled at `close_price`.
///
/// Magnitude is `|close - open| * size * lev / open` truncated; the sign
/// follows the side and the direction of the move. `None` when the magnitude
/// exceeds the signed range.
pub fn position_pnl(
    side: Side,
    open_price: Price,
    close_price: Price,
    size_usd: Usd,
    leverage: Leverage,
) -> Option<Pnl> {
    let diff = U256::from(open_price.abs_diff(close_price));
    let product = (diff * U256::from(size_usd.value())).checked_mul(U256::from(leverage.value()))?;
    let magnitude = to_u128(product / U256::from(open_price.value()))?;
    let magnitude = i128::try_from(magnitude).ok()?;

    let gain = match side {
        Side::Long => close_price >= open_price,
        Side::Short => close_price <= open_price,
    };
    Some(Pnl::new(if gain { magnitude } else { -magnitude }))
}

/// Collateral returned to the trader on close: margin plus profit, or margin
/// minus loss clamped at zero when the loss exceeds the margin.
pub fn close_margin(size_usd: Usd, pnl: Pnl) -> Option<Usd> {
    if pnl.is_negative() {
        Some(size_usd.saturating_sub(pnl.unsigned_abs()))
    } else {
        size_usd.checked_add(pnl.unsigned_abs())
    }
}

/// The PnL written to the closed-trade ledger. A loss is clamped to the
/// posted margin so the ledger stays consistent with the clamped payout.
pub fn recorded_pnl(size_usd: Usd, pnl: Pnl) -> Pnl {
    let floor = -(i128::try_from(size_usd.value()).unwrap_or(i128::MAX));
    if pnl.value() < floor {
        Pnl::new(floor)
    } else {
        pnl
    }
}
