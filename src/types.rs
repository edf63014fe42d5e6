// 1.0: all the primitives live here. nothing in the engine works without these types.
// ids, prices, margins, leverage, timestamps. each is a newtype so the compiler
// catches type mixups. prices and margins are unsigned integers in six-decimal
// minor units; pnl is the one signed quantity in the system.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal scale shared by prices and the collateral token: six places.
pub const UNIT_SCALE: u128 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetIndex(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpenId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

// 1.1: price in collateral minor units per unit of base. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(u128);

impl Price {
    #[must_use]
    pub fn new(value: u128) -> Option<Self> {
        if value > 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: u128) -> Self {
        debug_assert!(value > 0);
        Self(value)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn abs_diff(&self, other: Price) -> u128 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / UNIT_SCALE, self.0 % UNIT_SCALE)
    }
}

// 1.2: collateral amount in minor units. deposited margin, settlement legs,
// vault balances all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Usd(u128);

impl Usd {
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(&self, other: Usd) -> Option<Usd> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Usd) -> Option<Usd> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(&self, other: Usd) -> Usd {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / UNIT_SCALE, self.0 % UNIT_SCALE)
    }
}

// 1.3: realized profit or loss. signed; a liquidation records exactly -size_usd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Pnl(i128);

impl Pnl {
    pub fn new(value: i128) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn unsigned_abs(&self) -> Usd {
        Usd::new(self.0.unsigned_abs())
    }

    pub fn saturating_add(&self, other: Pnl) -> Pnl {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Pnl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:06}", sign, abs / UNIT_SCALE, abs % UNIT_SCALE)
    }
}

// 1.4: leverage multiplier, whole numbers from 1x to 100x.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Leverage(u32);

impl Leverage {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    #[must_use]
    pub fn new(value: u32) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rejects_zero() {
        assert!(Price::new(0).is_none());
        assert_eq!(Price::new(1).unwrap().value(), 1);
    }

    #[test]
    fn leverage_bounds() {
        assert!(Leverage::new(0).is_none());
        assert!(Leverage::new(1).is_some());
        assert!(Leverage::new(100).is_some());
        assert!(Leverage::new(101).is_none());
    }

    #[test]
    fn usd_checked_arithmetic() {
        let a = Usd::new(10);
        let b = Usd::new(3);
        assert_eq!(a.checked_add(b), Some(Usd::new(13)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(b.saturating_sub(a), Usd::zero());
    }

    #[test]
    fn pnl_display_carries_sign() {
        assert_eq!(Pnl::new(-1_500_000).to_string(), "-1.500000");
        assert_eq!(Pnl::new(2_000_000).to_string(), "2.000000");
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Long.opposite(), Side::Short);
        assert!(Side::Long.is_long());
        assert!(!Side::Short.is_long());
    }
}
