//! Bounded per-commodity goods storage owned by a single building.
//!
//! Every stock keeps `0 <= current <= max`. Deposits and withdrawals clamp
//! instead of failing and return the amount actually moved; the caller is
//! responsible for whatever was not accepted.

use crate::id::GoodType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors raised while configuring a ledger.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid capacity {max} for {good}")]
    InvalidCapacity { good: GoodType, max: i64 },
    #[error("invalid store capacity {0}")]
    InvalidStoreCapacity(i64),
    #[error("stored total {total} exceeds store capacity {max}")]
    OverStoreCapacity { total: u32, max: u32 },
}

/// Current and maximum quantity of one commodity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodStock {
    pub good: GoodType,
    pub current: u32,
    pub max: u32,
}

impl GoodStock {
    pub fn new(good: GoodType, max: u32) -> Self {
        Self {
            good,
            current: 0,
            max,
        }
    }

    /// Room left under this stock's own cap.
    pub fn free(&self) -> u32 {
        self.max.saturating_sub(self.current)
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

/// Fixed set of commodity stocks plus an aggregate cap across all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsLedger {
    stocks: BTreeMap<GoodType, GoodStock>,
    max_total: u32,
}

impl Default for GoodsLedger {
    fn default() -> Self {
        Self::new(u32::MAX)
    }
}

fn checked_capacity(max: i64) -> Option<u32> {
    u32::try_from(max).ok()
}

impl GoodsLedger {
    /// Create an empty ledger whose stocks together may hold at most `max_total`.
    pub fn new(max_total: u32) -> Self {
        Self {
            stocks: BTreeMap::new(),
            max_total,
        }
    }

    /// Set or overwrite the cap for one commodity. A current quantity above
    /// the new cap is cut down to it.
    pub fn set_capacity(&mut self, good: GoodType, max: i64) -> Result<(), LedgerError> {
        let max = checked_capacity(max).ok_or(LedgerError::InvalidCapacity { good, max })?;
        self.add_stock(good, max);
        Ok(())
    }

    /// Infallible form of [`set_capacity`](Self::set_capacity).
    pub fn add_stock(&mut self, good: GoodType, max: u32) {
        let stock = self
            .stocks
            .entry(good)
            .or_insert_with(|| GoodStock::new(good, max));
        stock.max = max;
        stock.current = stock.current.min(max);
    }

    /// Overwrite the current amount of an existing stock, bypassing the
    /// aggregate cap. Used when restoring saved state. Returns the value
    /// stored after clamping to the stock's own cap.
    pub fn set_quantity(&mut self, good: GoodType, current: u32) -> u32 {
        let Some(stock) = self.stocks.get_mut(&good) else {
            return 0;
        };
        stock.current = current.min(stock.max);
        stock.current
    }

    /// Set the aggregate cap. Existing contents are left alone; only future
    /// deposits see the new limit.
    pub fn set_max_total(&mut self, max_total: i64) -> Result<(), LedgerError> {
        self.max_total =
            checked_capacity(max_total).ok_or(LedgerError::InvalidStoreCapacity(max_total))?;
        Ok(())
    }

    pub fn max_total(&self) -> u32 {
        self.max_total
    }

    /// Current amount of `good`. Zero for commodities without a stock.
    pub fn quantity(&self, good: GoodType) -> u32 {
        self.stocks.get(&good).map(|s| s.current).unwrap_or(0)
    }

    /// Per-commodity cap. Zero for commodities without a stock.
    pub fn capacity(&self, good: GoodType) -> u32 {
        self.stocks.get(&good).map(|s| s.max).unwrap_or(0)
    }

    pub fn stock(&self, good: GoodType) -> Option<&GoodStock> {
        self.stocks.get(&good)
    }

    /// All stocks in commodity order.
    pub fn stocks(&self) -> impl Iterator<Item = &GoodStock> {
        self.stocks.values()
    }

    /// Sum of current quantities across every stock.
    pub fn total(&self) -> u32 {
        self.stocks
            .values()
            .fold(0u32, |acc, s| acc.saturating_add(s.current))
    }

    /// Amount a deposit of `good` could accept right now.
    pub fn free_space(&self, good: GoodType) -> u32 {
        let Some(stock) = self.stocks.get(&good) else {
            return 0;
        };
        stock
            .free()
            .min(self.max_total.saturating_sub(self.total()))
    }

    pub fn has_room(&self, good: GoodType) -> bool {
        self.free_space(good) > 0
    }

    /// Add up to `amount` of `good`. Returns the amount accepted.
    #[must_use = "returns the quantity accepted, which may be less than requested"]
    pub fn deposit(&mut self, good: GoodType, amount: u32) -> u32 {
        let accepted = amount.min(self.free_space(good));
        if accepted > 0
            && let Some(stock) = self.stocks.get_mut(&good)
        {
            stock.current += accepted;
        }
        accepted
    }

    /// Put back goods previously withdrawn. Only the stock's own cap applies,
    /// so a ledger sitting above its aggregate cap still gets the full amount.
    #[must_use = "returns the quantity restored"]
    pub fn restore(&mut self, good: GoodType, amount: u32) -> u32 {
        let Some(stock) = self.stocks.get_mut(&good) else {
            return 0;
        };
        let restored = amount.min(stock.free());
        stock.current += restored;
        restored
    }

    /// Fail if the stocks together hold more than the aggregate cap.
    pub fn check_total(&self) -> Result<(), LedgerError> {
        let total = self.total();
        if total > self.max_total {
            return Err(LedgerError::OverStoreCapacity {
                total,
                max: self.max_total,
            });
        }
        Ok(())
    }

    /// Remove up to `amount` of `good`. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn withdraw(&mut self, good: GoodType, amount: u32) -> u32 {
        let Some(stock) = self.stocks.get_mut(&good) else {
            return 0;
        };
        let removed = amount.min(stock.current);
        stock.current -= removed;
        removed
    }
}
