use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockwell_core::{DomainError, InventoryId};

/// Stock-keeping unit code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reservation rejected: not enough unreserved stock.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("insufficient stock: requested {requested}, available {available}")]
pub struct InsufficientStock {
    pub requested: i64,
    pub available: i64,
}

/// What a commit actually did once clamping is applied.
///
/// `shortfall` is non-zero when the reservation had already been (partially)
/// released, e.g. by the administrative repair path, before the commit
/// arrived. Callers log it; the on-hand quantity is only decremented by the
/// clamped amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub committed: i64,
    pub shortfall: i64,
}

/// On-hand and reserved counters for one SKU.
///
/// Invariant: `0 <= reserved <= quantity`. Every transition below preserves
/// it; storage backends must apply each transition as one atomic conditional
/// update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    quantity: i64,
    reserved: i64,
}

impl StockLevel {
    pub fn new(quantity: i64) -> Result<Self, DomainError> {
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self { quantity, reserved: 0 })
    }

    /// Rehydrate from stored counters, re-checking the invariant.
    pub fn from_counters(quantity: i64, reserved: i64) -> Result<Self, DomainError> {
        if quantity < 0 || reserved < 0 || reserved > quantity {
            return Err(DomainError::invariant(format!(
                "stock counters out of range: quantity={quantity} reserved={reserved}"
            )));
        }
        Ok(Self { quantity, reserved })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Sellable right now: on-hand minus reserved.
    pub fn available(&self) -> i64 {
        self.quantity - self.reserved
    }

    /// Hold `qty` units against an in-flight order.
    ///
    /// Checks and increments in one step; a storage backend expresses this as
    /// `UPDATE .. SET reserved = reserved + qty WHERE quantity - reserved >= qty`.
    pub fn reserve(self, qty: i64) -> Result<StockLevel, InsufficientStock> {
        debug_assert!(qty > 0);
        if self.available() < qty {
            return Err(InsufficientStock {
                requested: qty,
                available: self.available(),
            });
        }
        Ok(StockLevel {
            quantity: self.quantity,
            reserved: self.reserved + qty,
        })
    }

    /// Return up to `qty` reserved units to the available pool.
    ///
    /// Clamped: a release replayed after the reservation is already gone is a
    /// no-op, never a negative counter. Returns the amount actually released.
    pub fn release(self, qty: i64) -> (StockLevel, i64) {
        debug_assert!(qty >= 0);
        let released = qty.min(self.reserved);
        (
            StockLevel {
                quantity: self.quantity,
                reserved: self.reserved - released,
            },
            released,
        )
    }

    /// Convert up to `qty` reserved units into a permanent stock decrement.
    ///
    /// Same clamping discipline as [`StockLevel::release`]; the receipt
    /// reports any shortfall so callers can surface it.
    pub fn commit(self, qty: i64) -> (StockLevel, CommitReceipt) {
        debug_assert!(qty >= 0);
        let committed = qty.min(self.reserved);
        (
            StockLevel {
                quantity: self.quantity - committed,
                reserved: self.reserved - committed,
            },
            CommitReceipt {
                committed,
                shortfall: qty - committed,
            },
        )
    }
}

/// One row of the inventory table: identity, SKU, counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub sku: Sku,
    pub level: StockLevel,
}

impl InventoryRecord {
    pub fn new(id: InventoryId, sku: Sku, quantity: i64) -> Result<Self, DomainError> {
        Ok(Self {
            id,
            sku,
            level: StockLevel::new(quantity)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_up_to_available_then_rejects() {
        let level = StockLevel::new(10).unwrap();
        let level = level.reserve(10).unwrap();
        assert_eq!(level.reserved(), 10);
        assert_eq!(level.available(), 0);

        let err = level.reserve(1).unwrap_err();
        assert_eq!(err, InsufficientStock { requested: 1, available: 0 });
    }

    #[test]
    fn release_is_clamped() {
        let level = StockLevel::new(5).unwrap().reserve(2).unwrap();
        let (level, released) = level.release(2);
        assert_eq!(released, 2);
        assert_eq!(level.reserved(), 0);

        // Replayed release: nothing left to give back.
        let (level, released) = level.release(2);
        assert_eq!(released, 0);
        assert_eq!(level.reserved(), 0);
        assert_eq!(level.quantity(), 5);
    }

    #[test]
    fn commit_decrements_both_counters() {
        let level = StockLevel::new(5).unwrap().reserve(2).unwrap();
        let (level, receipt) = level.commit(2);
        assert_eq!(receipt, CommitReceipt { committed: 2, shortfall: 0 });
        assert_eq!(level.quantity(), 3);
        assert_eq!(level.reserved(), 0);
    }

    #[test]
    fn double_commit_is_clamped_with_shortfall() {
        let level = StockLevel::new(5).unwrap().reserve(2).unwrap();
        let (level, _) = level.commit(2);
        let (level, receipt) = level.commit(2);
        assert_eq!(receipt, CommitReceipt { committed: 0, shortfall: 2 });
        assert_eq!(level.quantity(), 3);
        assert_eq!(level.reserved(), 0);
    }

    #[test]
    fn commit_after_partial_manual_release_reports_shortfall() {
        let level = StockLevel::new(10).unwrap().reserve(3).unwrap();
        let (level, _) = level.release(2);
        let (level, receipt) = level.commit(3);
        assert_eq!(receipt, CommitReceipt { committed: 1, shortfall: 2 });
        assert_eq!(level.quantity(), 9);
        assert_eq!(level.reserved(), 0);
    }

    #[test]
    fn rehydration_rejects_corrupt_counters() {
        assert!(StockLevel::from_counters(5, 6).is_err());
        assert!(StockLevel::from_counters(-1, 0).is_err());
        assert!(StockLevel::from_counters(5, -1).is_err());
        assert!(StockLevel::from_counters(5, 5).is_ok());
    }

    #[test]
    fn sku_rejects_blank() {
        assert!(Sku::new("  ").is_err());
        assert_eq!(Sku::new(" ABC-1 ").unwrap().as_str(), "ABC-1");
    }
}
