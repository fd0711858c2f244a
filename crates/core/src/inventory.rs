//! SKU stock counters.
//!
//! A SKU keeps two monotone counters: `quantity` (units ever received) and
//! `sold` (units ever sold). Availability is derived, never stored:
//! `available = quantity - sold`. The invariant `0 <= sold <= quantity`
//! holds for every SKU at all times; the database enforces the same rule
//! with a CHECK constraint and a conditional update at settlement.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a stock change would break the counters' invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("requested {requested} units but only {available} available")]
    Insufficient { requested: u32, available: u32 },

    #[error("quantity {quantity} is below units already sold ({sold})")]
    BelowSold { quantity: i32, sold: i32 },

    #[error("counters out of range: quantity {quantity}, sold {sold}")]
    Invalid { quantity: i32, sold: i32 },
}

/// Stock counters of one SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    quantity: i32,
    sold: i32,
}

impl StockLevel {
    /// Build a stock level, checking `0 <= sold <= quantity`.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Invalid` if the counters break the invariant.
    pub const fn new(quantity: i32, sold: i32) -> Result<Self, StockError> {
        if sold < 0 || quantity < sold {
            return Err(StockError::Invalid { quantity, sold });
        }
        Ok(Self { quantity, sold })
    }

    /// A freshly received SKU with nothing sold.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Invalid` for a negative quantity.
    pub const fn received(quantity: i32) -> Result<Self, StockError> {
        Self::new(quantity, 0)
    }

    #[must_use]
    pub const fn quantity(&self) -> i32 {
        self.quantity
    }

    #[must_use]
    pub const fn sold(&self) -> i32 {
        self.sold
    }

    /// Units that can still be sold.
    #[must_use]
    pub fn available(&self) -> u32 {
        u32::try_from(self.quantity - self.sold).unwrap_or(0)
    }

    /// Whether `requested` units can be sold right now.
    #[must_use]
    pub fn can_fulfil(&self, requested: u32) -> bool {
        requested > 0 && requested <= self.available()
    }

    /// Record `units` as sold, mirroring the settlement-time
    /// `sold = sold + units WHERE sold + units <= quantity` update.
    ///
    /// # Errors
    ///
    /// Returns `StockError::Insufficient` (and leaves `self` untouched) if
    /// fewer than `units` are available.
    pub fn commit(self, units: u32) -> Result<Self, StockError> {
        if !self.can_fulfil(units) {
            return Err(StockError::Insufficient {
                requested: units,
                available: self.available(),
            });
        }
        let units = i32::try_from(units).map_err(|_| StockError::Insufficient {
            requested: units,
            available: self.available(),
        })?;
        Ok(Self {
            quantity: self.quantity,
            sold: self.sold + units,
        })
    }

    /// Change the received quantity (restock or correction).
    ///
    /// # Errors
    ///
    /// Returns `StockError::BelowSold` if `quantity` would drop below the
    /// units already sold.
    pub const fn restock(self, quantity: i32) -> Result<Self, StockError> {
        if quantity < self.sold {
            return Err(StockError::BelowSold {
                quantity,
                sold: self.sold,
            });
        }
        Ok(Self {
            quantity,
            sold: self.sold,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_available_is_derived() {
        let stock = StockLevel::new(10, 4).unwrap();
        assert_eq!(stock.available(), 6);
        assert!(stock.can_fulfil(6));
        assert!(!stock.can_fulfil(7));
        assert!(!stock.can_fulfil(0));
    }

    #[test]
    fn test_new_rejects_oversold_counters() {
        assert_eq!(
            StockLevel::new(3, 4),
            Err(StockError::Invalid {
                quantity: 3,
                sold: 4
            })
        );
        assert!(StockLevel::new(3, -1).is_err());
    }

    #[test]
    fn test_commit_consumes_availability() {
        let stock = StockLevel::received(5).unwrap().commit(2).unwrap();
        assert_eq!(stock.sold(), 2);
        assert_eq!(stock.quantity(), 5);
        assert_eq!(stock.available(), 3);
    }

    #[test]
    fn test_second_commit_of_last_unit_fails() {
        let stock = StockLevel::new(5, 4).unwrap();
        let first = stock.commit(1).unwrap();
        assert_eq!(first.available(), 0);
        // A second settlement computed from the same snapshot must re-check
        // against the updated counters, not the stale one.
        assert_eq!(
            first.commit(1),
            Err(StockError::Insufficient {
                requested: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_sold_never_exceeds_quantity() {
        let mut stock = StockLevel::received(7).unwrap();
        for units in [3, 3, 3, 1, 1] {
            if let Ok(next) = stock.commit(units) {
                stock = next;
            }
            assert!(stock.sold() <= stock.quantity());
        }
        assert_eq!(stock.sold(), 7);
    }

    #[test]
    fn test_restock_cannot_go_below_sold() {
        let stock = StockLevel::new(10, 6).unwrap();
        assert_eq!(stock.restock(12).unwrap().available(), 6);
        assert_eq!(stock.restock(6).unwrap().available(), 0);
        assert_eq!(
            stock.restock(5),
            Err(StockError::BelowSold {
                quantity: 5,
                sold: 6
            })
        );
    }
}
