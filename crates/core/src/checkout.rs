//! Selecting the lines of a new order.
//!
//! Cart checkout uses a partial-failure policy: each requested line is
//! checked on its own and lines that can't be fulfilled are dropped, while
//! the rest proceed. Buy-now has a single line, so it either fits or fails.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::inventory::StockLevel;
use crate::pricing::{OrderTotals, PricedLine};
use crate::types::SizeId;

/// Informational message returned when some cart lines were dropped.
pub const PARTIAL_STOCK_MESSAGE: &str = "Some products are out of stock";

/// Errors that stop an order from being created at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Product is out of stock")]
    OutOfStock,
}

/// A requested line joined with the current state of its SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCandidate {
    pub size_id: SizeId,
    pub requested: u32,
    pub unit_price: Decimal,
    pub stock: StockLevel,
    /// Size, colour and product are all active.
    pub visible: bool,
}

impl LineCandidate {
    fn fulfillable(&self) -> bool {
        self.visible && self.stock.can_fulfil(self.requested)
    }
}

/// A line that made it into the order, with its price snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckoutLine {
    pub size_id: SizeId,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl From<&CheckoutLine> for PricedLine {
    fn from(line: &CheckoutLine) -> Self {
        Self {
            unit_price: line.unit_price,
            quantity: line.quantity,
        }
    }
}

/// Outcome of line selection: what will be ordered and what was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSelection {
    lines: Vec<CheckoutLine>,
    dropped: Vec<SizeId>,
}

impl CheckoutSelection {
    /// Select the fulfillable lines of a cart.
    ///
    /// # Errors
    ///
    /// `CheckoutError::EmptyCart` if there were no candidates at all,
    /// `CheckoutError::OutOfStock` if none of them can be fulfilled.
    pub fn from_cart(candidates: &[LineCandidate]) -> Result<Self, CheckoutError> {
        if candidates.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let (ok, failed): (Vec<&LineCandidate>, Vec<&LineCandidate>) =
            candidates.iter().partition(|c| c.fulfillable());

        if ok.is_empty() {
            return Err(CheckoutError::OutOfStock);
        }

        Ok(Self {
            lines: ok
                .into_iter()
                .map(|c| CheckoutLine {
                    size_id: c.size_id,
                    unit_price: c.unit_price,
                    quantity: c.requested,
                })
                .collect(),
            dropped: failed.into_iter().map(|c| c.size_id).collect(),
        })
    }

    /// Select the single line of a buy-now order.
    ///
    /// # Errors
    ///
    /// `CheckoutError::OutOfStock` if the SKU is missing, hidden or sold out.
    pub fn buy_now(candidate: Option<&LineCandidate>) -> Result<Self, CheckoutError> {
        match candidate {
            Some(c) if c.fulfillable() => Ok(Self {
                lines: vec![CheckoutLine {
                    size_id: c.size_id,
                    unit_price: c.unit_price,
                    quantity: c.requested,
                }],
                dropped: Vec::new(),
            }),
            _ => Err(CheckoutError::OutOfStock),
        }
    }

    #[must_use]
    pub fn lines(&self) -> &[CheckoutLine] {
        &self.lines
    }

    #[must_use]
    pub fn dropped(&self) -> &[SizeId] {
        &self.dropped
    }

    /// Informational message for the caller when lines were dropped.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        (!self.dropped.is_empty()).then_some(PARTIAL_STOCK_MESSAGE)
    }

    /// Totals over the selected lines.
    #[must_use]
    pub fn totals(&self, tax_rate_percent: Decimal) -> OrderTotals {
        let priced: Vec<PricedLine> = self.lines.iter().map(PricedLine::from).collect();
        OrderTotals::compute(&priced, tax_rate_percent)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pricing::DEFAULT_TAX_RATE_PERCENT;

    fn candidate(id: i32, requested: u32, quantity: i32, sold: i32) -> LineCandidate {
        LineCandidate {
            size_id: SizeId::new(id),
            requested,
            unit_price: Decimal::from(500),
            stock: StockLevel::new(quantity, sold).unwrap(),
            visible: true,
        }
    }

    #[test]
    fn test_out_of_stock_line_is_dropped_not_fatal() {
        let selection =
            CheckoutSelection::from_cart(&[candidate(1, 2, 10, 0), candidate(2, 1, 3, 3)])
                .unwrap();

        assert_eq!(selection.lines().len(), 1);
        assert_eq!(selection.lines()[0].size_id, SizeId::new(1));
        assert_eq!(selection.dropped(), &[SizeId::new(2)]);
        assert_eq!(selection.message(), Some(PARTIAL_STOCK_MESSAGE));

        let totals = selection.totals(DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.taxable_amount, Decimal::from(1000));
    }

    #[test]
    fn test_requested_more_than_available_is_dropped() {
        let selection =
            CheckoutSelection::from_cart(&[candidate(1, 4, 5, 2), candidate(2, 1, 1, 0)]).unwrap();
        assert_eq!(selection.dropped(), &[SizeId::new(1)]);
    }

    #[test]
    fn test_hidden_line_is_dropped() {
        let mut hidden = candidate(1, 1, 10, 0);
        hidden.visible = false;
        let selection = CheckoutSelection::from_cart(&[hidden, candidate(2, 1, 10, 0)]).unwrap();
        assert_eq!(selection.lines()[0].size_id, SizeId::new(2));
    }

    #[test]
    fn test_full_cart_has_no_message() {
        let selection = CheckoutSelection::from_cart(&[candidate(1, 1, 10, 0)]).unwrap();
        assert_eq!(selection.message(), None);
    }

    #[test]
    fn test_nothing_available_fails() {
        assert_eq!(
            CheckoutSelection::from_cart(&[candidate(1, 1, 2, 2)]),
            Err(CheckoutError::OutOfStock)
        );
        assert_eq!(
            CheckoutSelection::from_cart(&[]),
            Err(CheckoutError::EmptyCart)
        );
    }

    #[test]
    fn test_buy_now() {
        let ok = candidate(7, 1, 1, 0);
        let selection = CheckoutSelection::buy_now(Some(&ok)).unwrap();
        assert_eq!(selection.lines()[0].quantity, 1);

        let sold_out = candidate(7, 1, 1, 1);
        assert_eq!(
            CheckoutSelection::buy_now(Some(&sold_out)),
            Err(CheckoutError::OutOfStock)
        );
        assert_eq!(
            CheckoutSelection::buy_now(None),
            Err(CheckoutError::OutOfStock)
        );
    }
}
