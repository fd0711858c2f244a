//! Order totals.
//!
//! Amounts are in the major currency unit (rupees) using decimal
//! arithmetic. The payment gateway works in minor units (paise), see
//! [`OrderTotals::total_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// ISO 4217 code for every amount the store handles.
pub const CURRENCY: &str = "INR";

/// Default tax rate applied to the taxable amount, in percent.
pub const DEFAULT_TAX_RATE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// A line that contributes to the taxable amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PricedLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Computed totals of an order.
///
/// - `taxable_amount = Σ unit_price × quantity`
/// - `tax_amount = taxable × rate`, rounded to 2 decimal places
/// - `total_amount = round(taxable + tax)` to a whole currency unit
/// - `round_off_amount = total − (taxable + tax)`, may be negative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub round_off_amount: Decimal,
    pub total_amount: Decimal,
}

impl OrderTotals {
    /// Compute totals for `lines` at `tax_rate_percent`.
    #[must_use]
    pub fn compute(lines: &[PricedLine], tax_rate_percent: Decimal) -> Self {
        let taxable_amount: Decimal = lines.iter().map(PricedLine::line_total).sum();
        let tax_amount = (taxable_amount * tax_rate_percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let gross = taxable_amount + tax_amount;
        let total_amount = gross.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        Self {
            taxable_amount,
            tax_amount,
            round_off_amount: total_amount - gross,
            total_amount,
        }
    }

    /// Total in minor currency units (paise) as the gateway expects.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn total_minor_units(&self) -> Option<i64> {
        (self.total_amount * Decimal::ONE_HUNDRED).to_i64()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn line(price: &str, quantity: u32) -> PricedLine {
        PricedLine {
            unit_price: dec(price),
            quantity,
        }
    }

    #[test]
    fn test_whole_total_has_no_round_off() {
        let totals = OrderTotals::compute(&[line("500", 2)], DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.taxable_amount, dec("1000"));
        assert_eq!(totals.tax_amount, dec("50.00"));
        assert_eq!(totals.total_amount, dec("1050"));
        assert_eq!(totals.round_off_amount, Decimal::ZERO);
        assert_eq!(totals.total_minor_units(), Some(105_000));
    }

    #[test]
    fn test_fractional_total_rounds_up() {
        let totals = OrderTotals::compute(&[line("333", 1)], DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.taxable_amount, dec("333"));
        assert_eq!(totals.tax_amount, dec("16.65"));
        assert_eq!(totals.total_amount, dec("350"));
        assert_eq!(totals.round_off_amount, dec("0.35"));
        assert_eq!(totals.total_minor_units(), Some(35_000));
    }

    #[test]
    fn test_round_off_can_be_negative() {
        // 101 + 5.05 = 106.05 -> 106
        let totals = OrderTotals::compute(&[line("101", 1)], DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.total_amount, dec("106"));
        assert_eq!(totals.round_off_amount, dec("-0.05"));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 0.5 * 5% = 0.025 -> 0.03
        let totals = OrderTotals::compute(&[line("0.50", 1)], DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.tax_amount, dec("0.03"));
    }

    #[test]
    fn test_totals_identity_holds_across_lines() {
        let lines = [line("199.99", 3), line("49.50", 2), line("1250", 1)];
        let totals = OrderTotals::compute(&lines, DEFAULT_TAX_RATE_PERCENT);
        assert_eq!(totals.taxable_amount, dec("1948.97"));
        assert_eq!(
            totals.total_amount,
            totals.taxable_amount + totals.tax_amount + totals.round_off_amount
        );
        assert_eq!(totals.total_amount.fract(), Decimal::ZERO);
        assert!(totals.round_off_amount.abs() <= dec("0.5"));
    }

    #[test]
    fn test_custom_tax_rate() {
        let totals = OrderTotals::compute(&[line("1000", 1)], dec("12"));
        assert_eq!(totals.tax_amount, dec("120.00"));
        assert_eq!(totals.total_amount, dec("1120"));
    }
}
