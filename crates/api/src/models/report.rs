//! Reporting aggregates.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use vastra_core::ProductId;

/// Store-wide totals.
#[derive(Debug, Clone, Serialize)]
pub struct SalesSummary {
    pub total_orders: i64,
    pub completed_orders: i64,
    pub pending_orders: i64,
    pub refund_required_orders: i64,
    /// Sum of `total_amount` over completed orders.
    pub revenue: Decimal,
    pub customers: i64,
    pub active_products: i64,
}

/// A best-selling product.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Completed sales for one day.
#[derive(Debug, Clone, Serialize)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}
