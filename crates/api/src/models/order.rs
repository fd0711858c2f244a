//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vastra_core::{CustomerId, OrderId, OrderTotals, PaymentStatus, ProductId, SizeId};

use super::AddressSnapshot;

/// A customer order. The gateway signature is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub is_buy_now: bool,
    pub address: AddressSnapshot,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub currency: String,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order with its price snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product_size_id: SizeId,
    pub product_id: ProductId,
    pub product_name: String,
    pub colour: String,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
}

/// An order with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLine>,
}
