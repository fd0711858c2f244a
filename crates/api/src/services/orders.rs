//! Order placement and payment settlement.
//!
//! Placement selects the orderable lines, prices them, creates a gateway
//! order and persists a `pending` order. Settlement checks the gateway
//! signature and then consumes stock with a conditional update per line;
//! if any SKU no longer has the units, nothing is consumed and the order is
//! flagged `refund_required` for support to refund.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use vastra_core::pricing::CURRENCY;
use vastra_core::{AddressId, CheckoutError, CheckoutSelection, CustomerId, SizeId};

use super::payment::{PaymentError, PaymentGateway};
use crate::db::{
    AddressRepository, CartRepository, NewOrder, OrderRepository, RepositoryError, Settlement,
    SizeRepository,
};
use crate::models::{AddressSnapshot, Order};

/// Units ordered by a buy-now checkout.
const BUY_NOW_QUANTITY: u32 = 1;

/// Errors from placing or settling an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Nothing in the request can be ordered.
    #[error("{0}")]
    Checkout(#[from] CheckoutError),

    #[error("Address not found")]
    AddressNotFound,

    /// No pending order of this customer matches.
    #[error("Order not found")]
    NotPending,

    /// A SKU ran out between order creation and payment.
    #[error("Stock changed after payment, please contact support")]
    StockChanged,

    /// Order total doesn't fit the gateway's amount field.
    #[error("order total out of range")]
    AmountOutOfRange,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What the customer is checking out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSource {
    /// One unit of a single SKU.
    BuyNow(SizeId),
    /// The customer's whole cart.
    Cart,
}

impl OrderSource {
    const fn is_buy_now(self) -> bool {
        matches!(self, Self::BuyNow(_))
    }
}

/// A created order and what the payment widget needs to collect it.
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: Order,
    /// Gateway amount in minor units.
    pub amount: i64,
    /// Set when some cart lines were dropped.
    pub message: Option<&'static str>,
}

/// Order workflow over the database and the payment gateway.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    gateway: &'a PaymentGateway,
    tax_rate_percent: Decimal,
    media_base_url: &'a str,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a PaymentGateway,
        tax_rate_percent: Decimal,
        media_base_url: &'a str,
    ) -> Self {
        Self {
            pool,
            gateway,
            tax_rate_percent,
            media_base_url,
        }
    }

    /// Create a pending order and its gateway order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Checkout` if no line can be ordered,
    /// `OrderError::AddressNotFound` if the address isn't the customer's
    /// active address, `OrderError::Payment` if the gateway call fails.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        source: OrderSource,
        address_id: AddressId,
    ) -> Result<PlacedOrder, OrderError> {
        let selection = match source {
            OrderSource::BuyNow(size_id) => {
                let candidate = SizeRepository::new(self.pool)
                    .candidate(size_id, BUY_NOW_QUANTITY)
                    .await?;
                CheckoutSelection::buy_now(candidate.as_ref())?
            }
            OrderSource::Cart => {
                let candidates = CartRepository::new(self.pool, self.media_base_url)
                    .candidates(customer_id)
                    .await?;
                CheckoutSelection::from_cart(&candidates)?
            }
        };
        if !selection.dropped().is_empty() {
            tracing::info!(dropped = ?selection.dropped(), "Dropping unavailable cart lines");
        }

        let totals = selection.totals(self.tax_rate_percent);
        let amount = totals
            .total_minor_units()
            .ok_or(OrderError::AmountOutOfRange)?;

        let address = AddressRepository::new(self.pool)
            .get_active(customer_id, address_id)
            .await?
            .ok_or(OrderError::AddressNotFound)?;
        let snapshot = AddressSnapshot::from(&address);

        let receipt = Uuid::new_v4().to_string();
        let gateway_order = self
            .gateway
            .create_order(amount, CURRENCY, &receipt)
            .await?;

        let order = OrderRepository::new(self.pool)
            .create(&NewOrder {
                customer_id,
                is_buy_now: source.is_buy_now(),
                address: &snapshot,
                totals,
                currency: CURRENCY,
                lines: selection.lines(),
                gateway_order_id: &gateway_order.id,
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            gateway_order_id = %order.gateway_order_id,
            amount,
            buy_now = order.is_buy_now,
            "Order created"
        );
        Ok(PlacedOrder {
            order,
            amount,
            message: selection.message(),
        })
    }

    /// Settle a paid order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Payment` for bad identifiers or signature,
    /// `OrderError::NotPending` if no pending order of the customer matches,
    /// `OrderError::StockChanged` if a SKU ran out; the order is then
    /// flagged `refund_required`.
    #[tracing::instrument(skip(self, signature))]
    pub async fn verify_payment(
        &self,
        customer_id: CustomerId,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, OrderError> {
        self.gateway
            .verify_signature(gateway_order_id, payment_id, signature)?;

        let orders = OrderRepository::new(self.pool);
        match orders
            .settle(customer_id, gateway_order_id, payment_id, signature)
            .await?
        {
            Settlement::Completed(order) => {
                tracing::info!(order_id = %order.id, payment_id, "Order paid");
                Ok(order)
            }
            Settlement::NotPending => Err(OrderError::NotPending),
            Settlement::StockChanged { order_id, size_id } => {
                let flagged = orders
                    .mark_refund_required(order_id, payment_id, signature)
                    .await?;
                tracing::error!(
                    %order_id,
                    %size_id,
                    payment_id,
                    flagged,
                    "Stock changed after payment, order needs a refund"
                );
                sentry::capture_message(
                    &format!("Order {order_id} paid but size {size_id} is out of stock"),
                    sentry::Level::Error,
                );
                Err(OrderError::StockChanged)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_source_buy_now_flag() {
        assert!(OrderSource::BuyNow(SizeId::new(1)).is_buy_now());
        assert!(!OrderSource::Cart.is_buy_now());
    }

    #[test]
    fn test_error_messages_match_api_contract() {
        assert_eq!(
            OrderError::StockChanged.to_string(),
            "Stock changed after payment, please contact support"
        );
        assert_eq!(
            OrderError::Checkout(CheckoutError::OutOfStock).to_string(),
            "Product is out of stock"
        );
        assert_eq!(OrderError::AddressNotFound.to_string(), "Address not found");
    }
}
