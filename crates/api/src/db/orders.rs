//! Order repository: placement, settlement and history.
//!
//! # Settlement
//!
//! Settling an order is one transaction:
//!
//! 1. Flip the order from `pending` to `completed` with a conditional
//!    `UPDATE ... WHERE payment_status = 'pending' RETURNING`. A replayed or
//!    concurrent verification of the same order finds nothing pending.
//! 2. For each line in ascending SKU id order, consume stock with
//!    `sold = sold + q WHERE sold + q <= quantity`. Taking row locks in a
//!    fixed order keeps concurrent settlements from deadlocking.
//! 3. If any SKU update touches no row, the transaction is rolled back and
//!    the caller marks the order `refund_required` separately.
//!
//! `sold <= quantity` is also a CHECK constraint on `catalog.product_size`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use vastra_core::{
    CheckoutLine, CustomerId, OrderId, OrderTotals, PaymentStatus, ProductId, SizeId,
};

use super::{Page, Pagination, RepositoryError};
use crate::models::{AddressSnapshot, Order, OrderDetail, OrderLine};

const ORDER_COLUMNS: &str = "id, customer_id, is_buy_now, address, taxable_amount, tax_amount,
    round_off_amount, total_amount, currency, gateway_order_id, gateway_payment_id,
    payment_status, created_at, updated_at";

/// An order ready to be persisted as `pending`.
#[derive(Debug)]
pub struct NewOrder<'o> {
    pub customer_id: CustomerId,
    pub is_buy_now: bool,
    pub address: &'o AddressSnapshot,
    pub totals: OrderTotals,
    pub currency: &'o str,
    pub lines: &'o [CheckoutLine],
    pub gateway_order_id: &'o str,
}

/// Outcome of a settlement attempt.
#[derive(Debug)]
pub enum Settlement {
    /// Stock consumed and the order completed.
    Completed(Order),
    /// No pending order matched (unknown, someone else's, or already settled).
    NotPending,
    /// A SKU no longer had enough stock. Nothing was changed.
    StockChanged { order_id: OrderId, size_id: SizeId },
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    customer_id: i32,
    is_buy_now: bool,
    address: Json<AddressSnapshot>,
    taxable_amount: Decimal,
    tax_amount: Decimal,
    round_off_amount: Decimal,
    total_amount: Decimal,
    currency: String,
    gateway_order_id: String,
    gateway_payment_id: Option<String>,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            is_buy_now: row.is_buy_now,
            address: row.address.0,
            totals: OrderTotals {
                taxable_amount: row.taxable_amount,
                tax_amount: row.tax_amount,
                round_off_amount: row.round_off_amount,
                total_amount: row.total_amount,
            },
            currency: row.currency,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            payment_status: row.payment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    size_id: i32,
    product_id: i32,
    product_name: String,
    colour: String,
    size: String,
    unit_price: Decimal,
    quantity: i32,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative order quantity for size {}", row.size_id))
        })?;
        Ok(Self {
            product_size_id: SizeId::new(row.size_id),
            product_id: ProductId::new(row.product_id),
            product_name: row.product_name,
            colour: row.colour,
            size: row.size,
            unit_price: row.unit_price,
            quantity,
            line_total: row.unit_price * Decimal::from(quantity),
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a pending order and its line snapshot in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the gateway order id is reused
    /// or a line quantity is out of range.
    #[tracing::instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    pub async fn create(&self, order: &NewOrder<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO shop.customer_order
                 (customer_id, is_buy_now, address, taxable_amount, tax_amount,
                  round_off_amount, total_amount, currency, gateway_order_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.customer_id)
        .bind(order.is_buy_now)
        .bind(Json(order.address))
        .bind(order.totals.taxable_amount)
        .bind(order.totals.tax_amount)
        .bind(order.totals.round_off_amount)
        .bind(order.totals.total_amount)
        .bind(order.currency)
        .bind(order.gateway_order_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "gateway order id already used"))?;

        for line in order.lines {
            let quantity = i32::try_from(line.quantity)
                .map_err(|_| RepositoryError::Conflict("quantity out of range".to_owned()))?;
            sqlx::query(
                "INSERT INTO shop.order_line (order_id, size_id, unit_price, quantity)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(line.size_id)
            .bind(line.unit_price)
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "invalid order line"))?;
        }

        tx.commit().await?;
        Ok(row.into())
    }

    /// Settle the customer's pending order for `gateway_order_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; the transaction
    /// is rolled back.
    #[tracing::instrument(skip(self, signature))]
    pub async fn settle(
        &self,
        customer_id: CustomerId,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Settlement, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let flipped = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE shop.customer_order SET
                 payment_status = 'completed',
                 gateway_payment_id = $3,
                 gateway_signature = $4,
                 updated_at = now()
             WHERE gateway_order_id = $1 AND customer_id = $2 AND payment_status = 'pending'
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(gateway_order_id)
        .bind(customer_id)
        .bind(payment_id)
        .bind(signature)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = flipped else {
            tx.rollback().await?;
            return Ok(Settlement::NotPending);
        };

        let lines: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT size_id, quantity FROM shop.order_line
             WHERE order_id = $1
             ORDER BY size_id",
        )
        .bind(row.id)
        .fetch_all(&mut *tx)
        .await?;

        for (size_id, quantity) in lines {
            let consumed = sqlx::query(
                "UPDATE catalog.product_size SET sold = sold + $2, updated_at = now()
                 WHERE id = $1 AND sold + $2 <= quantity",
            )
            .bind(size_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if consumed.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(Settlement::StockChanged {
                    order_id: OrderId::new(row.id),
                    size_id: SizeId::new(size_id),
                });
            }
        }

        if !row.is_buy_now {
            sqlx::query("DELETE FROM shop.cart_item WHERE customer_id = $1")
                .bind(customer_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Settlement::Completed(row.into()))
    }

    /// Move a pending order to `refund_required`, storing the payment that
    /// was captured for it. Returns `false` if the order was no longer pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[tracing::instrument(skip(self, signature))]
    pub async fn mark_refund_required(
        &self,
        id: OrderId,
        payment_id: &str,
        signature: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.customer_order SET
                 payment_status = 'refund_required',
                 gateway_payment_id = $2,
                 gateway_signature = $3,
                 updated_at = now()
             WHERE id = $1 AND payment_status = 'pending'",
        )
        .bind(id)
        .bind(payment_id)
        .bind(signature)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_customer(
        &self,
        customer_id: CustomerId,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order
             WHERE customer_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(customer_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM shop.customer_order WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(self.pool)
                .await?;

        Ok(Page::new(
            rows.into_iter().map(Order::from).collect(),
            pagination,
            total,
        ))
    }

    /// One of the customer's orders with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order isn't the customer's.
    pub async fn get_for_customer(
        &self,
        customer_id: CustomerId,
        id: OrderId,
    ) -> Result<OrderDetail, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1 AND customer_id = $2"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_lines(row).await
    }

    /// All orders for the admin panel, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<PaymentStatus>,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order
             WHERE ($1::payment_status IS NULL OR payment_status = $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM shop.customer_order
             WHERE ($1::payment_status IS NULL OR payment_status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(Order::from).collect(),
            pagination,
            total,
        ))
    }

    /// Any order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order doesn't exist.
    pub async fn get(&self, id: OrderId) -> Result<OrderDetail, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_lines(row).await
    }

    async fn with_lines(&self, row: OrderRow) -> Result<OrderDetail, RepositoryError> {
        let lines = sqlx::query_as::<_, OrderLineRow>(
            "SELECT ol.size_id, p.id AS product_id, p.name AS product_name, pc.colour, s.size,
                    ol.unit_price, ol.quantity
             FROM shop.order_line ol
             JOIN catalog.product_size s ON s.id = ol.size_id
             JOIN catalog.product_colour pc ON pc.id = s.colour_id
             JOIN catalog.product p ON p.id = pc.product_id
             WHERE ol.order_id = $1
             ORDER BY ol.size_id",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(OrderLine::try_from)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderDetail {
            order: row.into(),
            lines,
        })
    }
}
