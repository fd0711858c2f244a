//! Reporting aggregates over completed orders.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use vastra_core::ProductId;

use super::RepositoryError;
use crate::models::{DailySales, SalesSummary, TopProduct};

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    total_orders: i64,
    completed_orders: i64,
    pending_orders: i64,
    refund_required_orders: i64,
    revenue: Decimal,
    customers: i64,
    active_products: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct TopProductRow {
    product_id: i32,
    name: String,
    units_sold: i64,
    revenue: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct DailySalesRow {
    day: NaiveDate,
    orders: i64,
    revenue: Decimal,
}

/// Repository for back-office reports.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store-wide order counts and revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self) -> Result<SalesSummary, RepositoryError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT
                 COUNT(*) AS total_orders,
                 COUNT(*) FILTER (WHERE payment_status = 'completed') AS completed_orders,
                 COUNT(*) FILTER (WHERE payment_status = 'pending') AS pending_orders,
                 COUNT(*) FILTER (WHERE payment_status = 'refund_required')
                     AS refund_required_orders,
                 COALESCE(SUM(total_amount) FILTER (WHERE payment_status = 'completed'), 0)
                     AS revenue,
                 (SELECT COUNT(*) FROM shop.customer WHERE lifecycle <> 'deleted') AS customers,
                 (SELECT COUNT(*) FROM catalog.product WHERE lifecycle = 'active')
                     AS active_products
             FROM shop.customer_order",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(SalesSummary {
            total_orders: row.total_orders,
            completed_orders: row.completed_orders,
            pending_orders: row.pending_orders,
            refund_required_orders: row.refund_required_orders,
            revenue: row.revenue,
            customers: row.customers,
            active_products: row.active_products,
        })
    }

    /// Best-selling products by units in completed orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProductRow>(
            "SELECT p.id AS product_id, p.name,
                    SUM(ol.quantity)::bigint AS units_sold,
                    SUM(ol.unit_price * ol.quantity) AS revenue
             FROM shop.order_line ol
             JOIN shop.customer_order o ON o.id = ol.order_id
             JOIN catalog.product_size s ON s.id = ol.size_id
             JOIN catalog.product_colour pc ON pc.id = s.colour_id
             JOIN catalog.product p ON p.id = pc.product_id
             WHERE o.payment_status = 'completed'
             GROUP BY p.id, p.name
             ORDER BY units_sold DESC, p.id
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TopProduct {
                product_id: ProductId::new(r.product_id),
                name: r.name,
                units_sold: r.units_sold,
                revenue: r.revenue,
            })
            .collect())
    }

    /// Completed orders and revenue per day over the last `days` days,
    /// including days without sales.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(&self, days: i32) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySalesRow>(
            "SELECT d.day::date AS day,
                    COUNT(o.id) AS orders,
                    COALESCE(SUM(o.total_amount), 0) AS revenue
             FROM generate_series(
                      (now() AT TIME ZONE 'UTC')::date - ($1 - 1),
                      (now() AT TIME ZONE 'UTC')::date,
                      interval '1 day'
                  ) AS d(day)
             LEFT JOIN shop.customer_order o
                    ON (o.created_at AT TIME ZONE 'UTC')::date = d.day::date
                   AND o.payment_status = 'completed'
             GROUP BY d.day
             ORDER BY d.day",
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DailySales {
                day: r.day,
                orders: r.orders,
                revenue: r.revenue,
            })
            .collect())
    }
}
