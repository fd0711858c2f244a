//! Cart and wishlist repositories.
//!
//! Both projections hide lines whose SKU, colour, product or category is
//! not active, and show one default image per colour.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use vastra_core::{ColourId, CustomerId, LineCandidate, ProductId, SizeId, StockLevel};

use super::RepositoryError;
use super::sizes::{CANDIDATE_COLUMNS, CANDIDATE_JOINS, CandidateRow};
use crate::models::{CartLine, CartView, WishlistLine, media_url};

/// Projection columns shared by cart and wishlist reads.
const LINE_COLUMNS: &str = "s.id AS size_id, p.id AS product_id, p.name AS product_name,
    pc.id AS colour_id, pc.colour, s.size, p.price, s.quantity AS stock_quantity, s.sold,
    (SELECT i.path FROM catalog.product_image i
     WHERE i.colour_id = pc.id
     ORDER BY i.is_default DESC, i.position, i.id
     LIMIT 1) AS image_path";

/// Visibility filter over the `s`, `pc`, `p`, `c` aliases.
const VISIBLE_CHAIN: &str = "s.lifecycle = 'active' AND pc.lifecycle = 'active'
    AND p.lifecycle = 'active' AND c.lifecycle = 'active'";

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    size_id: i32,
    product_id: i32,
    product_name: String,
    colour_id: i32,
    colour: String,
    size: String,
    price: Decimal,
    stock_quantity: i32,
    sold: i32,
    image_path: Option<String>,
}

impl LineRow {
    fn available(&self) -> Result<u32, RepositoryError> {
        StockLevel::new(self.stock_quantity, self.sold)
            .map(|s| s.available())
            .map_err(|e| RepositoryError::DataCorruption(format!("size {}: {e}", self.size_id)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    #[sqlx(flatten)]
    line: LineRow,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct WishlistLineRow {
    #[sqlx(flatten)]
    line: LineRow,
    added_at: DateTime<Utc>,
}

// =============================================================================
// Cart
// =============================================================================

/// Repository for customer carts.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
    media_base_url: &'a str,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, media_base_url: &'a str) -> Self {
        Self {
            pool,
            media_base_url,
        }
    }

    /// The customer's visible cart lines with stock and a subtotal.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, customer_id: CustomerId) -> Result<CartView, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(&format!(
            "SELECT {LINE_COLUMNS}, ci.quantity
             FROM shop.cart_item ci
             JOIN catalog.product_size s ON s.id = ci.size_id
             {CANDIDATE_JOINS}
             WHERE ci.customer_id = $1 AND {VISIBLE_CHAIN}
             ORDER BY ci.added_at, ci.size_id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| -> Result<CartLine, RepositoryError> {
                let available = row.line.available()?;
                let quantity = u32::try_from(row.quantity).map_err(|_| {
                    RepositoryError::DataCorruption(format!(
                        "negative cart quantity for size {}",
                        row.line.size_id
                    ))
                })?;
                let line = row.line;
                Ok(CartLine {
                    product_size_id: SizeId::new(line.size_id),
                    product_id: ProductId::new(line.product_id),
                    product_name: line.product_name,
                    colour_id: ColourId::new(line.colour_id),
                    colour: line.colour,
                    size: line.size,
                    unit_price: line.price,
                    quantity,
                    available,
                    line_total: line.price * Decimal::from(quantity),
                    image_url: line
                        .image_path
                        .as_deref()
                        .map(|p| media_url(self.media_base_url, p)),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CartView::new(lines))
    }

    /// Every cart line of the customer as a checkout candidate, hidden or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn candidates(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<LineCandidate>, RepositoryError> {
        let rows = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS}, ci.quantity AS requested
             FROM shop.cart_item ci
             JOIN catalog.product_size s ON s.id = ci.size_id
             {CANDIDATE_JOINS}
             WHERE ci.customer_id = $1
             ORDER BY s.id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(LineCandidate::try_from).collect()
    }

    /// Add units of a SKU, merging with an existing line. Returns the line's
    /// new quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU doesn't exist.
    pub async fn add(
        &self,
        customer_id: CustomerId,
        size_id: SizeId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let (quantity,): (i32,) = sqlx::query_as(
            "INSERT INTO shop.cart_item (customer_id, size_id, quantity)
             VALUES ($1, $2, $3)
             ON CONFLICT (customer_id, size_id)
             DO UPDATE SET quantity = shop.cart_item.quantity + EXCLUDED.quantity
             RETURNING quantity",
        )
        .bind(customer_id)
        .bind(size_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "invalid cart line"))?;

        Ok(quantity)
    }

    /// Set a line's quantity; zero or less removes it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in the cart.
    pub async fn set_quantity(
        &self,
        customer_id: CustomerId,
        size_id: SizeId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity <= 0 {
            return self.remove(customer_id, size_id).await;
        }

        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3
             WHERE customer_id = $1 AND size_id = $2",
        )
        .bind(customer_id)
        .bind(size_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line isn't in the cart.
    pub async fn remove(
        &self,
        customer_id: CustomerId,
        size_id: SizeId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.cart_item WHERE customer_id = $1 AND size_id = $2")
                .bind(customer_id)
                .bind(size_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// =============================================================================
// Wishlist
// =============================================================================

/// Repository for customer wishlists.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
    media_base_url: &'a str,
}

impl<'a> WishlistRepository<'a> {
    /// Create a new wishlist repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool, media_base_url: &'a str) -> Self {
        Self {
            pool,
            media_base_url,
        }
    }

    /// The customer's visible wishlist lines, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn view(&self, customer_id: CustomerId) -> Result<Vec<WishlistLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, WishlistLineRow>(&format!(
            "SELECT {LINE_COLUMNS}, wi.added_at
             FROM shop.wishlist_item wi
             JOIN catalog.product_size s ON s.id = wi.size_id
             {CANDIDATE_JOINS}
             WHERE wi.customer_id = $1 AND {VISIBLE_CHAIN}
             ORDER BY wi.added_at DESC, wi.size_id"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<WishlistLine, RepositoryError> {
                let available = row.line.available()?;
                let line = row.line;
                Ok(WishlistLine {
                    product_size_id: SizeId::new(line.size_id),
                    product_id: ProductId::new(line.product_id),
                    product_name: line.product_name,
                    colour_id: ColourId::new(line.colour_id),
                    colour: line.colour,
                    size: line.size,
                    price: line.price,
                    available,
                    image_url: line
                        .image_path
                        .as_deref()
                        .map(|p| media_url(self.media_base_url, p)),
                    added_at: row.added_at,
                })
            })
            .collect()
    }

    /// Add a SKU. Adding one already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the SKU doesn't exist.
    pub async fn add(&self, customer_id: CustomerId, size_id: SizeId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop.wishlist_item (customer_id, size_id)
             VALUES ($1, $2)
             ON CONFLICT (customer_id, size_id) DO NOTHING",
        )
        .bind(customer_id)
        .bind(size_id)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "invalid wishlist line"))?;

        Ok(())
    }

    /// Remove a SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU isn't in the wishlist.
    pub async fn remove(
        &self,
        customer_id: CustomerId,
        size_id: SizeId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM shop.wishlist_item WHERE customer_id = $1 AND size_id = $2")
                .bind(customer_id)
                .bind(size_id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
