//! SKU (product size) repository.
//!
//! Stock counters are only changed here and in order settlement. `sold`
//! is never written by admin edits; restocking raises `quantity`, which
//! may not drop below `sold`.

use rust_decimal::Decimal;
use sqlx::PgPool;

use vastra_core::{ColourId, Lifecycle, LineCandidate, SizeId, StockLevel};

use super::RepositoryError;
use super::products::SizeRow;
use crate::models::Size;

/// SKU joined with its colour and product, for stock and visibility checks.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct CandidateRow {
    pub(super) size_id: i32,
    pub(super) requested: i32,
    pub(super) price: Decimal,
    pub(super) quantity: i32,
    pub(super) sold: i32,
    pub(super) size_lifecycle: Lifecycle,
    pub(super) colour_lifecycle: Lifecycle,
    pub(super) product_lifecycle: Lifecycle,
    pub(super) category_lifecycle: Lifecycle,
}

impl TryFrom<CandidateRow> for LineCandidate {
    type Error = RepositoryError;

    fn try_from(row: CandidateRow) -> Result<Self, Self::Error> {
        let stock = StockLevel::new(row.quantity, row.sold)
            .map_err(|e| RepositoryError::DataCorruption(format!("size {}: {e}", row.size_id)))?;
        let requested = u32::try_from(row.requested).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative quantity for size {}", row.size_id))
        })?;
        Ok(Self {
            size_id: SizeId::new(row.size_id),
            requested,
            unit_price: row.price,
            stock,
            visible: Lifecycle::chain_visible(&[
                row.size_lifecycle,
                row.colour_lifecycle,
                row.product_lifecycle,
                row.category_lifecycle,
            ]),
        })
    }
}

/// Columns of [`CandidateRow`] given `s`, `pc`, `p`, `c` aliases. The
/// caller supplies the `requested` column.
pub(super) const CANDIDATE_COLUMNS: &str = "s.id AS size_id, p.price, s.quantity, s.sold,
    s.lifecycle AS size_lifecycle, pc.lifecycle AS colour_lifecycle,
    p.lifecycle AS product_lifecycle, c.lifecycle AS category_lifecycle";

/// Joins from `catalog.product_size s` up to its category.
pub(super) const CANDIDATE_JOINS: &str = "JOIN catalog.product_colour pc ON pc.id = s.colour_id
    JOIN catalog.product p ON p.id = pc.product_id
    JOIN catalog.category c ON c.id = p.category_id";

/// Repository for SKUs.
pub struct SizeRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SizeRepository<'a> {
    /// Create a new size repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a non-deleted SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU doesn't exist or is deleted.
    pub async fn get(&self, id: SizeId) -> Result<Size, RepositoryError> {
        let row = sqlx::query_as::<_, SizeRow>(
            "SELECT id, colour_id, size, quantity, sold, lifecycle
             FROM catalog.product_size
             WHERE id = $1 AND lifecycle <> 'deleted'",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Size::try_from(row)
    }

    /// A SKU joined with its ownership chain, as a checkout candidate for
    /// `requested` units. `None` if the SKU doesn't exist or is deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn candidate(
        &self,
        id: SizeId,
        requested: u32,
    ) -> Result<Option<LineCandidate>, RepositoryError> {
        let requested = i32::try_from(requested)
            .map_err(|_| RepositoryError::Conflict("quantity out of range".to_owned()))?;
        let row = sqlx::query_as::<_, CandidateRow>(&format!(
            "SELECT {CANDIDATE_COLUMNS}, $2::integer AS requested
             FROM catalog.product_size s
             {CANDIDATE_JOINS}
             WHERE s.id = $1 AND s.lifecycle <> 'deleted'"
        ))
        .bind(id)
        .bind(requested)
        .fetch_optional(self.pool)
        .await?;

        row.map(LineCandidate::try_from).transpose()
    }

    /// Add a SKU to a non-deleted colour.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the colour doesn't exist or is
    /// deleted, `RepositoryError::Conflict` for a negative quantity.
    pub async fn create(
        &self,
        colour_id: ColourId,
        size: &str,
        quantity: i32,
    ) -> Result<Size, RepositoryError> {
        let stock = StockLevel::received(quantity)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        let row = sqlx::query_as::<_, SizeRow>(
            "INSERT INTO catalog.product_size (colour_id, size, quantity)
             SELECT $1, $2, $3
             WHERE EXISTS (
                 SELECT 1 FROM catalog.product_colour WHERE id = $1 AND lifecycle <> 'deleted'
             )
             RETURNING id, colour_id, size, quantity, sold, lifecycle",
        )
        .bind(colour_id)
        .bind(size)
        .bind(stock.quantity())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Size::try_from(row)
    }

    /// Relabel, restock or (de)activate a SKU. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU doesn't exist or is
    /// deleted, `RepositoryError::Conflict` if `quantity` would drop below
    /// the units already sold.
    pub async fn update(
        &self,
        id: SizeId,
        size: Option<&str>,
        quantity: Option<i32>,
        active: Option<bool>,
    ) -> Result<Size, RepositoryError> {
        // The quantity guard is re-checked in the UPDATE itself so a
        // concurrent settlement can't slip between check and write.
        let row = sqlx::query_as::<_, SizeRow>(
            "UPDATE catalog.product_size SET
                 size = COALESCE($2, size),
                 quantity = COALESCE($3, quantity),
                 lifecycle = CASE
                     WHEN $4::boolean IS NULL THEN lifecycle
                     WHEN $4 THEN 'active'::lifecycle
                     ELSE 'inactive'::lifecycle
                 END,
                 updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'
               AND ($3::integer IS NULL OR $3 >= sold)
             RETURNING id, colour_id, size, quantity, sold, lifecycle",
        )
        .bind(id)
        .bind(size)
        .bind(quantity)
        .bind(active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "quantity is below units sold"))?;

        if let Some(row) = row {
            return Size::try_from(row);
        }

        // Distinguish a missing SKU from a rejected restock.
        let current = self.get(id).await?;
        if let Some(quantity) = quantity {
            let stock = StockLevel::new(current.quantity, current.sold)
                .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
            stock
                .restock(quantity)
                .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        }
        Err(RepositoryError::Conflict(
            "quantity is below units sold".to_owned(),
        ))
    }

    /// Soft-delete a SKU.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the SKU doesn't exist or is
    /// already deleted.
    pub async fn soft_delete(&self, id: SizeId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE catalog.product_size SET lifecycle = 'deleted', updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'",
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(lifecycles: [Lifecycle; 4]) -> CandidateRow {
        CandidateRow {
            size_id: 9,
            requested: 2,
            price: Decimal::from(799),
            quantity: 5,
            sold: 1,
            size_lifecycle: lifecycles[0],
            colour_lifecycle: lifecycles[1],
            product_lifecycle: lifecycles[2],
            category_lifecycle: lifecycles[3],
        }
    }

    #[test]
    fn test_candidate_visible_only_when_chain_active() {
        let active = LineCandidate::try_from(row([Lifecycle::Active; 4])).unwrap();
        assert!(active.visible);
        assert_eq!(active.stock.available(), 4);
        assert_eq!(active.requested, 2);

        let hidden = LineCandidate::try_from(row([
            Lifecycle::Active,
            Lifecycle::Inactive,
            Lifecycle::Active,
            Lifecycle::Active,
        ]))
        .unwrap();
        assert!(!hidden.visible);
    }

    #[test]
    fn test_candidate_rejects_corrupt_counters() {
        let mut bad = row([Lifecycle::Active; 4]);
        bad.sold = 6;
        assert!(matches!(
            LineCandidate::try_from(bad),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
