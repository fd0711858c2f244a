//! Product, colour variant and image repository.
//!
//! Storefront reads see only `active` rows whose whole ownership chain is
//! active; admin reads see everything not deleted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use vastra_core::{
    CategoryId, ColourId, ImageId, Lifecycle, ProductId, SizeId, StockLevel,
};

use super::{Page, Pagination, RepositoryError};
use crate::models::{ColourDetail, Image, ProductDetail, ProductSummary, Size, media_url};

/// Which rows a read path may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Storefront: active rows only.
    Storefront,
    /// Admin panel: everything not deleted.
    Admin,
}

impl Visibility {
    /// SQL predicate over a table alias's `lifecycle` column.
    fn predicate(self, alias: &str) -> String {
        match self {
            Self::Storefront => format!("{alias}.lifecycle = 'active'"),
            Self::Admin => format!("{alias}.lifecycle <> 'deleted'"),
        }
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of name or description.
    pub query: Option<String>,
}

/// Fields of a product update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub active: Option<bool>,
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    category_id: i32,
    category_name: String,
    name: String,
    description: String,
    price: Decimal,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
    image_path: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ColourRow {
    id: i32,
    product_id: i32,
    colour: String,
    lifecycle: Lifecycle,
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    colour_id: i32,
    path: String,
    is_default: bool,
    position: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct SizeRow {
    pub(super) id: i32,
    pub(super) colour_id: i32,
    pub(super) size: String,
    pub(super) quantity: i32,
    pub(super) sold: i32,
    pub(super) lifecycle: Lifecycle,
}

impl TryFrom<SizeRow> for Size {
    type Error = RepositoryError;

    fn try_from(row: SizeRow) -> Result<Self, Self::Error> {
        let stock = StockLevel::new(row.quantity, row.sold)
            .map_err(|e| RepositoryError::DataCorruption(format!("size {}: {e}", row.id)))?;
        Ok(Self::new(
            SizeId::new(row.id),
            ColourId::new(row.colour_id),
            row.size,
            stock,
            row.lifecycle,
        ))
    }
}

/// Subquery selecting one default image path of a product: the first
/// colour's `is_default` image, else its lowest position.
fn image_subquery(visibility: Visibility) -> String {
    format!(
        "(SELECT i.path
          FROM catalog.product_colour pc
          JOIN catalog.product_image i ON i.colour_id = pc.id
          WHERE pc.product_id = p.id AND {}
          ORDER BY pc.id, i.is_default DESC, i.position, i.id
          LIMIT 1) AS image_path",
        visibility.predicate("pc")
    )
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for products, colour variants and images.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
    media_base_url: &'a str,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository. Image URLs are built under
    /// `media_base_url`.
    #[must_use]
    pub const fn new(pool: &'a PgPool, media_base_url: &'a str) -> Self {
        Self {
            pool,
            media_base_url,
        }
    }

    fn summary(&self, row: ProductRow) -> ProductSummary {
        ProductSummary {
            id: ProductId::new(row.id),
            category_id: CategoryId::new(row.category_id),
            category_name: row.category_name,
            name: row.name,
            description: row.description,
            price: row.price,
            lifecycle: row.lifecycle,
            image_url: row
                .image_path
                .as_deref()
                .map(|p| media_url(self.media_base_url, p)),
            created_at: row.created_at,
        }
    }

    fn image(&self, row: ImageRow) -> Image {
        Image {
            id: ImageId::new(row.id),
            colour_id: ColourId::new(row.colour_id),
            url: media_url(self.media_base_url, &row.path),
            path: row.path,
            is_default: row.is_default,
            position: row.position,
        }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        visibility: Visibility,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<ProductSummary>, RepositoryError> {
        let pattern = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let mut conditions = vec![visibility.predicate("p"), visibility.predicate("c")];
        conditions.push("($1::integer IS NULL OR p.category_id = $1)".to_string());
        conditions.push(
            "($2::text IS NULL OR p.name ILIKE $2 OR p.description ILIKE $2)".to_string(),
        );
        let where_clause = conditions.join(" AND ");

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT p.id, p.category_id, c.name AS category_name, p.name, p.description,
                    p.price, p.lifecycle, p.created_at, {}
             FROM catalog.product p
             JOIN catalog.category c ON c.id = p.category_id
             WHERE {where_clause}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT $3 OFFSET $4",
            image_subquery(visibility)
        ))
        .bind(filter.category_id)
        .bind(pattern.as_deref())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*)
             FROM catalog.product p
             JOIN catalog.category c ON c.id = p.category_id
             WHERE {where_clause}"
        ))
        .bind(filter.category_id)
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let items = rows.into_iter().map(|r| self.summary(r)).collect();
        Ok(Page::new(items, pagination, total))
    }

    /// Get one product with its colours, images and sizes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product isn't visible.
    #[tracing::instrument(skip(self))]
    pub async fn get_detail(
        &self,
        visibility: Visibility,
        id: ProductId,
    ) -> Result<ProductDetail, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT p.id, p.category_id, c.name AS category_name, p.name, p.description,
                    p.price, p.lifecycle, p.created_at, {}
             FROM catalog.product p
             JOIN catalog.category c ON c.id = p.category_id
             WHERE p.id = $1 AND {} AND {}",
            image_subquery(visibility),
            visibility.predicate("p"),
            visibility.predicate("c"),
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let colours = sqlx::query_as::<_, ColourRow>(&format!(
            "SELECT pc.id, pc.product_id, pc.colour, pc.lifecycle
             FROM catalog.product_colour pc
             WHERE pc.product_id = $1 AND {}
             ORDER BY pc.id",
            visibility.predicate("pc")
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT i.id, i.colour_id, i.path, i.is_default, i.position
             FROM catalog.product_image i
             JOIN catalog.product_colour pc ON pc.id = i.colour_id
             WHERE pc.product_id = $1
             ORDER BY i.colour_id, i.is_default DESC, i.position, i.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let sizes = sqlx::query_as::<_, SizeRow>(&format!(
            "SELECT s.id, s.colour_id, s.size, s.quantity, s.sold, s.lifecycle
             FROM catalog.product_size s
             JOIN catalog.product_colour pc ON pc.id = s.colour_id
             WHERE pc.product_id = $1 AND {}
             ORDER BY s.id",
            visibility.predicate("s")
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let mut images_by_colour: HashMap<i32, Vec<Image>> = HashMap::new();
        for image in images {
            images_by_colour
                .entry(image.colour_id)
                .or_default()
                .push(self.image(image));
        }

        let mut sizes_by_colour: HashMap<i32, Vec<Size>> = HashMap::new();
        for size in sizes {
            let colour_id = size.colour_id;
            sizes_by_colour
                .entry(colour_id)
                .or_default()
                .push(Size::try_from(size)?);
        }

        let colours = colours
            .into_iter()
            .map(|c| ColourDetail {
                id: ColourId::new(c.id),
                product_id: ProductId::new(c.product_id),
                colour: c.colour,
                lifecycle: c.lifecycle,
                images: images_by_colour.remove(&c.id).unwrap_or_default(),
                sizes: sizes_by_colour.remove(&c.id).unwrap_or_default(),
            })
            .collect();

        Ok(ProductDetail {
            product: self.summary(row),
            colours,
        })
    }

    /// Create a product in a non-deleted category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist or is deleted.
    #[tracing::instrument(skip(self, description))]
    pub async fn create(
        &self,
        category_id: CategoryId,
        name: &str,
        description: &str,
        price: Decimal,
    ) -> Result<ProductDetail, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO catalog.product (category_id, name, description, price)
             SELECT $1, $2, $3, $4
             WHERE EXISTS (
                 SELECT 1 FROM catalog.category WHERE id = $1 AND lifecycle <> 'deleted'
             )
             RETURNING id",
        )
        .bind(category_id)
        .bind(name)
        .bind(description)
        .bind(price)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "invalid product"))?
        .ok_or(RepositoryError::NotFound)?;

        self.get_detail(Visibility::Admin, ProductId::new(id)).await
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product (or a newly chosen
    /// category) doesn't exist or is deleted.
    #[tracing::instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: ProductId,
        changes: &ProductChanges,
    ) -> Result<ProductDetail, RepositoryError> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE catalog.product SET
                 category_id = COALESCE($2, category_id),
                 name = COALESCE($3, name),
                 description = COALESCE($4, description),
                 price = COALESCE($5, price),
                 lifecycle = CASE
                     WHEN $6::boolean IS NULL THEN lifecycle
                     WHEN $6 THEN 'active'::lifecycle
                     ELSE 'inactive'::lifecycle
                 END,
                 updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'
               AND ($2::integer IS NULL OR EXISTS (
                   SELECT 1 FROM catalog.category WHERE id = $2 AND lifecycle <> 'deleted'
               ))
             RETURNING id",
        )
        .bind(id)
        .bind(changes.category_id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.price)
        .bind(changes.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "invalid product"))?;

        updated.ok_or(RepositoryError::NotFound)?;
        self.get_detail(Visibility::Admin, id).await
    }

    /// Soft-delete a product. Its colours and sizes disappear from every
    /// read path with it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist or is
    /// already deleted.
    pub async fn soft_delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE catalog.product SET lifecycle = 'deleted', updated_at = now()
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

    // =========================================================================
    // Colours
    // =========================================================================

    /// Add a colour variant to a non-deleted product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist or is deleted.
    pub async fn create_colour(
        &self,
        product_id: ProductId,
        colour: &str,
    ) -> Result<ColourDetail, RepositoryError> {
        let row = sqlx::query_as::<_, ColourRow>(
            "INSERT INTO catalog.product_colour (product_id, colour)
             SELECT $1, $2
             WHERE EXISTS (
                 SELECT 1 FROM catalog.product WHERE id = $1 AND lifecycle <> 'deleted'
             )
             RETURNING id, product_id, colour, lifecycle",
        )
        .bind(product_id)
        .bind(colour)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(ColourDetail {
            id: ColourId::new(row.id),
            product_id: ProductId::new(row.product_id),
            colour: row.colour,
            lifecycle: row.lifecycle,
            images: Vec::new(),
            sizes: Vec::new(),
        })
    }

    /// Product owning a non-deleted colour.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the colour doesn't exist or is deleted.
    pub async fn colour_product(&self, colour_id: ColourId) -> Result<ProductId, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT product_id FROM catalog.product_colour
             WHERE id = $1 AND lifecycle <> 'deleted'",
        )
        .bind(colour_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(id,)| ProductId::new(id))
            .ok_or(RepositoryError::NotFound)
    }

    /// Rename or (de)activate a colour. Returns the owning product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the colour doesn't exist or is deleted.
    pub async fn update_colour(
        &self,
        id: ColourId,
        colour: Option<&str>,
        active: Option<bool>,
    ) -> Result<ProductDetail, RepositoryError> {
        let (product_id,): (i32,) = sqlx::query_as(
            "UPDATE catalog.product_colour SET
                 colour = COALESCE($2, colour),
                 lifecycle = CASE
                     WHEN $3::boolean IS NULL THEN lifecycle
                     WHEN $3 THEN 'active'::lifecycle
                     ELSE 'inactive'::lifecycle
                 END,
                 updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'
             RETURNING product_id",
        )
        .bind(id)
        .bind(colour)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.get_detail(Visibility::Admin, ProductId::new(product_id))
            .await
    }

    /// Soft-delete a colour variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the colour doesn't exist or is
    /// already deleted.
    pub async fn soft_delete_colour(&self, id: ColourId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE catalog.product_colour SET lifecycle = 'deleted', updated_at = now()
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

    // =========================================================================
    // Images
    // =========================================================================

    /// Record an uploaded image. The first image of a colour becomes its default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the colour doesn't exist or is deleted.
    pub async fn add_image(&self, colour_id: ColourId, path: &str) -> Result<Image, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent uploads to the same colour.
        let locked: Option<(i32,)> = sqlx::query_as(
            "SELECT id FROM catalog.product_colour
             WHERE id = $1 AND lifecycle <> 'deleted'
             FOR UPDATE",
        )
        .bind(colour_id)
        .fetch_optional(&mut *tx)
        .await?;
        locked.ok_or(RepositoryError::NotFound)?;

        let row = sqlx::query_as::<_, ImageRow>(
            "INSERT INTO catalog.product_image (colour_id, path, is_default, position)
             SELECT $1, $2,
                    NOT EXISTS (
                        SELECT 1 FROM catalog.product_image WHERE colour_id = $1 AND is_default
                    ),
                    COALESCE(
                        (SELECT MAX(position) + 1 FROM catalog.product_image WHERE colour_id = $1),
                        0
                    )
             RETURNING id, colour_id, path, is_default, position",
        )
        .bind(colour_id)
        .bind(path)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(self.image(row))
    }

    /// Make an image the default of its colour.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image doesn't exist.
    pub async fn set_default_image(&self, id: ImageId) -> Result<Image, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (colour_id,): (i32,) =
            sqlx::query_as("SELECT colour_id FROM catalog.product_image WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "UPDATE catalog.product_image SET is_default = FALSE
             WHERE colour_id = $1 AND is_default AND id <> $2",
        )
        .bind(colour_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ImageRow>(
            "UPDATE catalog.product_image SET is_default = TRUE
             WHERE id = $1
             RETURNING id, colour_id, path, is_default, position",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(self.image(row))
    }

    /// Delete an image row and return its stored path. If it was the
    /// default, the lowest-positioned remaining image takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image doesn't exist.
    pub async fn delete_image(&self, id: ImageId) -> Result<String, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, ImageRow>(
            "DELETE FROM catalog.product_image WHERE id = $1
             RETURNING id, colour_id, path, is_default, position",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if deleted.is_default {
            sqlx::query(
                "UPDATE catalog.product_image SET is_default = TRUE
                 WHERE id = (
                     SELECT id FROM catalog.product_image
                     WHERE colour_id = $1
                     ORDER BY position, id
                     LIMIT 1
                 )",
            )
            .bind(deleted.colour_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(deleted.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("kurta"), "kurta");
    }

    #[test]
    fn test_visibility_predicates() {
        assert_eq!(
            Visibility::Storefront.predicate("p"),
            "p.lifecycle = 'active'"
        );
        assert_eq!(Visibility::Admin.predicate("s"), "s.lifecycle <> 'deleted'");
    }
}
