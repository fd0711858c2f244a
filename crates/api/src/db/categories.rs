//! Category repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vastra_core::{CategoryId, Lifecycle};

use super::{Page, Pagination, RepositoryError};
use crate::models::Category;

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    description: String,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            description: row.description,
            lifecycle: row.lifecycle,
            created_at: row.created_at,
        }
    }
}

/// Repository for category database operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    /// Create a new category repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Active categories, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, lifecycle, created_at
             FROM catalog.category
             WHERE lifecycle = 'active'
             ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Non-deleted categories for the admin panel.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, pagination: Pagination) -> Result<Page<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, lifecycle, created_at
             FROM catalog.category
             WHERE lifecycle <> 'deleted'
             ORDER BY name
             LIMIT $1 OFFSET $2",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM catalog.category WHERE lifecycle <> 'deleted'")
                .fetch_one(self.pool)
                .await?;

        Ok(Page::new(
            rows.into_iter().map(Category::from).collect(),
            pagination,
            total,
        ))
    }

    /// Get a non-deleted category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist or is deleted.
    pub async fn get(&self, id: CategoryId) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, description, lifecycle, created_at
             FROM catalog.category
             WHERE id = $1 AND lifecycle <> 'deleted'",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .map(Category::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a live category has the same name.
    pub async fn create(&self, name: &str, description: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO catalog.category (name, description)
             VALUES ($1, $2)
             RETURNING id, name, description, lifecycle, created_at",
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?;

        Ok(row.into())
    }

    /// Update a category. `None` leaves a field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist or is
    /// deleted, `RepositoryError::Conflict` on a duplicate name.
    pub async fn update(
        &self,
        id: CategoryId,
        name: Option<&str>,
        description: Option<&str>,
        active: Option<bool>,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, CategoryRow>(
            "UPDATE catalog.category SET
                 name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 lifecycle = CASE
                     WHEN $4::boolean IS NULL THEN lifecycle
                     WHEN $4 THEN 'active'::lifecycle
                     ELSE 'inactive'::lifecycle
                 END,
                 updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'
             RETURNING id, name, description, lifecycle, created_at",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "category name already exists"))?
        .map(Category::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete a category. Refused while it still has live products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category doesn't exist or is
    /// deleted, `RepositoryError::Conflict` if live products reference it.
    pub async fn soft_delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let (in_use,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM catalog.product WHERE category_id = $1 AND lifecycle <> 'deleted'
             )",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        if in_use {
            return Err(RepositoryError::Conflict(
                "category still has products".to_owned(),
            ));
        }

        let result = sqlx::query(
            "UPDATE catalog.category SET lifecycle = 'deleted', updated_at = now()
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
