//! Panel user repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vastra_core::{Email, Lifecycle, PanelUserId, PermissionKey, RoleId};

use super::{Page, Pagination, RepositoryError};
use crate::models::PanelUser;

/// Panel user joined with its role name and the role's permission keys.
const PANEL_USER_SELECT: &str = r"
    SELECT u.id, u.name, u.email, u.role_id, r.name AS role_name, u.lifecycle, u.created_at,
           u.password_hash,
           COALESCE(
               array_agg(p.key ORDER BY p.key) FILTER (WHERE p.key IS NOT NULL),
               '{}'
           ) AS permissions
    FROM admin.panel_user u
    JOIN admin.role r ON r.id = u.role_id
    LEFT JOIN admin.role_permission rp ON rp.role_id = r.id
    LEFT JOIN admin.permission p ON p.id = rp.permission_id
";

const PANEL_USER_GROUP: &str = " GROUP BY u.id, r.name";

#[derive(Debug, sqlx::FromRow)]
struct PanelUserRow {
    id: i32,
    name: String,
    email: String,
    role_id: i32,
    role_name: String,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
    password_hash: String,
    permissions: Vec<String>,
}

impl PanelUserRow {
    fn into_parts(self) -> Result<(PanelUser, String), RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let permissions = self
            .permissions
            .iter()
            .map(|k| {
                k.parse::<PermissionKey>()
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((
            PanelUser {
                id: PanelUserId::new(self.id),
                name: self.name,
                email,
                role_id: RoleId::new(self.role_id),
                role_name: self.role_name,
                permissions,
                lifecycle: self.lifecycle,
                created_at: self.created_at,
            },
            self.password_hash,
        ))
    }
}

/// Repository for panel user database operations.
pub struct PanelUserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PanelUserRepository<'a> {
    /// Create a new panel user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an active panel user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, id: PanelUserId) -> Result<Option<PanelUser>, RepositoryError> {
        let row = sqlx::query_as::<_, PanelUserRow>(&format!(
            "{PANEL_USER_SELECT} WHERE u.id = $1 AND u.lifecycle = 'active' {PANEL_USER_GROUP}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| r.into_parts().map(|(user, _)| user)).transpose()
    }

    /// Get a non-deleted panel user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist or is deleted.
    pub async fn get(&self, id: PanelUserId) -> Result<PanelUser, RepositoryError> {
        let row = sqlx::query_as::<_, PanelUserRow>(&format!(
            "{PANEL_USER_SELECT} WHERE u.id = $1 AND u.lifecycle <> 'deleted' {PANEL_USER_GROUP}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into_parts()?.0)
    }

    /// Get an active panel user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<PanelUser>, RepositoryError> {
        Ok(self.get_password_hash(email).await?.map(|(user, _)| user))
    }

    /// Get an active panel user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(PanelUser, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, PanelUserRow>(&format!(
            "{PANEL_USER_SELECT} WHERE u.email = $1 AND u.lifecycle = 'active' {PANEL_USER_GROUP}"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(PanelUserRow::into_parts).transpose()
    }

    /// List non-deleted panel users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, pagination: Pagination) -> Result<Page<PanelUser>, RepositoryError> {
        let rows = sqlx::query_as::<_, PanelUserRow>(&format!(
            "{PANEL_USER_SELECT} WHERE u.lifecycle <> 'deleted' {PANEL_USER_GROUP}
             ORDER BY u.id LIMIT $1 OFFSET $2"
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM admin.panel_user WHERE lifecycle <> 'deleted'",
        )
        .fetch_one(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|r| r.into_parts().map(|(user, _)| user))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// Create a panel user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists or the
    /// role doesn't exist.
    pub async fn create(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
        role_id: RoleId,
    ) -> Result<PanelUser, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO admin.panel_user (name, email, password_hash, role_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(name)
        .bind(email.as_str())
        .bind(password_hash)
        .bind(role_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "email already exists"))?;

        self.get(PanelUserId::new(id)).await
    }

    /// Update name, role and activation of a panel user. `None` leaves a
    /// field unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist or is deleted.
    pub async fn update(
        &self,
        id: PanelUserId,
        name: Option<&str>,
        role_id: Option<RoleId>,
        active: Option<bool>,
    ) -> Result<PanelUser, RepositoryError> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE admin.panel_user SET
                 name = COALESCE($2, name),
                 role_id = COALESCE($3, role_id),
                 lifecycle = CASE
                     WHEN $4::boolean IS NULL THEN lifecycle
                     WHEN $4 THEN 'active'::lifecycle
                     ELSE 'inactive'::lifecycle
                 END,
                 updated_at = now()
             WHERE id = $1 AND lifecycle <> 'deleted'
             RETURNING id",
        )
        .bind(id)
        .bind(name)
        .bind(role_id)
        .bind(active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "role does not exist"))?;

        updated.ok_or(RepositoryError::NotFound)?;
        self.get(id).await
    }

    /// Soft-delete a panel user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist or is
    /// already deleted.
    pub async fn soft_delete(&self, id: PanelUserId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin.panel_user SET lifecycle = 'deleted', updated_at = now()
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

    /// Replace a panel user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    pub async fn update_password(
        &self,
        id: PanelUserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE admin.panel_user SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
