//! Role and permission repositories.
//!
//! Roles with `is_dynamic = false` (the protected `Admin` and `Customer`
//! roles) can't be renamed, re-permissioned or deleted.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use vastra_core::{PermissionId, PermissionKey, RoleId};

use super::{Page, Pagination, RepositoryError};
use crate::models::{Permission, Role};

const ROLE_SELECT: &str = r"
    SELECT r.id, r.name, r.is_dynamic, r.created_at,
           COALESCE(
               array_agg(p.key ORDER BY p.key) FILTER (WHERE p.key IS NOT NULL),
               '{}'
           ) AS permissions
    FROM admin.role r
    LEFT JOIN admin.role_permission rp ON rp.role_id = r.id
    LEFT JOIN admin.permission p ON p.id = rp.permission_id
";

#[derive(Debug, sqlx::FromRow)]
struct RoleRow {
    id: i32,
    name: String,
    is_dynamic: bool,
    created_at: DateTime<Utc>,
    permissions: Vec<String>,
}

impl TryFrom<RoleRow> for Role {
    type Error = RepositoryError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        let permissions = row
            .permissions
            .iter()
            .map(|k| {
                k.parse::<PermissionKey>()
                    .map_err(|e| RepositoryError::DataCorruption(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: RoleId::new(row.id),
            name: row.name,
            is_dynamic: row.is_dynamic,
            permissions,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PermissionRow {
    id: i32,
    key: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PermissionRow> for Permission {
    type Error = RepositoryError;

    fn try_from(row: PermissionRow) -> Result<Self, Self::Error> {
        let key = row
            .key
            .parse::<PermissionKey>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        Ok(Self {
            id: PermissionId::new(row.id),
            key,
            description: row.description,
            created_at: row.created_at,
        })
    }
}

fn key_strings(keys: &[PermissionKey]) -> Vec<String> {
    keys.iter().map(ToString::to_string).collect()
}

/// Replace a role's permission set inside `tx`.
async fn replace_permissions(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i32,
    keys: &[PermissionKey],
) -> Result<(), RepositoryError> {
    let mut keys = key_strings(keys);
    keys.sort();
    keys.dedup();

    sqlx::query("DELETE FROM admin.role_permission WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **tx)
        .await?;

    let inserted = sqlx::query(
        "INSERT INTO admin.role_permission (role_id, permission_id)
         SELECT $1, id FROM admin.permission WHERE key = ANY($2)",
    )
    .bind(role_id)
    .bind(&keys)
    .execute(&mut **tx)
    .await?;

    if usize::try_from(inserted.rows_affected()).ok() != Some(keys.len()) {
        return Err(RepositoryError::Conflict(
            "unknown permission key".to_owned(),
        ));
    }
    Ok(())
}

// =============================================================================
// Roles
// =============================================================================

/// Repository for roles.
pub struct RoleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List roles by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, pagination: Pagination) -> Result<Page<Role>, RepositoryError> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "{ROLE_SELECT} GROUP BY r.id ORDER BY r.name LIMIT $1 OFFSET $2"
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin.role")
            .fetch_one(self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Role::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// Get a role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role doesn't exist.
    pub async fn get(&self, id: RoleId) -> Result<Role, RepositoryError> {
        sqlx::query_as::<_, RoleRow>(&format!("{ROLE_SELECT} WHERE r.id = $1 GROUP BY r.id"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
            .and_then(Role::try_from)
    }

    /// Get a role by exact name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>, RepositoryError> {
        sqlx::query_as::<_, RoleRow>(&format!("{ROLE_SELECT} WHERE r.name = $1 GROUP BY r.id"))
            .bind(name)
            .fetch_optional(self.pool)
            .await?
            .map(Role::try_from)
            .transpose()
    }

    /// Create a dynamic role with a set of permissions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on a duplicate name or an unknown
    /// permission key.
    pub async fn create(
        &self,
        name: &str,
        permissions: &[PermissionKey],
    ) -> Result<Role, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO admin.role (name, is_dynamic) VALUES ($1, TRUE) RETURNING id",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "role name already exists"))?;

        replace_permissions(&mut tx, id, permissions).await?;
        tx.commit().await?;

        self.get(RoleId::new(id)).await
    }

    /// Rename a dynamic role and/or replace its permissions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role doesn't exist,
    /// `RepositoryError::Conflict` if it is protected, the name is taken or
    /// a permission key is unknown.
    pub async fn update(
        &self,
        id: RoleId,
        name: Option<&str>,
        permissions: Option<&[PermissionKey]>,
    ) -> Result<Role, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_dynamic(&mut tx, id).await?;

        if let Some(name) = name {
            sqlx::query("UPDATE admin.role SET name = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::from_constraint(e, "role name already exists"))?;
        }

        if let Some(permissions) = permissions {
            replace_permissions(&mut tx, id.as_i32(), permissions).await?;
        }

        tx.commit().await?;
        self.get(id).await
    }

    /// Delete a dynamic role that no panel user references.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the role doesn't exist,
    /// `RepositoryError::Conflict` if it is protected or still assigned.
    pub async fn delete(&self, id: RoleId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::lock_dynamic(&mut tx, id).await?;

        sqlx::query("DELETE FROM admin.role WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "role is assigned to panel users"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Ensure a protected role exists. Returns its id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert_protected(&self, name: &str) -> Result<RoleId, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO admin.role (name, is_dynamic) VALUES ($1, FALSE)
             ON CONFLICT (name) DO UPDATE SET is_dynamic = FALSE, updated_at = now()
             RETURNING id",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await?;
        Ok(RoleId::new(id))
    }

    /// Lock a role row and check it may be modified.
    async fn lock_dynamic(
        tx: &mut Transaction<'_, Postgres>,
        id: RoleId,
    ) -> Result<(), RepositoryError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT is_dynamic FROM admin.role WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;

        match row {
            None => Err(RepositoryError::NotFound),
            Some((false,)) => Err(RepositoryError::Conflict(
                "protected roles cannot be modified".to_owned(),
            )),
            Some((true,)) => Ok(()),
        }
    }
}

// =============================================================================
// Permissions
// =============================================================================

/// Repository for permission keys.
pub struct PermissionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PermissionRepository<'a> {
    /// Create a new permission repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List permissions by key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, pagination: Pagination) -> Result<Page<Permission>, RepositoryError> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, key, description, created_at FROM admin.permission
             ORDER BY key LIMIT $1 OFFSET $2",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin.permission")
            .fetch_one(self.pool)
            .await?;

        let items = rows
            .into_iter()
            .map(Permission::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, pagination, total))
    }

    /// Create a permission.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key already exists.
    pub async fn create(
        &self,
        key: PermissionKey,
        description: &str,
    ) -> Result<Permission, RepositoryError> {
        sqlx::query_as::<_, PermissionRow>(
            "INSERT INTO admin.permission (key, description) VALUES ($1, $2)
             RETURNING id, key, description, created_at",
        )
        .bind(key.to_string())
        .bind(description)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "permission already exists"))?
        .try_into()
    }

    /// Insert a permission or refresh its description. Used for seeding.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        key: PermissionKey,
        description: &str,
    ) -> Result<PermissionId, RepositoryError> {
        let (id,): (i32,) = sqlx::query_as(
            "INSERT INTO admin.permission (key, description) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET description = EXCLUDED.description
             RETURNING id",
        )
        .bind(key.to_string())
        .bind(description)
        .fetch_one(self.pool)
        .await?;
        Ok(PermissionId::new(id))
    }

    /// Delete a permission, removing it from every role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the permission doesn't exist.
    pub async fn delete(&self, id: PermissionId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM admin.permission WHERE id = $1")
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

    #[test]
    fn test_role_row_parses_permission_keys() {
        let role = Role::try_from(RoleRow {
            id: 3,
            name: "Catalog Editor".to_string(),
            is_dynamic: true,
            created_at: Utc::now(),
            permissions: vec!["categories:write".to_string(), "products:read".to_string()],
        })
        .unwrap();
        assert_eq!(role.permissions.len(), 2);
        assert_eq!(role.permissions[0].to_string(), "categories:write");
    }

    #[test]
    fn test_role_row_rejects_unknown_key() {
        let result = Role::try_from(RoleRow {
            id: 3,
            name: "Broken".to_string(),
            is_dynamic: true,
            created_at: Utc::now(),
            permissions: vec!["widgets:read".to_string()],
        });
        assert!(matches!(result, Err(RepositoryError::DataCorruption(_))));
    }
}
