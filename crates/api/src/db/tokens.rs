//! Login tokens and password reset tokens.
//!
//! Customers and panel users keep their tokens in separate tables; the
//! repository picks the table pair from the [`PrincipalKind`].

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use vastra_core::PrincipalKind;

use super::RepositoryError;

/// Table and owner column names for one principal kind.
struct TokenTables {
    token: &'static str,
    reset: &'static str,
    owner: &'static str,
}

const fn tables(kind: PrincipalKind) -> TokenTables {
    match kind {
        PrincipalKind::Customer => TokenTables {
            token: "shop.customer_token",
            reset: "shop.customer_password_reset",
            owner: "customer_id",
        },
        PrincipalKind::Panel => TokenTables {
            token: "admin.panel_token",
            reset: "admin.panel_password_reset",
            owner: "panel_user_id",
        },
    }
}

/// Repository for issued token ids and password reset tokens.
pub struct TokenRepository<'a> {
    pool: &'a PgPool,
    kind: PrincipalKind,
    tables: TokenTables,
}

impl<'a> TokenRepository<'a> {
    /// Create a token repository for one kind of principal.
    #[must_use]
    pub const fn new(pool: &'a PgPool, kind: PrincipalKind) -> Self {
        Self {
            pool,
            kind,
            tables: tables(kind),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Record a freshly issued token id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &self,
        jti: Uuid,
        principal_id: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (jti, {}, expires_at) VALUES ($1, $2, $3)",
            self.tables.token, self.tables.owner
        ))
        .bind(jti)
        .bind(principal_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Whether the token id is still active for the principal.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_active(&self, jti: Uuid, principal_id: i32) -> Result<bool, RepositoryError> {
        let (active,): (bool,) = sqlx::query_as(&format!(
            "SELECT EXISTS (
                 SELECT 1 FROM {} WHERE jti = $1 AND {} = $2 AND expires_at > now()
             )",
            self.tables.token, self.tables.owner
        ))
        .bind(jti)
        .bind(principal_id)
        .fetch_one(self.pool)
        .await?;
        Ok(active)
    }

    /// Revoke one token (logout).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke(&self, jti: Uuid) -> Result<(), RepositoryError> {
        sqlx::query(&format!("DELETE FROM {} WHERE jti = $1", self.tables.token))
            .bind(jti)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Revoke every token of a principal. Returns how many were revoked.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn revoke_all(&self, principal_id: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1",
            self.tables.token, self.tables.owner
        ))
        .bind(principal_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Store the hash of a new password reset token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_reset(
        &self,
        token_hash: &str,
        principal_id: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO {} (token_hash, {}, expires_at) VALUES ($1, $2, $3)",
            self.tables.reset, self.tables.owner
        ))
        .bind(token_hash)
        .bind(principal_id)
        .bind(expires_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Mark a reset token used and return its principal id.
    ///
    /// Returns `None` if the token is unknown, expired or already used.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn consume_reset(&self, token_hash: &str) -> Result<Option<i32>, RepositoryError> {
        let row: Option<(i32,)> = sqlx::query_as(&format!(
            "UPDATE {} SET used_at = now()
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now()
             RETURNING {}",
            self.tables.reset, self.tables.owner
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Delete expired tokens and used or expired reset tokens.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a delete fails.
    pub async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let tokens = sqlx::query(&format!(
            "DELETE FROM {} WHERE expires_at <= now()",
            self.tables.token
        ))
        .execute(self.pool)
        .await?;
        let resets = sqlx::query(&format!(
            "DELETE FROM {} WHERE used_at IS NOT NULL OR expires_at <= now()",
            self.tables.reset
        ))
        .execute(self.pool)
        .await?;
        Ok(tokens.rows_affected() + resets.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_separate_per_kind() {
        let customer = tables(PrincipalKind::Customer);
        let panel = tables(PrincipalKind::Panel);
        assert!(customer.token.starts_with("shop."));
        assert!(panel.token.starts_with("admin."));
        assert_ne!(customer.owner, panel.owner);
    }
}
