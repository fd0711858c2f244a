//! Audit log repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vastra_core::{AuditLogId, Module, PanelUserId};

use super::{Page, Pagination, RepositoryError};
use crate::models::AuditLogEntry;

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: i32,
    panel_user_id: i32,
    panel_user_name: String,
    action_type: String,
    target_module: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLogEntry {
    fn from(row: AuditLogRow) -> Self {
        Self {
            id: AuditLogId::new(row.id),
            panel_user_id: PanelUserId::new(row.panel_user_id),
            panel_user_name: row.panel_user_name,
            action_type: row.action_type,
            target_module: row.target_module,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

/// Repository for the admin audit log.
pub struct AuditLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditLogRepository<'a> {
    /// Create a new audit log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record an admin mutation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &self,
        panel_user_id: PanelUserId,
        action_type: &str,
        module: Module,
        details: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO admin.audit_log (panel_user_id, action_type, target_module, details)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(panel_user_id)
        .bind(action_type)
        .bind(module.as_str())
        .bind(details)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Entries newest first, optionally for one module.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        module: Option<Module>,
        pagination: Pagination,
    ) -> Result<Page<AuditLogEntry>, RepositoryError> {
        let module = module.map(Module::as_str);

        let rows = sqlx::query_as::<_, AuditLogRow>(
            "SELECT a.id, a.panel_user_id, u.name AS panel_user_name, a.action_type,
                    a.target_module, a.details, a.created_at
             FROM admin.audit_log a
             JOIN admin.panel_user u ON u.id = a.panel_user_id
             WHERE ($1::text IS NULL OR a.target_module = $1)
             ORDER BY a.created_at DESC, a.id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(module)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM admin.audit_log WHERE ($1::text IS NULL OR target_module = $1)",
        )
        .bind(module)
        .fetch_one(self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(AuditLogEntry::from).collect(),
            pagination,
            total,
        ))
    }
}
