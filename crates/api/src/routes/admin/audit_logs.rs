//! Audit log browsing.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use vastra_core::{Module, PermissionKey};

use crate::db::{AuditLogRepository, Page, Pagination};
use crate::error::Result;
use crate::middleware::RequirePanelUser;
use crate::models::AuditLogEntry;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/audit-logs", get(list))
}

#[derive(Debug, Default, Deserialize)]
pub struct AuditLogQuery {
    pub module: Option<Module>,
}

/// Newest entries first, optionally for one module.
#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(query): Query<AuditLogQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<AuditLogEntry>>> {
    auth.require(PermissionKey::read(Module::AuditLogs))?;
    let page = AuditLogRepository::new(state.pool())
        .list(query.module, pagination)
        .await?;
    Ok(Json(page))
}
