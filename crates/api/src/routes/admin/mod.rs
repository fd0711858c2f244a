//! Back-office endpoints, authenticated with panel tokens.
//!
//! Every handler checks a `<module>:<access>` permission of the caller's
//! role, and every mutation is written to the audit log.

pub mod audit_logs;
pub mod auth;
pub mod catalog;
pub mod orders;
pub mod panel_users;
pub mod reports;
pub mod roles;

use axum::Router;
use serde_json::Value;

use vastra_core::Module;

use crate::db::AuditLogRepository;
use crate::middleware::RequirePanelUser;
use crate::state::AppState;

/// Admin routes other than the public auth endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::session_routes())
        .merge(catalog::routes())
        .merge(orders::routes())
        .merge(roles::routes())
        .merge(panel_users::routes())
        .merge(audit_logs::routes())
        .merge(reports::routes())
}

/// Record a mutation in the audit log.
///
/// A failed write is logged and otherwise ignored; the mutation itself has
/// already been committed.
pub(crate) async fn audit(
    state: &AppState,
    auth: &RequirePanelUser,
    action_type: &str,
    module: Module,
    details: Value,
) {
    if let Err(e) = AuditLogRepository::new(state.pool())
        .record(auth.user.id, action_type, module, &details)
        .await
    {
        tracing::warn!(
            error = %e,
            panel_user_id = %auth.user.id,
            action_type,
            module = module.as_str(),
            "Failed to write audit log"
        );
    }
}
