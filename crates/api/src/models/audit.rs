//! Audit log entries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vastra_core::{AuditLogId, PanelUserId};

/// One recorded admin mutation.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub panel_user_id: PanelUserId,
    pub panel_user_name: String,
    /// HTTP verb of the mutation.
    pub action_type: String,
    pub target_module: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
