//! Roles and permissions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vastra_core::{PermissionId, PermissionKey, RoleId};

/// A back-office role.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    /// `false` for the protected roles.
    pub is_dynamic: bool,
    pub permissions: Vec<PermissionKey>,
    pub created_at: DateTime<Utc>,
}

/// A stored permission key.
#[derive(Debug, Clone, Serialize)]
pub struct Permission {
    pub id: PermissionId,
    pub key: PermissionKey,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
