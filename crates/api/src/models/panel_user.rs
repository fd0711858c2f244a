//! Back-office user types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vastra_core::permission::ADMIN_ROLE;
use vastra_core::{Email, Lifecycle, PanelUserId, PermissionKey, RoleId};

/// A panel (back-office) user with the permissions of their role.
#[derive(Debug, Clone, Serialize)]
pub struct PanelUser {
    pub id: PanelUserId,
    pub name: String,
    pub email: Email,
    pub role_id: RoleId,
    pub role_name: String,
    pub permissions: Vec<PermissionKey>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

impl PanelUser {
    /// Whether this user may perform an action requiring `required`.
    ///
    /// The `Admin` role holds every permission.
    #[must_use]
    pub fn has_permission(&self, required: PermissionKey) -> bool {
        self.role_name == ADMIN_ROLE || self.permissions.iter().any(|p| p.grants(required))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use vastra_core::permission::Module;

    fn user(role: &str, permissions: Vec<PermissionKey>) -> PanelUser {
        PanelUser {
            id: PanelUserId::new(1),
            name: "Asha".to_string(),
            email: Email::parse("asha@vastra.test").unwrap(),
            role_id: RoleId::new(1),
            role_name: role.to_string(),
            permissions,
            lifecycle: Lifecycle::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_has_every_permission() {
        let admin = user(ADMIN_ROLE, Vec::new());
        for key in PermissionKey::all() {
            assert!(admin.has_permission(key));
        }
    }

    #[test]
    fn test_dynamic_role_checks_keys() {
        let editor = user("Editor", vec![PermissionKey::write(Module::Products)]);
        assert!(editor.has_permission(PermissionKey::read(Module::Products)));
        assert!(editor.has_permission(PermissionKey::write(Module::Products)));
        assert!(!editor.has_permission(PermissionKey::read(Module::Orders)));
    }
}
