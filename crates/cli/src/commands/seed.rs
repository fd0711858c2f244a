//! Seed the protected roles and the permission catalogue.
//!
//! Safe to run repeatedly: roles and permissions are upserted.

use sqlx::PgPool;

use vastra_api::db::{PermissionRepository, RoleRepository};
use vastra_core::permission::{Access, PROTECTED_ROLES};
use vastra_core::PermissionKey;

use super::CliError;

/// Upsert `Admin`, `Customer` and every `<module>:<access>` key.
pub async fn run(pool: &PgPool) -> Result<(), CliError> {
    let roles = RoleRepository::new(pool);
    for name in PROTECTED_ROLES {
        let id = roles.upsert_protected(name).await?;
        tracing::info!(role = name, %id, "Protected role ready");
    }

    let permissions = PermissionRepository::new(pool);
    let keys = PermissionKey::all();
    for key in &keys {
        permissions.upsert(*key, &describe(*key)).await?;
    }
    tracing::info!(count = keys.len(), "Permissions seeded");

    Ok(())
}

fn describe(key: PermissionKey) -> String {
    match key.access {
        Access::Read => format!("View {}", key.module.as_str().replace('_', " ")),
        Access::Write => format!("Manage {}", key.module.as_str().replace('_', " ")),
    }
}

#[cfg(test)]
mod tests {
    use vastra_core::Module;

    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(
            describe(PermissionKey::read(Module::AuditLogs)),
            "View audit logs"
        );
        assert_eq!(
            describe(PermissionKey::write(Module::PanelUsers)),
            "Manage panel users"
        );
    }
}
