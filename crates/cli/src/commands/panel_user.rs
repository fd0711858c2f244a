//! Panel user management commands.
//!
//! The first `Admin` account has to come from here; after that, panel users
//! are managed through the admin API.

use sqlx::PgPool;

use vastra_api::db::{PanelUserRepository, RoleRepository};
use vastra_api::services::auth::{hash_password, validate_password};
use vastra_core::Email;
use vastra_core::permission::CUSTOMER_ROLE;

use super::CliError;

/// Create a panel user with the named role.
///
/// # Returns
///
/// The ID of the created panel user.
pub async fn create(
    pool: &PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> Result<i32, CliError> {
    let email = Email::parse(email).map_err(vastra_api::services::AuthError::from)?;
    validate_password(password)?;

    let role = RoleRepository::new(pool)
        .get_by_name(role)
        .await?
        .ok_or_else(|| CliError::UnknownRole(role.to_owned()))?;
    if role.name == CUSTOMER_ROLE {
        return Err(CliError::ForbiddenRole(role.name));
    }

    let password_hash = hash_password(password)?;
    let user = PanelUserRepository::new(pool)
        .create(name.trim(), &email, &password_hash, role.id)
        .await?;

    tracing::info!(
        "Panel user created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role_name
    );
    Ok(user.id.as_i32())
}
