//! Roles and permission keys.
//!
//! The protected roles (`Admin`, `Customer`) can't be created, renamed,
//! re-permissioned or deleted through these endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use vastra_core::permission::PROTECTED_ROLES;
use vastra_core::{Module, PermissionId, PermissionKey, RoleId};

use super::audit;
use crate::db::{Page, Pagination, PermissionRepository, RoleRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequirePanelUser;
use crate::models::{Permission, Role};
use crate::routes::{not_found, optional, required};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/{id}", put(update_role).delete(delete_role))
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/permissions/{id}", delete(delete_permission))
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<PermissionKey>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub name: Option<String>,
    pub permissions: Option<Vec<PermissionKey>>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePermissionRequest {
    pub key: PermissionKey,
    #[serde(default)]
    pub description: String,
}

/// Reject names that would shadow a protected role, in any letter case.
fn dynamic_role_name<'s>(name: &'s str) -> Result<&'s str> {
    let name = required(name, "name")?;
    if PROTECTED_ROLES.iter().any(|p| p.eq_ignore_ascii_case(name)) {
        return Err(AppError::Conflict(format!("{name} is a protected role")));
    }
    Ok(name)
}

fn dedup(mut permissions: Vec<PermissionKey>) -> Vec<PermissionKey> {
    permissions.sort_by_key(ToString::to_string);
    permissions.dedup();
    permissions
}

// =============================================================================
// Roles
// =============================================================================

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list_roles(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Role>>> {
    auth.require(PermissionKey::read(Module::Roles))?;
    Ok(Json(RoleRepository::new(state.pool()).list(pagination).await?))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_role(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>)> {
    auth.require(PermissionKey::write(Module::Roles))?;
    let name = dynamic_role_name(&body.name)?;
    let permissions = dedup(body.permissions);

    let role = RoleRepository::new(state.pool())
        .create(name, &permissions)
        .await?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Roles,
        json!({ "role_id": role.id, "name": name, "permissions": permissions }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(role)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update_role(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<RoleId>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<Role>> {
    auth.require(PermissionKey::write(Module::Roles))?;
    let name = optional(body.name.as_deref(), "name")?
        .map(dynamic_role_name)
        .transpose()?;
    let permissions = body.permissions.map(dedup);

    let role = RoleRepository::new(state.pool())
        .update(id, name, permissions.as_deref())
        .await
        .map_err(not_found("Role"))?;

    audit(
        &state,
        &auth,
        "PUT",
        Module::Roles,
        json!({ "role_id": id, "name": name, "permissions": permissions }),
    )
    .await;
    Ok(Json(role))
}

/// Delete a dynamic role. Refused while any panel user holds it.
#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_role(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<RoleId>,
) -> Result<StatusCode> {
    auth.require(PermissionKey::write(Module::Roles))?;
    RoleRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Role"))?;

    audit(&state, &auth, "DELETE", Module::Roles, json!({ "role_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Permissions
// =============================================================================

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list_permissions(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Permission>>> {
    auth.require(PermissionKey::read(Module::Permissions))?;
    Ok(Json(
        PermissionRepository::new(state.pool())
            .list(pagination)
            .await?,
    ))
}

/// Register a permission key. Keys outside `<module>:<access>` are
/// rejected while the body is parsed.
#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_permission(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Json(body): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>)> {
    auth.require(PermissionKey::write(Module::Permissions))?;
    let permission = PermissionRepository::new(state.pool())
        .create(body.key, body.description.trim())
        .await?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Permissions,
        json!({ "permission_id": permission.id, "key": body.key }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(permission)))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_permission(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<PermissionId>,
) -> Result<StatusCode> {
    auth.require(PermissionKey::write(Module::Permissions))?;
    PermissionRepository::new(state.pool())
        .delete(id)
        .await
        .map_err(not_found("Permission"))?;

    audit(&state, &auth, "DELETE", Module::Permissions, json!({ "permission_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_names_rejected() {
        assert_eq!(dynamic_role_name(" Editor ").unwrap(), "Editor");
        assert_eq!(
            dynamic_role_name("admin").unwrap_err().status(),
            StatusCode::CONFLICT
        );
        assert!(dynamic_role_name("Customer").is_err());
        assert_eq!(
            dynamic_role_name("  ").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_role_body_rejects_unknown_keys() {
        let ok: CreateRoleRequest = serde_json::from_value(json!({
            "name": "Editor",
            "permissions": ["products:write", "orders:read", "products:write"]
        }))
        .unwrap();
        assert_eq!(dedup(ok.permissions).len(), 2);

        let bad = serde_json::from_value::<CreateRoleRequest>(json!({
            "name": "Editor",
            "permissions": ["warehouse:read"]
        }));
        assert!(bad.is_err());
    }
}
