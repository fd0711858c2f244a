//! Back-office user management.
//!
//! Panel users can't hold the `Customer` role, and nobody can deactivate or
//! delete their own account. Deactivating or deleting a user revokes all of
//! their tokens.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use vastra_core::permission::CUSTOMER_ROLE;
use vastra_core::{Email, Module, PanelUserId, PermissionKey, PrincipalKind, RoleId};

use super::audit;
use crate::db::{Page, Pagination, PanelUserRepository, RoleRepository, TokenRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequirePanelUser;
use crate::models::PanelUser;
use crate::routes::{not_found, optional, required};
use crate::services::auth::{AuthError, hash_password, validate_password};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/panel-users", get(list).post(create))
        .route("/panel-users/{id}", put(update).delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct CreatePanelUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePanelUserRequest {
    pub name: Option<String>,
    pub role_id: Option<RoleId>,
    pub active: Option<bool>,
}

/// Check a role exists and may be given to a panel user.
async fn assignable_role(state: &AppState, role_id: RoleId) -> Result<()> {
    let role = RoleRepository::new(state.pool())
        .get(role_id)
        .await
        .map_err(not_found("Role"))?;
    if role.name == CUSTOMER_ROLE {
        return Err(AppError::BadRequest(
            "The Customer role can't be given to panel users".to_owned(),
        ));
    }
    Ok(())
}

fn not_self(auth: &RequirePanelUser, id: PanelUserId, action: &str) -> Result<()> {
    if auth.user.id == id {
        return Err(AppError::BadRequest(format!("You can't {action} your own account")));
    }
    Ok(())
}

async fn revoke_tokens(state: &AppState, id: PanelUserId) -> Result<()> {
    let revoked = TokenRepository::new(state.pool(), PrincipalKind::Panel)
        .revoke_all(id.as_i32())
        .await?;
    tracing::info!(panel_user_id = %id, revoked, "Revoked panel user tokens");
    Ok(())
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<PanelUser>>> {
    auth.require(PermissionKey::read(Module::PanelUsers))?;
    Ok(Json(
        PanelUserRepository::new(state.pool())
            .list(pagination)
            .await?,
    ))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Json(body): Json<CreatePanelUserRequest>,
) -> Result<(StatusCode, Json<PanelUser>)> {
    auth.require(PermissionKey::write(Module::PanelUsers))?;
    let name = required(&body.name, "name")?;
    let email = Email::parse(&body.email).map_err(AuthError::from)?;
    validate_password(&body.password)?;
    assignable_role(&state, body.role_id).await?;

    let password_hash = hash_password(&body.password)?;
    let user = PanelUserRepository::new(state.pool())
        .create(name, &email, &password_hash, body.role_id)
        .await?;

    tracing::info!(new_panel_user_id = %user.id, role = %user.role_name, "Panel user created");
    audit(
        &state,
        &auth,
        "POST",
        Module::PanelUsers,
        json!({ "panel_user_id": user.id, "email": email, "role_id": body.role_id }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<PanelUserId>,
    Json(body): Json<UpdatePanelUserRequest>,
) -> Result<Json<PanelUser>> {
    auth.require(PermissionKey::write(Module::PanelUsers))?;
    let name = optional(body.name.as_deref(), "name")?;
    if body.active == Some(false) {
        not_self(&auth, id, "deactivate")?;
    }
    if let Some(role_id) = body.role_id {
        assignable_role(&state, role_id).await?;
    }

    let user = PanelUserRepository::new(state.pool())
        .update(id, name, body.role_id, body.active)
        .await
        .map_err(not_found("Panel user"))?;

    if body.active == Some(false) {
        revoke_tokens(&state, id).await?;
    }

    audit(
        &state,
        &auth,
        "PUT",
        Module::PanelUsers,
        json!({
            "panel_user_id": id,
            "name": name,
            "role_id": body.role_id,
            "active": body.active,
        }),
    )
    .await;
    Ok(Json(user))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn remove(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<PanelUserId>,
) -> Result<StatusCode> {
    auth.require(PermissionKey::write(Module::PanelUsers))?;
    not_self(&auth, id, "delete")?;

    PanelUserRepository::new(state.pool())
        .soft_delete(id)
        .await
        .map_err(not_found("Panel user"))?;
    revoke_tokens(&state, id).await?;

    audit(&state, &auth, "DELETE", Module::PanelUsers, json!({ "panel_user_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}
