//! Panel user authentication handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::Value;
use tracing::instrument;

use vastra_core::PrincipalKind;

use crate::error::Result;
use crate::middleware::RequirePanelUser;
use crate::models::PanelUser;
use crate::routes::password::{
    self, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SessionResponse,
};
use crate::services::AuthService;
use crate::state::AppState;

/// Reset link path in the admin panel.
const RESET_PATH: &str = "/admin/reset-password";

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse<PanelUser>>> {
    let (user, token) = AuthService::new(state.pool(), state.tokens())
        .login_panel(&body.email, &body.password)
        .await?;
    tracing::info!(panel_user_id = %user.id, role = %user.role_name, "Panel user signed in");
    Ok(Json(SessionResponse::new(token, user)))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn logout(State(state): State<AppState>, auth: RequirePanelUser) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.tokens())
        .logout(PrincipalKind::Panel, auth.jti)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    password::forgot_password(&state, PrincipalKind::Panel, RESET_PATH, &body)
        .await
        .map(Json)
}

#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    password::reset_password(&state, PrincipalKind::Panel, &body)
        .await
        .map(Json)
}

/// The signed-in panel user with role and permissions.
pub async fn me(auth: RequirePanelUser) -> Json<PanelUser> {
    Json(auth.user)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::routes::tests::{json_body, request, test_app};

    #[tokio::test]
    async fn test_admin_me_requires_token() {
        let response = test_app()
            .oneshot(request("GET", "/api/admin/auth/me", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_login_rejects_malformed_email() {
        let response = test_app()
            .oneshot(request(
                "POST",
                "/api/admin/auth/login",
                Some(json!({ "email": "nobody", "password": "whatever1" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_malformed_panel_token_is_unauthorized() {
        let mut orders = request("GET", "/api/admin/orders", None);
        orders.headers_mut().insert(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer not-a-jwt"),
        );
        let response = test_app().oneshot(orders).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
