//! Customer authentication handlers.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use vastra_core::PrincipalKind;

use crate::error::Result;
use crate::middleware::RequireCustomer;
use crate::models::Customer;
use crate::routes::password::{
    self, ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SessionResponse,
};
use crate::routes::{optional, required};
use crate::services::AuthService;
use crate::state::AppState;

/// Reset link path on the storefront.
const RESET_PATH: &str = "/reset-password";

/// Rate-limited endpoints that don't need a token.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Endpoints of a signed-in customer.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

/// Register a customer and return a token.
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse<Customer>>)> {
    let name = required(&body.name, "name")?;
    let phone = optional(body.phone.as_deref(), "phone")?;

    let (customer, token) = AuthService::new(state.pool(), state.tokens())
        .register_customer(name, &body.email, phone, &body.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse::new(token, customer)),
    ))
}

/// Sign in with email and password.
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionResponse<Customer>>> {
    let (customer, token) = AuthService::new(state.pool(), state.tokens())
        .login_customer(&body.email, &body.password)
        .await?;
    tracing::info!(customer_id = %customer.id, "Customer signed in");
    Ok(Json(SessionResponse::new(token, customer)))
}

/// Revoke the presented token.
#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn logout(State(state): State<AppState>, auth: RequireCustomer) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.tokens())
        .logout(PrincipalKind::Customer, auth.jti)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>> {
    password::forgot_password(&state, PrincipalKind::Customer, RESET_PATH, &body)
        .await
        .map(Json)
}

#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<Value>> {
    password::reset_password(&state, PrincipalKind::Customer, &body)
        .await
        .map(Json)
}

/// The signed-in customer.
pub async fn me(auth: RequireCustomer) -> Json<Customer> {
    Json(auth.customer)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::routes::tests::{json_body, request, test_app};

    #[tokio::test]
    async fn test_me_requires_token() {
        let response = test_app()
            .oneshot(request("GET", "/api/auth/me", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "Authentication required"
        );
    }

    #[tokio::test]
    async fn test_register_requires_name() {
        let response = test_app()
            .oneshot(request(
                "POST",
                "/api/auth/register",
                Some(serde_json::json!({
                    "name": " ",
                    "email": "asha@example.com",
                    "password": "long enough"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "name is required");
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let response = test_app()
            .oneshot(request(
                "POST",
                "/api/auth/register",
                Some(serde_json::json!({
                    "name": "Asha",
                    "email": "asha@example.com",
                    "password": "short"
                })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
