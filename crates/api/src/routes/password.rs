//! Login and password reset plumbing shared by customers and panel users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use vastra_core::PrincipalKind;

use crate::error::AppError;
use crate::services::AuthService;
use crate::services::auth::IssuedToken;
use crate::services::email::deliver_password_reset;
use crate::state::AppState;

/// Answer to every forgot-password request, whether or not the account exists.
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a reset link has been sent";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// A signed-in principal and its bearer token.
#[derive(Debug, Serialize)]
pub struct SessionResponse<P> {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    #[serde(flatten)]
    pub principal: P,
}

impl<P> SessionResponse<P> {
    pub fn new(token: IssuedToken, principal: P) -> Self {
        Self {
            token: token.token,
            token_type: "Bearer",
            expires_at: token.expires_at,
            principal,
        }
    }
}

/// Create a reset token and mail its link. `reset_path` is appended to the
/// public base URL.
pub async fn forgot_password(
    state: &AppState,
    kind: PrincipalKind,
    reset_path: &str,
    body: &ForgotPasswordRequest,
) -> Result<Value, AppError> {
    let request = AuthService::new(state.pool(), state.tokens())
        .request_password_reset(kind, &body.email)
        .await?;

    if let Some(request) = request {
        let url = reset_url(&state.config().public_base_url, reset_path, &request.token);
        deliver_password_reset(state.email(), request.email.as_str(), &url).await;
    }

    Ok(json!({ "message": RESET_REQUESTED_MESSAGE }))
}

/// Consume a reset token and set the new password.
pub async fn reset_password(
    state: &AppState,
    kind: PrincipalKind,
    body: &ResetPasswordRequest,
) -> Result<Value, AppError> {
    AuthService::new(state.pool(), state.tokens())
        .reset_password(kind, body.token.trim(), &body.password)
        .await?;
    Ok(json!({ "message": "Password has been reset" }))
}

fn reset_url(base: &str, path: &str, token: &str) -> String {
    format!("{}{path}?token={token}", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_url() {
        assert_eq!(
            reset_url("https://vastra.in/", "/admin/reset-password", "abc_-1"),
            "https://vastra.in/admin/reset-password?token=abc_-1"
        );
    }
}
