//! Bearer token authentication extractors.
//!
//! A request is authenticated when its `Authorization: Bearer <jwt>` header
//! carries a token whose audience matches the route group, whose `jti` is
//! still stored for that principal, and whose principal is still active.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use vastra_core::{CustomerId, PanelUserId, PermissionKey, PrincipalKind};

use crate::db::{CustomerRepository, PanelUserRepository};
use crate::error::{AppError, set_sentry_user};
use crate::models::{Customer, PanelUser};
use crate::services::AuthService;
use crate::state::AppState;

/// An authenticated identity.
#[derive(Debug, Clone)]
pub enum Principal {
    Customer(Customer),
    Panel(PanelUser),
}

impl Principal {
    #[must_use]
    pub const fn kind(&self) -> PrincipalKind {
        match self {
            Self::Customer(_) => PrincipalKind::Customer,
            Self::Panel(_) => PrincipalKind::Panel,
        }
    }
}

/// Extractor that requires an authenticated customer.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireCustomer { customer, .. }: RequireCustomer) -> String {
///     format!("Hello, {}!", customer.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireCustomer {
    pub customer: Customer,
    /// Id of the presented token, for logout.
    pub jti: Uuid,
}

/// Extractor that requires an authenticated panel user.
#[derive(Debug, Clone)]
pub struct RequirePanelUser {
    pub user: PanelUser,
    /// Id of the presented token, for logout.
    pub jti: Uuid,
}

impl RequirePanelUser {
    /// Fail with 403 unless the user holds `required`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` naming the missing permission.
    pub fn require(&self, required: PermissionKey) -> Result<(), AppError> {
        if self.user.has_permission(required) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user.id, %required, "Permission denied");
            Err(AppError::Forbidden(format!("Missing permission {required}")))
        }
    }
}

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state, PrincipalKind::Customer).await? {
            (Principal::Customer(customer), jti) => Ok(Self { customer, jti }),
            (Principal::Panel(_), _) => Err(unauthorized()),
        }
    }
}

impl FromRequestParts<AppState> for RequirePanelUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match authenticate(parts, state, PrincipalKind::Panel).await? {
            (Principal::Panel(user), jti) => Ok(Self { user, jti }),
            (Principal::Customer(_), _) => Err(unauthorized()),
        }
    }
}

/// Resolve the bearer token of a request into an active principal of `kind`.
async fn authenticate(
    parts: &Parts,
    state: &AppState,
    kind: PrincipalKind,
) -> Result<(Principal, Uuid), AppError> {
    let token = bearer_token(parts).ok_or_else(unauthorized)?;
    let verified = AuthService::new(state.pool(), state.tokens())
        .authenticate(kind, token)
        .await?;

    let principal = match kind {
        PrincipalKind::Customer => CustomerRepository::new(state.pool())
            .get_active(CustomerId::new(verified.principal_id))
            .await?
            .map(Principal::Customer),
        PrincipalKind::Panel => PanelUserRepository::new(state.pool())
            .get_active(PanelUserId::new(verified.principal_id))
            .await?
            .map(Principal::Panel),
    }
    .ok_or_else(unauthorized)?;

    set_sentry_user(&verified.principal_id, principal.kind());
    Ok((principal, verified.jti))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized() -> AppError {
    AppError::Unauthorized("Authentication required".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/cart");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc.def"))), Some("abc.def"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }
}
