//! Authentication service.
//!
//! Provides password login, bearer tokens and password resets for both
//! customers and panel users. The two principal kinds share the flow but
//! never their tables or their tokens.

mod error;
mod token;

pub use error::AuthError;
pub use token::{Claims, IssuedToken, TokenService, VerifiedToken};

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use vastra_core::{CustomerId, Email, PanelUserId, PrincipalKind};

use crate::db::{CustomerRepository, PanelUserRepository, RepositoryError, TokenRepository};
use crate::models::{Customer, PanelUser};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length, bounding hashing cost.
const MAX_PASSWORD_LENGTH: usize = 128;

/// How long a password reset link stays valid.
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Random bytes in a reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// A password reset requested for an existing account.
#[derive(Debug)]
pub struct ResetRequest {
    /// Where to send the link.
    pub email: Email,
    /// Raw token for the link. Only its hash is stored.
    pub token: String,
}

/// Authentication service.
///
/// Handles registration, login, logout, token checks and password resets.
pub struct AuthService<'a> {
    pool: &'a PgPool,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, tokens: &'a TokenService) -> Self {
        Self { pool, tokens }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Register a customer and sign them in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::AccountExists` if the email is already registered.
    pub async fn register_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        password: &str,
    ) -> Result<(Customer, IssuedToken), AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        let customer = CustomerRepository::new(self.pool)
            .create(name.trim(), &email, phone, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::AccountExists,
                other => AuthError::Repository(other),
            })?;

        let token = self
            .start_session(PrincipalKind::Customer, customer.id.as_i32())
            .await?;
        tracing::info!(customer_id = %customer.id, "Customer registered");
        Ok((customer, token))
    }

    /// Sign a customer in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or the account is not active.
    pub async fn login_customer(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Customer, IssuedToken), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((customer, password_hash)) = CustomerRepository::new(self.pool)
            .get_password_hash(&email)
            .await?
        else {
            return Err(reject_unknown_account(password));
        };
        verify_password(password, &password_hash)?;

        let token = self
            .start_session(PrincipalKind::Customer, customer.id.as_i32())
            .await?;
        Ok((customer, token))
    }

    // =========================================================================
    // Panel users
    // =========================================================================

    /// Sign a panel user in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong
    /// or the account is not active.
    pub async fn login_panel(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(PanelUser, IssuedToken), AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = PanelUserRepository::new(self.pool)
            .get_password_hash(&email)
            .await?
        else {
            return Err(reject_unknown_account(password));
        };
        verify_password(password, &password_hash)?;

        let token = self
            .start_session(PrincipalKind::Panel, user.id.as_i32())
            .await?;
        Ok((user, token))
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Verify a bearer token and check it hasn't been revoked.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is invalid, expired or
    /// revoked.
    pub async fn authenticate(
        &self,
        kind: PrincipalKind,
        bearer: &str,
    ) -> Result<VerifiedToken, AuthError> {
        let verified = self.tokens.verify(kind, bearer)?;
        let active = TokenRepository::new(self.pool, kind)
            .is_active(verified.jti, verified.principal_id)
            .await?;
        if !active {
            return Err(AuthError::InvalidToken);
        }
        Ok(verified)
    }

    /// Revoke one token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn logout(&self, kind: PrincipalKind, jti: Uuid) -> Result<(), AuthError> {
        TokenRepository::new(self.pool, kind).revoke(jti).await?;
        Ok(())
    }

    async fn start_session(
        &self,
        kind: PrincipalKind,
        principal_id: i32,
    ) -> Result<IssuedToken, AuthError> {
        let issued = self.tokens.issue(kind, principal_id)?;
        TokenRepository::new(self.pool, kind)
            .insert(issued.jti, principal_id, issued.expires_at)
            .await?;
        Ok(issued)
    }

    // =========================================================================
    // Password reset
    // =========================================================================

    /// Create a reset token for an active account.
    ///
    /// Returns `None` when no active account has this email; callers must
    /// answer the same either way.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the database operation fails.
    pub async fn request_password_reset(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<ResetRequest>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(None);
        };

        let principal_id = match kind {
            PrincipalKind::Customer => CustomerRepository::new(self.pool)
                .get_active_by_email(&email)
                .await?
                .map(|c| c.id.as_i32()),
            PrincipalKind::Panel => PanelUserRepository::new(self.pool)
                .get_active_by_email(&email)
                .await?
                .map(|u| u.id.as_i32()),
        };
        let Some(principal_id) = principal_id else {
            return Ok(None);
        };

        let (token, token_hash) = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
        TokenRepository::new(self.pool, kind)
            .create_reset(&token_hash, principal_id, expires_at)
            .await?;

        tracing::info!(%kind, principal_id, "Password reset requested");
        Ok(Some(ResetRequest { email, token }))
    }

    /// Set a new password with a reset token and revoke every existing
    /// bearer token of the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::InvalidResetToken` if the token is unknown, expired
    /// or already used.
    pub async fn reset_password(
        &self,
        kind: PrincipalKind,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        let tokens = TokenRepository::new(self.pool, kind);
        let principal_id = tokens
            .consume_reset(&hash_reset_token(token))
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        match kind {
            PrincipalKind::Customer => {
                CustomerRepository::new(self.pool)
                    .update_password(CustomerId::new(principal_id), &password_hash)
                    .await?;
            }
            PrincipalKind::Panel => {
                PanelUserRepository::new(self.pool)
                    .update_password(PanelUserId::new(principal_id), &password_hash)
                    .await?;
            }
        }

        let revoked = tokens.revoke_all(principal_id).await?;
        tracing::info!(%kind, principal_id, revoked, "Password reset completed");
        Ok(())
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` on mismatch or a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

/// Hash checked when a login names no account, so a miss costs the same
/// argon2 run as a wrong password.
static UNKNOWN_ACCOUNT_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no account has this password").ok());

fn reject_unknown_account(password: &str) -> AuthError {
    if let Some(hash) = UNKNOWN_ACCOUNT_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
    AuthError::InvalidCredentials
}

/// A fresh reset token and the hash to store for it.
fn generate_reset_token() -> (String, String) {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_reset_token(&token);
    (token, hash)
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything", "not-a-hash"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_unknown_account_runs_a_real_verification() {
        let hash = UNKNOWN_ACCOUNT_HASH.as_deref().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordHash::new(hash).is_ok());
        assert!(matches!(
            reject_unknown_account("hunter22"),
            AuthError::InvalidCredentials
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("eightchr").is_ok());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_reset_tokens_are_unique_and_hashed() {
        let (a, a_hash) = generate_reset_token();
        let (b, _) = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a_hash, hash_reset_token(&a));
        assert_eq!(a_hash.len(), 64);
        assert!(!a.contains('='));
    }
}
