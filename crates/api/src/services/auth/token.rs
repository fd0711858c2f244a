//! Bearer tokens.
//!
//! Tokens are HS256 JWTs whose audience names the principal kind, so a
//! customer token is rejected by the admin API and vice versa. Every token
//! carries a `jti` that must also exist in the principal's token table;
//! deleting that row revokes the token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vastra_core::PrincipalKind;

use super::AuthError;
use crate::config::AuthConfig;

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id.
    pub sub: String,
    /// Principal kind audience.
    pub aud: String,
    /// Token id, stored server-side.
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The identity a valid token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub principal_id: i32,
    pub jti: Uuid,
}

/// Signs and verifies bearer tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Sign a new token for a principal.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Jwt` if signing fails.
    pub fn issue(&self, kind: PrincipalKind, principal_id: i32) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let jti = Uuid::new_v4();
        let claims = Claims {
            sub: principal_id.to_string(),
            aud: kind.audience().to_string(),
            jti,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Check a token's signature, expiry and audience.
    ///
    /// Does not check revocation; callers look the `jti` up separately.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` for any invalid token.
    pub fn verify(&self, kind: PrincipalKind, token: &str) -> Result<VerifiedToken, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[kind.audience()]);
        validation.set_required_spec_claims(&["exp", "aud", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AuthError::InvalidToken)?;
        let principal_id = data
            .claims
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(VerifiedToken {
            principal_id,
            jti: data.claims.jti,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn service(ttl_hours: i64) -> TokenService {
        TokenService::new(&AuthConfig {
            jwt_secret: SecretString::from("kP9#vL2$qR7!xM4@nB8&wT1*zC5^hJ3%"),
            token_ttl_hours: ttl_hours,
        })
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service(1);
        let issued = tokens.issue(PrincipalKind::Customer, 42).unwrap();
        let verified = tokens.verify(PrincipalKind::Customer, &issued.token).unwrap();
        assert_eq!(verified.principal_id, 42);
        assert_eq!(verified.jti, issued.jti);
    }

    #[test]
    fn test_audience_separates_principals() {
        let tokens = service(1);
        let customer = tokens.issue(PrincipalKind::Customer, 7).unwrap();
        assert!(matches!(
            tokens.verify(PrincipalKind::Panel, &customer.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        // Past the default 60s leeway.
        let tokens = service(-1);
        let issued = tokens.issue(PrincipalKind::Panel, 1).unwrap();
        assert!(tokens.verify(PrincipalKind::Panel, &issued.token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = service(1).issue(PrincipalKind::Customer, 1).unwrap();
        let other = TokenService::new(&AuthConfig {
            jwt_secret: SecretString::from("Zq8!rT5@pL1#wX9$mN3%bV7^cK2&hG6*"),
            token_ttl_hours: 1,
        });
        assert!(other.verify(PrincipalKind::Customer, &issued.token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            service(1).verify(PrincipalKind::Customer, "not-a-jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
