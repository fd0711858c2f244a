//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `PAYMENT_KEY_ID` - Payment gateway key id (also sent to the client widget)
//! - `PAYMENT_KEY_SECRET` - Payment gateway key secret (signature verification)
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 8080)
//! - `PUBLIC_BASE_URL` - Public URL of the API (default: `http://localhost:8080`)
//! - `MEDIA_BASE_URL` - Prefix for image URLs (default: `<PUBLIC_BASE_URL>/media`)
//! - `UPLOAD_DIR` - Directory for uploaded images (default: uploads)
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated list of allowed origins
//! - `TOKEN_TTL_HOURS` - Login token lifetime, 1 to 8760 (default: 168)
//! - `PAYMENT_API_BASE` - Gateway base URL (default: `https://api.razorpay.com`)
//! - `TAX_RATE_PERCENT` - Tax applied at checkout (default: 5)
//! - `RATE_LIMIT_AUTH_PER_SECOND` / `RATE_LIMIT_AUTH_BURST` - Auth endpoints (default: 6 / 5)
//! - `RATE_LIMIT_API_PER_SECOND` / `RATE_LIMIT_API_BURST` - Other endpoints (default: 1 / 50)
//! - `RATE_LIMIT_TRUST_PROXY_HEADERS` - Key limits on `X-Forwarded-For` and friends
//!   instead of the peer address; only behind a reverse proxy (default: false)
//! - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM` - Mail delivery
//! - `LOG_FORMAT` - `pretty` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use vastra_core::pricing::DEFAULT_TAX_RATE_PERCENT;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 8760;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the API
    pub public_base_url: String,
    /// Prefix prepended to stored image paths
    pub media_base_url: String,
    /// Directory uploaded images are written to
    pub upload_dir: PathBuf,
    /// Origins allowed by CORS (empty = same-origin only)
    pub cors_allowed_origins: Vec<String>,
    /// Token signing and lifetime
    pub auth: AuthConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Tax rate applied at checkout, in percent
    pub tax_rate_percent: Decimal,
    /// Per-IP rate limits
    pub rate_limit: RateLimitConfig,
    /// SMTP settings; `None` logs password reset links instead of mailing them
    pub email: Option<EmailConfig>,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Token issuance configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub token_ttl_hours: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Gateway REST base URL
    pub api_base: String,
    /// Public key id (handed to the payment widget)
    pub key_id: String,
    /// Key secret used for basic auth and signature verification
    pub key_secret: SecretString,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

/// Token-bucket settings per route group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Seconds to replenish one auth request
    pub auth_per_second: u64,
    pub auth_burst: u32,
    /// Seconds to replenish one API request
    pub api_per_second: u64,
    pub api_burst: u32,
    /// Key on proxy headers rather than the peer address
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_per_second: 6,
            auth_burst: 5,
            api_per_second: 1,
            api_burst: 50,
            trust_proxy_headers: false,
        }
    }
}

/// SMTP configuration for transactional email.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_required_secret("DATABASE_URL")?;
        let host = parse_env("API_HOST", "127.0.0.1")?;
        let port = parse_env("API_PORT", "8080")?;
        let public_base_url = get_env_or_default("PUBLIC_BASE_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("PUBLIC_BASE_URL".to_string(), e.to_string())
        })?;
        let media_base_url = get_optional_env("MEDIA_BASE_URL")
            .map_or_else(|| format!("{public_base_url}/media"), |v| {
                v.trim_end_matches('/').to_string()
            });
        let upload_dir = PathBuf::from(get_env_or_default("UPLOAD_DIR", "uploads"));
        let cors_allowed_origins =
            parse_origins(&get_env_or_default("CORS_ALLOWED_ORIGINS", ""));

        let auth = AuthConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;

        let tax_rate_percent = match get_optional_env("TAX_RATE_PERCENT") {
            Some(v) => parse_tax_rate(&v)?,
            None => DEFAULT_TAX_RATE_PERCENT,
        };

        let rate_limit = RateLimitConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let log_format = match get_env_or_default("LOG_FORMAT", "pretty").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'pretty' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            public_base_url,
            media_base_url,
            upload_dir,
            cors_allowed_origins,
            auth,
            payment,
            tax_rate_percent,
            rate_limit,
            email,
            log_format,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl AuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "JWT_SECRET")?;
        let token_ttl_hours = parse_token_ttl(&get_env_or_default("TOKEN_TTL_HOURS", "168"))?;
        Ok(Self {
            jwt_secret,
            token_ttl_hours,
        })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: get_env_or_default("PAYMENT_API_BASE", "https://api.razorpay.com")
                .trim_end_matches('/')
                .to_string(),
            key_id: get_required_env("PAYMENT_KEY_ID")?,
            key_secret: get_required_secret("PAYMENT_KEY_SECRET")?,
        })
    }
}

impl RateLimitConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            auth_per_second: parse_env(
                "RATE_LIMIT_AUTH_PER_SECOND",
                &defaults.auth_per_second.to_string(),
            )?,
            auth_burst: parse_env("RATE_LIMIT_AUTH_BURST", &defaults.auth_burst.to_string())?,
            api_per_second: parse_env(
                "RATE_LIMIT_API_PER_SECOND",
                &defaults.api_per_second.to_string(),
            )?,
            api_burst: parse_env("RATE_LIMIT_API_BURST", &defaults.api_burst.to_string())?,
            trust_proxy_headers: parse_env("RATE_LIMIT_TRUST_PROXY_HEADERS", "false")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Governor rejects zero periods and bursts.
    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("RATE_LIMIT_AUTH_PER_SECOND", self.auth_per_second == 0),
            ("RATE_LIMIT_AUTH_BURST", self.auth_burst == 0),
            ("RATE_LIMIT_API_PER_SECOND", self.api_per_second == 0),
            ("RATE_LIMIT_API_BURST", self.api_burst == 0),
        ];
        for (key, is_zero) in checks {
            if is_zero {
                return Err(ConfigError::InvalidEnvVar(
                    key.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl EmailConfig {
    /// Mail is optional: present only when `SMTP_HOST` is set.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };
        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable (empty counts as unset).
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Split a comma-separated origin list, dropping blanks and trailing slashes.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Token lifetime in hours, `1..=8760`.
fn parse_token_ttl(raw: &str) -> Result<i64, ConfigError> {
    let hours = raw
        .trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidEnvVar("TOKEN_TTL_HOURS".to_string(), e.to_string()))?;
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        return Err(ConfigError::InvalidEnvVar(
            "TOKEN_TTL_HOURS".to_string(),
            format!("must be between 1 and {MAX_TOKEN_TTL_HOURS} (got {hours})"),
        ));
    }
    Ok(hours)
}

/// Tax rate must be a percentage in `[0, 100]`.
fn parse_tax_rate(raw: &str) -> Result<Decimal, ConfigError> {
    let rate = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar("TAX_RATE_PERCENT".to_string(), e.to_string()))?;
    if rate.is_sign_negative() || rate > Decimal::ONE_HUNDRED {
        return Err(ConfigError::InvalidEnvVar(
            "TAX_RATE_PERCENT".to_string(),
            format!("must be between 0 and 100 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    /// A complete configuration for tests that need an `AppState`.
    pub(crate) fn test_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/vastra_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            media_base_url: "http://localhost:8080/media".to_string(),
            upload_dir: std::env::temp_dir().join("vastra-test-uploads"),
            cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            auth: AuthConfig {
                jwt_secret: SecretString::from("kP9#vL2$qR7!xM4@nB8&wT1*zC5^hJ3%"),
                token_ttl_hours: 24,
            },
            payment: PaymentConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                key_id: "rzp_test_key".to_string(),
                key_secret: SecretString::from("gateway_test_secret"),
            },
            tax_rate_percent: DEFAULT_TAX_RATE_PERCENT,
            rate_limit: RateLimitConfig::default(),
            email: None,
            log_format: LogFormat::Pretty,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-jwt-secret-here", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins(" https://shop.example.in/, https://admin.example.in ,,"),
            vec![
                "https://shop.example.in".to_string(),
                "https://admin.example.in".to_string()
            ]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn test_parse_tax_rate_bounds() {
        assert_eq!(parse_tax_rate("18").unwrap(), Decimal::from(18));
        assert!(parse_tax_rate("-1").is_err());
        assert!(parse_tax_rate("101").is_err());
        assert!(parse_tax_rate("five").is_err());
    }

    #[test]
    fn test_parse_token_ttl_bounds() {
        assert_eq!(parse_token_ttl(" 168 ").unwrap(), 168);
        assert_eq!(parse_token_ttl("8760").unwrap(), 8760);
        assert!(parse_token_ttl("0").is_err());
        assert!(parse_token_ttl("-5").is_err());
        assert!(parse_token_ttl("8761").is_err());
        assert!(parse_token_ttl("9223372036854775807").is_err());
        assert!(parse_token_ttl("week").is_err());
    }

    #[test]
    fn test_rate_limit_rejects_zero() {
        let config = RateLimitConfig {
            api_burst: 0,
            ..RateLimitConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RateLimitConfig::default().validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = test_config();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("rzp_test_key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("gateway_test_secret"));
        assert!(!debug_output.contains("kP9#vL2$"));
    }
}
