//! Rate limiting middleware using governor and `tower_governor`.
//!
//! Two limiters, both keyed by client IP and configured from the
//! environment:
//! - `auth_rate_limiter`: strict limits for login, registration and resets
//! - `api_rate_limiter`: relaxed limits for everything else under `/api`
//!
//! The key is the connection's peer address. Forwarding headers are only
//! read when `RATE_LIMIT_TRUST_PROXY_HEADERS` is set, since any client can
//! send them. Rejections go through [`AppError`] so the body is JSON.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// Rejected limiter settings.
#[derive(Debug, thiserror::Error)]
#[error("invalid rate limit: replenish interval and burst must be positive")]
pub struct InvalidRateLimit;

// =============================================================================
// Client IP Key Extractor
// =============================================================================

/// Keys requests on the peer address, or on the proxy-supplied client IP
/// when the deployment sits behind a trusted reverse proxy.
#[derive(Clone, Copy, Debug)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self { trust_proxy_headers }
    }
}

fn forwarded_ip<T>(req: &Request<T>) -> Option<IpAddr> {
    let headers = req.headers();

    // X-Forwarded-For (first IP in the chain)
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_for.or_else(|| {
        CLIENT_IP_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        })
    })
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let forwarded = self.trust_proxy_headers.then(|| forwarded_ip(req)).flatten();
        if let Some(ip) = forwarded {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

// =============================================================================
// Rate Limiter Configuration
// =============================================================================

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Render a governor rejection as an `{"error"}` body, keeping any
/// headers governor attached.
fn rejection(err: GovernorError) -> Response {
    match err {
        GovernorError::TooManyRequests { headers, .. } => {
            let mut response = AppError::RateLimited.into_response();
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => {
            AppError::Internal("client address unavailable".to_owned()).into_response()
        }
        GovernorError::Other { msg, .. } => {
            AppError::Internal(msg.unwrap_or_else(|| "rate limiter error".to_owned()))
                .into_response()
        }
    }
}

fn limiter(
    per_second: u64,
    burst: u32,
    trust_proxy_headers: bool,
) -> Result<RateLimiterLayer, InvalidRateLimit> {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(per_second)
        .burst_size(burst)
        .finish()
        .ok_or(InvalidRateLimit)?;
    Ok(GovernorLayer::new(Arc::new(config)).error_handler(rejection))
}

/// Limiter for auth endpoints. With defaults, one request replenished
/// every 6 seconds and a burst of 5.
///
/// # Errors
///
/// Returns `InvalidRateLimit` if the interval or burst is zero.
pub fn auth_rate_limiter(config: &RateLimitConfig) -> Result<RateLimiterLayer, InvalidRateLimit> {
    limiter(
        config.auth_per_second,
        config.auth_burst,
        config.trust_proxy_headers,
    )
}

/// Limiter for the general API. With defaults, one request replenished
/// every second and a burst of 50.
///
/// # Errors
///
/// Returns `InvalidRateLimit` if the interval or burst is zero.
pub fn api_rate_limiter(config: &RateLimitConfig) -> Result<RateLimiterLayer, InvalidRateLimit> {
    limiter(
        config.api_per_second,
        config.api_burst,
        config.trust_proxy_headers,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use axum::http::StatusCode;
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    fn peer(req: &mut Request<()>, addr: &str) {
        req.extensions_mut()
            .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_proxy_headers_ignored_by_default() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        peer(&mut req, "192.0.2.4:5555");
        assert_eq!(
            ClientIpKeyExtractor::new(false).extract(&req).unwrap(),
            ip("192.0.2.4")
        );
    }

    #[test]
    fn test_forwarded_for_wins_when_trusted() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        peer(&mut req, "10.0.0.1:443");
        assert_eq!(
            ClientIpKeyExtractor::new(true).extract(&req).unwrap(),
            ip("203.0.113.7")
        );
    }

    #[test]
    fn test_trusted_without_headers_uses_peer() {
        let mut req = Request::builder().body(()).unwrap();
        peer(&mut req, "192.0.2.4:5555");
        assert_eq!(
            ClientIpKeyExtractor::new(true).extract(&req).unwrap(),
            ip("192.0.2.4")
        );
    }

    #[test]
    fn test_no_ip_is_an_error() {
        let req = Request::builder()
            .header("x-real-ip", "198.51.100.1")
            .body(())
            .unwrap();
        assert!(ClientIpKeyExtractor::new(false).extract(&req).is_err());
    }

    #[tokio::test]
    async fn test_rejection_is_json() {
        let response = rejection(GovernorError::TooManyRequests {
            wait_time: 3,
            headers: None,
        });
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "Too many requests" }));
    }

    #[test]
    fn test_zero_burst_rejected() {
        let config = RateLimitConfig {
            auth_burst: 0,
            ..RateLimitConfig::default()
        };
        assert!(auth_rate_limiter(&config).is_err());
        assert!(api_rate_limiter(&config).is_ok());
    }
}
