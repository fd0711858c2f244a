//! Payment gateway client.
//!
//! Razorpay-style REST API: orders are created server-side for an amount in
//! minor units, the customer pays in the gateway's widget, and the client
//! posts back `(order_id, payment_id, signature)` where the signature is
//! `hex(HMAC-SHA256(key_secret, "<order_id>|<payment_id>"))`.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::instrument;

use crate::config::PaymentConfig;

type HmacSha256 = Hmac<Sha256>;

/// Gateway request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Prefix of gateway payment ids.
pub const PAYMENT_ID_PREFIX: &str = "pay_";

/// Prefix of gateway order ids.
pub const ORDER_ID_PREFIX: &str = "order_";

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with a non-success status.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Gateway answered with something we can't use.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),

    /// Payment or order id without the gateway prefix.
    #[error("invalid payment identifiers")]
    InvalidIdentifiers,

    /// Signature mismatch.
    #[error("Invalid payment source")]
    InvalidSignature,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// An order created on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

/// Client for the payment gateway.
#[derive(Clone)]
pub struct PaymentGateway {
    inner: Arc<PaymentGatewayInner>,
}

struct PaymentGatewayInner {
    client: reqwest::Client,
    orders_url: String,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateway")
            .field("orders_url", &self.inner.orders_url)
            .field("key_id", &self.inner.key_id)
            .finish_non_exhaustive()
    }
}

impl PaymentGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(PaymentGatewayInner {
                client,
                orders_url: format!("{}/v1/orders", config.api_base.trim_end_matches('/')),
                key_id: config.key_id.clone(),
                key_secret: config.key_secret.clone(),
            }),
        })
    }

    /// Public key id the payment widget needs.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.inner.key_id
    }

    /// Create a gateway order for `amount` minor units.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` on transport failure or timeout,
    /// `PaymentError::Status` on a non-success answer, and
    /// `PaymentError::InvalidResponse` if the body can't be used.
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let response = self
            .inner
            .client
            .post(&self.inner.orders_url)
            .basic_auth(
                &self.inner.key_id,
                Some(self.inner.key_secret.expose_secret()),
            )
            .json(&CreateOrderRequest {
                amount,
                currency,
                receipt,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(e.to_string()))?;
        if !order.id.starts_with(ORDER_ID_PREFIX) {
            return Err(PaymentError::InvalidResponse(format!(
                "unexpected order id {}",
                order.id
            )));
        }

        tracing::debug!(gateway_order_id = %order.id, "Gateway order created");
        Ok(order)
    }

    /// Check a payment callback's identifiers and signature.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidIdentifiers` if either id lacks its
    /// gateway prefix, `PaymentError::InvalidSignature` on mismatch.
    pub fn verify_signature(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<(), PaymentError> {
        verify_signature(
            self.inner.key_secret.expose_secret().as_bytes(),
            order_id,
            payment_id,
            signature,
        )
    }
}

/// Compute the signature the gateway attaches to a successful payment.
///
/// # Errors
///
/// Returns `PaymentError::InvalidSignature` if the MAC can't be keyed.
pub fn sign_payment(secret: &[u8], order_id: &str, payment_id: &str) -> Result<String, PaymentError> {
    let mac = payment_mac(secret, order_id, payment_id)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check identifiers and signature of a payment callback.
///
/// # Errors
///
/// See [`PaymentGateway::verify_signature`].
pub fn verify_signature(
    secret: &[u8],
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<(), PaymentError> {
    if !order_id.starts_with(ORDER_ID_PREFIX) || !payment_id.starts_with(PAYMENT_ID_PREFIX) {
        return Err(PaymentError::InvalidIdentifiers);
    }

    let expected = hex::decode(signature).map_err(|_| PaymentError::InvalidSignature)?;
    payment_mac(secret, order_id, payment_id)?
        .verify_slice(&expected)
        .map_err(|_| PaymentError::InvalidSignature)
}

fn payment_mac(secret: &[u8], order_id: &str, payment_id: &str) -> Result<HmacSha256, PaymentError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Ok(mac)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{basic_auth, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const SECRET: &str = "gateway_test_secret";

    fn gateway(api_base: &str) -> PaymentGateway {
        PaymentGateway::new(&PaymentConfig {
            api_base: api_base.to_owned(),
            key_id: "rzp_test_key".to_owned(),
            key_secret: SecretString::from(SECRET),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_order_posts_amount_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", SECRET))
            .and(body_json(serde_json::json!({
                "amount": 105_000,
                "currency": "INR",
                "receipt": "r-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_ABC123",
                "entity": "order",
                "amount": 105_000,
                "currency": "INR",
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = gateway(&server.uri())
            .create_order(105_000, "INR", "r-1")
            .await
            .unwrap();
        assert_eq!(order.id, "order_ABC123");
        assert_eq!(order.amount, 105_000);
        assert_eq!(order.status, "created");
    }

    #[tokio::test]
    async fn test_create_order_surfaces_gateway_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = gateway(&server.uri())
            .create_order(100, "INR", "r-2")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_create_order_rejects_unusable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = gateway(&server.uri())
            .create_order(100, "INR", "r-3")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidResponse(_)));
    }

    #[test]
    fn test_signature_matches_gateway_contract() {
        let signature = sign_payment(SECRET.as_bytes(), "order_1", "pay_1").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(SECRET.as_bytes(), "order_1", "pay_1", &signature).is_ok());
    }

    #[test]
    fn test_signature_mismatch_rejected() {
        let signature = sign_payment(SECRET.as_bytes(), "order_1", "pay_1").unwrap();
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), "order_1", "pay_2", &signature),
            Err(PaymentError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(b"other", "order_1", "pay_1", &signature),
            Err(PaymentError::InvalidSignature)
        ));
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), "order_1", "pay_1", "zz-not-hex"),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_identifier_prefixes_required() {
        let signature = sign_payment(SECRET.as_bytes(), "1", "pay_1").unwrap();
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), "1", "pay_1", &signature),
            Err(PaymentError::InvalidIdentifiers)
        ));
        assert!(matches!(
            verify_signature(SECRET.as_bytes(), "order_1", "1", "00"),
            Err(PaymentError::InvalidIdentifiers)
        ));
    }

    #[test]
    fn test_gateway_order_url_trims_trailing_slash() {
        let gw = gateway("http://127.0.0.1:9/");
        assert_eq!(gw.inner.orders_url, "http://127.0.0.1:9/v1/orders");
        assert_eq!(gw.key_id(), "rzp_test_key");
    }
}
