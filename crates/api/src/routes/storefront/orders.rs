//! Checkout and order history handlers.
//!
//! Placing an order creates a pending order and a gateway order; the client
//! then collects payment with the returned widget fields and posts the
//! gateway's callback to `/orders/verify-payment`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use vastra_core::{AddressId, OrderId, SizeId};

use crate::db::{OrderRepository, Page, Pagination};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Order, OrderDetail};
use crate::routes::not_found;
use crate::services::{OrderService, OrderSource};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list).post(create))
        .route("/orders/verify-payment", post(verify_payment))
        .route("/orders/{id}", get(detail))
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub is_buy_now: bool,
    pub product_size_id: Option<SizeId>,
    pub address_id: AddressId,
}

impl CreateOrderRequest {
    fn source(&self) -> Result<OrderSource> {
        match (self.is_buy_now, self.product_size_id) {
            (true, Some(size_id)) => Ok(OrderSource::BuyNow(size_id)),
            (true, None) => Err(AppError::BadRequest(
                "product_size_id is required for buy now".to_owned(),
            )),
            (false, _) => Ok(OrderSource::Cart),
        }
    }
}

/// Everything the payment widget needs to open.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order_id: OrderId,
    pub gateway_order_id: String,
    pub key_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

/// Gateway callback fields, accepted under either naming.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

fn order_service(state: &AppState) -> OrderService<'_> {
    OrderService::new(
        state.pool(),
        state.gateway(),
        state.config().tax_rate_percent,
        state.media_base_url(),
    )
}

#[instrument(skip(state, auth, body), fields(customer_id = %auth.customer.id))]
pub async fn create(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    let source = body.source()?;
    let placed = order_service(&state)
        .create_order(auth.customer.id, source, body.address_id)
        .await?;

    let customer = auth.customer;
    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id: placed.order.id,
            gateway_order_id: placed.order.gateway_order_id,
            key_id: state.gateway().key_id().to_owned(),
            amount: placed.amount,
            currency: placed.order.currency,
            name: customer.name,
            email: customer.email.to_string(),
            phone: customer.phone,
            message: placed.message,
        }),
    ))
}

#[instrument(skip(state, auth, body), fields(customer_id = %auth.customer.id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<Order>> {
    let order = order_service(&state)
        .verify_payment(
            auth.customer.id,
            body.gateway_order_id.trim(),
            body.payment_id.trim(),
            body.signature.trim(),
        )
        .await?;
    Ok(Json(order))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn list(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Order>>> {
    let page = OrderRepository::new(state.pool())
        .list_for_customer(auth.customer.id, pagination)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn detail(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderRepository::new(state.pool())
        .get_for_customer(auth.customer.id, id)
        .await
        .map_err(not_found("Order"))?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::{request, test_app};

    fn body(value: serde_json::Value) -> CreateOrderRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_order_source() {
        let cart = body(json!({ "address_id": 1 }));
        assert_eq!(cart.source().unwrap(), OrderSource::Cart);

        let buy_now = body(json!({ "is_buy_now": true, "product_size_id": 7, "address_id": 1 }));
        assert_eq!(
            buy_now.source().unwrap(),
            OrderSource::BuyNow(SizeId::new(7))
        );

        let missing = body(json!({ "is_buy_now": true, "address_id": 1 }));
        assert_eq!(missing.source().unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_verify_payment_accepts_gateway_names() {
        let body: VerifyPaymentRequest = serde_json::from_value(json!({
            "razorpay_payment_id": "pay_1",
            "razorpay_order_id": "order_1",
            "razorpay_signature": "ab",
        }))
        .unwrap();
        assert_eq!(body.payment_id, "pay_1");
        assert_eq!(body.gateway_order_id, "order_1");
        assert_eq!(body.signature, "ab");
    }

    #[tokio::test]
    async fn test_orders_require_customer_token() {
        let response = test_app()
            .oneshot(request("POST", "/api/orders", Some(json!({ "address_id": 1 }))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
