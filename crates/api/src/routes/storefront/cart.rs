//! Cart and wishlist handlers.
//!
//! Adding a line only requires the SKU to be visible; stock is checked at
//! checkout, where unavailable lines are dropped.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::Deserialize;
use tracing::instrument;

use vastra_core::SizeId;

use crate::db::{CartRepository, SizeRepository, WishlistRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{CartView, WishlistLine};
use crate::routes::not_found;
use crate::state::AppState;

/// Most units of one SKU a single add may request.
pub const MAX_ADD_QUANTITY: u32 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart).post(add_to_cart))
        .route(
            "/cart/{product_size_id}",
            put(update_cart_line).delete(remove_cart_line),
        )
        .route("/wishlist", get(view_wishlist).post(add_to_wishlist))
        .route("/wishlist/{product_size_id}", delete(remove_from_wishlist))
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_size_id: SizeId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct AddToWishlistRequest {
    pub product_size_id: SizeId,
}

/// Fail with 404 unless the SKU and everything above it is active.
async fn ensure_visible(state: &AppState, size_id: SizeId, quantity: u32) -> Result<()> {
    let candidate = SizeRepository::new(state.pool())
        .candidate(size_id, quantity)
        .await?;
    match candidate {
        Some(c) if c.visible => Ok(()),
        _ => Err(AppError::NotFound("Product not found".to_owned())),
    }
}

// =============================================================================
// Cart
// =============================================================================

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn view_cart(
    State(state): State<AppState>,
    auth: RequireCustomer,
) -> Result<Json<CartView>> {
    let cart = CartRepository::new(state.pool(), state.media_base_url())
        .view(auth.customer.id)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Json(body): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    if !(1..=MAX_ADD_QUANTITY).contains(&body.quantity) {
        return Err(AppError::BadRequest(format!(
            "quantity must be between 1 and {MAX_ADD_QUANTITY}"
        )));
    }
    ensure_visible(&state, body.product_size_id, body.quantity).await?;

    let cart = CartRepository::new(state.pool(), state.media_base_url());
    let quantity = i32::try_from(body.quantity)
        .map_err(|_| AppError::BadRequest("quantity out of range".to_owned()))?;
    cart.add(auth.customer.id, body.product_size_id, quantity)
        .await?;

    Ok(Json(cart.view(auth.customer.id).await?))
}

/// Set a line's quantity; zero or less removes the line.
#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn update_cart_line(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(product_size_id): Path<SizeId>,
    Json(body): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let cart = CartRepository::new(state.pool(), state.media_base_url());
    cart.set_quantity(auth.customer.id, product_size_id, body.quantity)
        .await
        .map_err(not_found("Cart item"))?;

    Ok(Json(cart.view(auth.customer.id).await?))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn remove_cart_line(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(product_size_id): Path<SizeId>,
) -> Result<StatusCode> {
    CartRepository::new(state.pool(), state.media_base_url())
        .remove(auth.customer.id, product_size_id)
        .await
        .map_err(not_found("Cart item"))?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Wishlist
// =============================================================================

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn view_wishlist(
    State(state): State<AppState>,
    auth: RequireCustomer,
) -> Result<Json<Vec<WishlistLine>>> {
    let lines = WishlistRepository::new(state.pool(), state.media_base_url())
        .view(auth.customer.id)
        .await?;
    Ok(Json(lines))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Json(body): Json<AddToWishlistRequest>,
) -> Result<Json<Vec<WishlistLine>>> {
    ensure_visible(&state, body.product_size_id, 1).await?;

    let wishlist = WishlistRepository::new(state.pool(), state.media_base_url());
    wishlist.add(auth.customer.id, body.product_size_id).await?;
    Ok(Json(wishlist.view(auth.customer.id).await?))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(product_size_id): Path<SizeId>,
) -> Result<StatusCode> {
    WishlistRepository::new(state.pool(), state.media_base_url())
        .remove(auth.customer.id, product_size_id)
        .await
        .map_err(not_found("Wishlist item"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::{request, test_app};

    #[test]
    fn test_add_defaults_to_one_unit() {
        let body: AddToCartRequest =
            serde_json::from_value(serde_json::json!({ "product_size_id": 4 })).unwrap();
        assert_eq!(body.quantity, 1);
        assert_eq!(body.product_size_id, SizeId::new(4));
    }

    #[tokio::test]
    async fn test_cart_requires_customer_token() {
        let response = test_app()
            .oneshot(request("GET", "/api/cart", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
