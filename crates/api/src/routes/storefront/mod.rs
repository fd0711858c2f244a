//! Storefront endpoints, authenticated with customer tokens.
//!
//! ```text
//! GET  /api/categories, /api/products, /api/products/{id}   - public
//! POST /api/auth/{register,login,forgot-password,reset-password}
//! POST /api/auth/logout, GET /api/auth/me
//! /api/cart, /api/wishlist, /api/addresses, /api/orders      - customer only
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

use axum::Router;

use crate::state::AppState;

/// Storefront routes other than the public auth endpoints.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(catalog::routes())
        .nest("/auth", auth::session_routes())
        .merge(cart::routes())
        .merge(addresses::routes())
        .merge(orders::routes())
}
