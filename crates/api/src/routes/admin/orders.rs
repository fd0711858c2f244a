//! Order browsing for the back office. Orders are read-only here.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use vastra_core::{Module, OrderId, PaymentStatus, PermissionKey};

use crate::db::{OrderRepository, Page, Pagination};
use crate::error::Result;
use crate::middleware::RequirePanelUser;
use crate::models::{Order, OrderDetail};
use crate::routes::not_found;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(detail))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<PaymentStatus>,
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(query): Query<OrderQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Order>>> {
    auth.require(PermissionKey::read(Module::Orders))?;
    let page = OrderRepository::new(state.pool())
        .list(query.status, pagination)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn detail(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    auth.require(PermissionKey::read(Module::Orders))?;
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await
        .map_err(not_found("Order"))?;
    Ok(Json(order))
}
