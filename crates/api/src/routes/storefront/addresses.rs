//! Customer address book handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use tracing::instrument;

use vastra_core::AddressId;

use crate::db::AddressRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{Address, AddressInput};
use crate::routes::not_found;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/addresses", get(list).post(create))
        .route("/addresses/{id}", put(update).delete(remove))
}

fn validate(input: AddressInput) -> Result<AddressInput> {
    input
        .normalized()
        .map_err(|field| AppError::BadRequest(format!("{field} is required")))
}

#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn list(
    State(state): State<AppState>,
    auth: RequireCustomer,
) -> Result<Json<Vec<Address>>> {
    let addresses = AddressRepository::new(state.pool())
        .list(auth.customer.id)
        .await?;
    Ok(Json(addresses))
}

#[instrument(skip(state, auth, body), fields(customer_id = %auth.customer.id))]
pub async fn create(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Address>)> {
    let input = validate(body)?;
    let address = AddressRepository::new(state.pool())
        .create(auth.customer.id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

#[instrument(skip(state, auth, body), fields(customer_id = %auth.customer.id))]
pub async fn update(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> Result<Json<Address>> {
    let input = validate(body)?;
    let address = AddressRepository::new(state.pool())
        .update(auth.customer.id, id, &input)
        .await
        .map_err(not_found("Address"))?;
    Ok(Json(address))
}

/// Soft-delete an address. Orders keep their own copy.
#[instrument(skip(state, auth), fields(customer_id = %auth.customer.id))]
pub async fn remove(
    State(state): State<AppState>,
    auth: RequireCustomer,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    AddressRepository::new(state.pool())
        .soft_delete(auth.customer.id, id)
        .await
        .map_err(not_found("Address"))?;
    Ok(StatusCode::NO_CONTENT)
}
