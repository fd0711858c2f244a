//! Catalog management: categories, products, colour variants, images and
//! SKUs. Reads see everything not deleted; deletes are soft.
//!
//! Prices are exchanged as decimal strings (`"499.00"`).

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use vastra_core::{CategoryId, ColourId, ImageId, Module, PermissionKey, ProductId, SizeId};

use super::audit;
use crate::db::products::{ProductChanges, Visibility};
use crate::db::{CategoryRepository, Page, Pagination, ProductRepository, SizeRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequirePanelUser;
use crate::models::{Category, ColourDetail, Image, ProductDetail, ProductSummary, Size};
use crate::routes::storefront::catalog::ProductQuery;
use crate::routes::{not_found, optional, required};
use crate::services::storage::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Room for multipart framing around the largest accepted image.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            put(update_category).delete(delete_category),
        )
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/colours", post(create_colour))
        .route("/colours/{id}", put(update_colour).delete(delete_colour))
        .route(
            "/colours/{id}/images",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/images/{id}/default", put(set_default_image))
        .route("/images/{id}", axum::routing::delete(delete_image))
        .route("/colours/{id}/sizes", post(create_size))
        .route("/sizes/{id}", put(update_size).delete(delete_size))
}

fn read(auth: &RequirePanelUser) -> Result<()> {
    auth.require(PermissionKey::read(Module::Products))
}

fn write(auth: &RequirePanelUser, module: Module) -> Result<()> {
    auth.require(PermissionKey::write(module))
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<Category>>> {
    auth.require(PermissionKey::read(Module::Categories))?;
    let page = CategoryRepository::new(state.pool()).list(pagination).await?;
    Ok(Json(page))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_category(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    write(&auth, Module::Categories)?;
    let name = required(&body.name, "name")?;

    let category = CategoryRepository::new(state.pool())
        .create(name, body.description.trim())
        .await?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Categories,
        json!({ "category_id": category.id, "name": category.name }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update_category(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<CategoryId>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>> {
    write(&auth, Module::Categories)?;
    let name = optional(body.name.as_deref(), "name")?;

    let category = CategoryRepository::new(state.pool())
        .update(
            id,
            name,
            body.description.as_deref().map(str::trim),
            body.active,
        )
        .await
        .map_err(not_found("Category"))?;

    audit(
        &state,
        &auth,
        "PUT",
        Module::Categories,
        json!({ "category_id": id, "name": name, "active": body.active }),
    )
    .await;
    Ok(Json(category))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    write(&auth, Module::Categories)?;
    CategoryRepository::new(state.pool())
        .soft_delete(id)
        .await
        .map_err(not_found("Category"))?;

    audit(&state, &auth, "DELETE", Module::Categories, json!({ "category_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub category_id: Option<CategoryId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub active: Option<bool>,
}

/// Prices are positive with at most two decimal places.
fn validate_price(price: Decimal) -> Result<Decimal> {
    if price <= Decimal::ZERO || price != price.round_dp(2) {
        return Err(AppError::BadRequest(
            "price must be positive with at most 2 decimal places".to_owned(),
        ));
    }
    Ok(price.round_dp(2))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn list_products(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(query): Query<ProductQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ProductSummary>>> {
    read(&auth)?;
    let page = ProductRepository::new(state.pool(), state.media_base_url())
        .list(Visibility::Admin, &query.into(), pagination)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn get_product(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    read(&auth)?;
    let product = ProductRepository::new(state.pool(), state.media_base_url())
        .get_detail(Visibility::Admin, id)
        .await
        .map_err(not_found("Product"))?;
    Ok(Json(product))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_product(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductDetail>)> {
    write(&auth, Module::Products)?;
    let name = required(&body.name, "name")?;
    let price = validate_price(body.price)?;

    let product = ProductRepository::new(state.pool(), state.media_base_url())
        .create(body.category_id, name, body.description.trim(), price)
        .await
        .map_err(not_found("Category"))?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Products,
        json!({ "product_id": product.product.id, "name": name, "price": price }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update_product(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateProductRequest>,
) -> Result<Json<ProductDetail>> {
    write(&auth, Module::Products)?;
    let changes = ProductChanges {
        category_id: body.category_id,
        name: optional(body.name.as_deref(), "name")?.map(str::to_owned),
        description: body.description.map(|d| d.trim().to_owned()),
        price: body.price.map(validate_price).transpose()?,
        active: body.active,
    };

    let product = ProductRepository::new(state.pool(), state.media_base_url())
        .update(id, &changes)
        .await
        .map_err(not_found("Product"))?;

    audit(
        &state,
        &auth,
        "PUT",
        Module::Products,
        json!({
            "product_id": id,
            "category_id": changes.category_id,
            "name": changes.name,
            "price": changes.price,
            "active": changes.active,
        }),
    )
    .await;
    Ok(Json(product))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    write(&auth, Module::Products)?;
    ProductRepository::new(state.pool(), state.media_base_url())
        .soft_delete(id)
        .await
        .map_err(not_found("Product"))?;

    audit(&state, &auth, "DELETE", Module::Products, json!({ "product_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Colours and images
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateColourRequest {
    pub colour: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateColourRequest {
    pub colour: Option<String>,
    pub active: Option<bool>,
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_colour(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(product_id): Path<ProductId>,
    Json(body): Json<CreateColourRequest>,
) -> Result<(StatusCode, Json<ColourDetail>)> {
    write(&auth, Module::Products)?;
    let colour = required(&body.colour, "colour")?;

    let created = ProductRepository::new(state.pool(), state.media_base_url())
        .create_colour(product_id, colour)
        .await
        .map_err(not_found("Product"))?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Products,
        json!({ "product_id": product_id, "colour_id": created.id, "colour": colour }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update_colour(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ColourId>,
    Json(body): Json<UpdateColourRequest>,
) -> Result<Json<ProductDetail>> {
    write(&auth, Module::Products)?;
    let colour = optional(body.colour.as_deref(), "colour")?;

    let product = ProductRepository::new(state.pool(), state.media_base_url())
        .update_colour(id, colour, body.active)
        .await
        .map_err(not_found("Colour"))?;

    audit(
        &state,
        &auth,
        "PUT",
        Module::Products,
        json!({ "colour_id": id, "colour": colour, "active": body.active }),
    )
    .await;
    Ok(Json(product))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_colour(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ColourId>,
) -> Result<StatusCode> {
    write(&auth, Module::Products)?;
    ProductRepository::new(state.pool(), state.media_base_url())
        .soft_delete_colour(id)
        .await
        .map_err(not_found("Colour"))?;

    audit(&state, &auth, "DELETE", Module::Products, json!({ "colour_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload one image for a colour as the multipart field `image` (or `file`).
/// The first image of a colour becomes its default.
#[instrument(skip(state, auth, multipart), fields(panel_user_id = %auth.user.id))]
pub async fn upload_image(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(colour_id): Path<ColourId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Image>)> {
    write(&auth, Module::Products)?;
    let products = ProductRepository::new(state.pool(), state.media_base_url());
    let product_id = products
        .colour_product(colour_id)
        .await
        .map_err(not_found("Colour"))?;

    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid upload: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        if !matches!(field.name(), Some("image" | "file")) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(bad_upload)?;

        let path = state
            .storage()
            .store(
                product_id,
                colour_id,
                file_name.as_deref(),
                content_type.as_deref(),
                &bytes,
            )
            .await?;

        let image = match products.add_image(colour_id, &path).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(cleanup) = state.storage().delete(&path).await {
                    tracing::warn!(error = %cleanup, %path, "Failed to remove orphaned upload");
                }
                return Err(not_found("Colour")(e));
            }
        };

        tracing::info!(image_id = %image.id, %colour_id, bytes = bytes.len(), "Image uploaded");
        audit(
            &state,
            &auth,
            "POST",
            Module::Products,
            json!({ "colour_id": colour_id, "image_id": image.id, "path": image.path }),
        )
        .await;
        return Ok((StatusCode::CREATED, Json(image)));
    }

    Err(AppError::BadRequest("image is required".to_owned()))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn set_default_image(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ImageId>,
) -> Result<Json<Image>> {
    write(&auth, Module::Products)?;
    let image = ProductRepository::new(state.pool(), state.media_base_url())
        .set_default_image(id)
        .await
        .map_err(not_found("Image"))?;

    audit(&state, &auth, "PUT", Module::Products, json!({ "image_id": id, "default": true })).await;
    Ok(Json(image))
}

/// Delete an image row and its file.
#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_image(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<ImageId>,
) -> Result<StatusCode> {
    write(&auth, Module::Products)?;
    let path = ProductRepository::new(state.pool(), state.media_base_url())
        .delete_image(id)
        .await
        .map_err(not_found("Image"))?;

    if let Err(e) = state.storage().delete(&path).await {
        tracing::warn!(error = %e, %path, "Failed to remove image file");
    }

    audit(&state, &auth, "DELETE", Module::Products, json!({ "image_id": id, "path": path })).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Sizes
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSizeRequest {
    pub size: String,
    #[serde(default)]
    pub quantity: i32,
}

/// A `quantity` above the current value restocks the SKU. It may never drop
/// below the units already sold.
#[derive(Debug, Deserialize)]
pub struct UpdateSizeRequest {
    pub size: Option<String>,
    pub quantity: Option<i32>,
    pub active: Option<bool>,
}

fn validate_quantity(quantity: i32) -> Result<i32> {
    if quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".to_owned()));
    }
    Ok(quantity)
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn create_size(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(colour_id): Path<ColourId>,
    Json(body): Json<CreateSizeRequest>,
) -> Result<(StatusCode, Json<Size>)> {
    write(&auth, Module::Products)?;
    let size = required(&body.size, "size")?;
    let quantity = validate_quantity(body.quantity)?;

    let created = SizeRepository::new(state.pool())
        .create(colour_id, size, quantity)
        .await
        .map_err(not_found("Colour"))?;

    audit(
        &state,
        &auth,
        "POST",
        Module::Products,
        json!({ "colour_id": colour_id, "size_id": created.id, "size": size, "quantity": quantity }),
    )
    .await;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip(state, auth, body), fields(panel_user_id = %auth.user.id))]
pub async fn update_size(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<SizeId>,
    Json(body): Json<UpdateSizeRequest>,
) -> Result<Json<Size>> {
    write(&auth, Module::Products)?;
    let size = optional(body.size.as_deref(), "size")?;
    let quantity = body.quantity.map(validate_quantity).transpose()?;

    let updated = SizeRepository::new(state.pool())
        .update(id, size, quantity, body.active)
        .await
        .map_err(not_found("Size"))?;

    audit(
        &state,
        &auth,
        "PUT",
        Module::Products,
        json!({ "size_id": id, "size": size, "quantity": quantity, "active": body.active }),
    )
    .await;
    Ok(Json(updated))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn delete_size(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Path(id): Path<SizeId>,
) -> Result<StatusCode> {
    write(&auth, Module::Products)?;
    SizeRepository::new(state.pool())
        .soft_delete(id)
        .await
        .map_err(not_found("Size"))?;

    audit(&state, &auth, "DELETE", Module::Products, json!({ "size_id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_validate_price() {
        let price = |s| Decimal::from_str(s).unwrap();
        assert_eq!(validate_price(price("499")).unwrap(), price("499.00"));
        assert_eq!(validate_price(price("12.50")).unwrap(), price("12.5"));
        assert!(validate_price(price("0")).is_err());
        assert!(validate_price(price("-1")).is_err());
        assert!(validate_price(price("1.005")).is_err());
    }

    #[test]
    fn test_price_is_read_from_string() {
        let body: CreateProductRequest = serde_json::from_value(json!({
            "category_id": 1,
            "name": "Kurta",
            "price": "799.00"
        }))
        .unwrap();
        assert_eq!(body.price, Decimal::from(799));
        assert_eq!(body.description, "");
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity(0).unwrap(), 0);
        assert!(validate_quantity(-3).is_err());
    }
}
