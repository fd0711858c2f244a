//! Storefront catalog handlers. Only active rows are visible here.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use vastra_core::{CategoryId, ProductId};

use crate::db::products::{ProductFilter, Visibility};
use crate::db::{CategoryRepository, Page, Pagination, ProductRepository};
use crate::error::Result;
use crate::models::{Category, ProductDetail, ProductSummary};
use crate::routes::not_found;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(categories))
        .route("/products", get(products))
        .route("/products/{id}", get(product))
}

/// `?category_id=&q=` product filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub q: Option<String>,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category_id: query.category_id,
            query: query
                .q
                .map(|q| q.trim().to_owned())
                .filter(|q| !q.is_empty()),
        }
    }
}

#[instrument(skip(state))]
pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list_active().await?;
    Ok(Json(categories))
}

#[instrument(skip(state))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Page<ProductSummary>>> {
    let page = ProductRepository::new(state.pool(), state.media_base_url())
        .list(Visibility::Storefront, &query.into(), pagination)
        .await?;
    Ok(Json(page))
}

#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let detail = ProductRepository::new(state.pool(), state.media_base_url())
        .get_detail(Visibility::Storefront, id)
        .await
        .map_err(not_found("Product"))?;
    Ok(Json(detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ProductFilter::from(ProductQuery {
            category_id: Some(CategoryId::new(2)),
            q: Some("   ".to_owned()),
        });
        assert_eq!(filter.category_id, Some(CategoryId::new(2)));
        assert!(filter.query.is_none());
    }
}
