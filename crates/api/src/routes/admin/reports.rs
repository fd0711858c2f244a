//! Sales reports.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use vastra_core::{Module, PermissionKey};

use crate::db::ReportRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequirePanelUser;
use crate::models::{DailySales, SalesSummary, TopProduct};
use crate::state::AppState;

const DEFAULT_TOP_PRODUCTS: i64 = 10;
const MAX_TOP_PRODUCTS: i64 = 50;
const DEFAULT_SALES_DAYS: i32 = 30;
const MAX_SALES_DAYS: i32 = 365;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/summary", get(summary))
        .route("/reports/top-products", get(top_products))
        .route("/reports/sales", get(sales))
}

#[derive(Debug, Default, Deserialize)]
pub struct TopProductsQuery {
    pub limit: Option<i64>,
}

impl TopProductsQuery {
    /// Requested limit clamped to `1..=50`.
    fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_TOP_PRODUCTS)
            .clamp(1, MAX_TOP_PRODUCTS)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub days: Option<i32>,
}

impl SalesQuery {
    fn days(&self) -> Result<i32> {
        let days = self.days.unwrap_or(DEFAULT_SALES_DAYS);
        if !(1..=MAX_SALES_DAYS).contains(&days) {
            return Err(AppError::BadRequest(format!(
                "days must be between 1 and {MAX_SALES_DAYS}"
            )));
        }
        Ok(days)
    }
}

fn require_reports(auth: &RequirePanelUser) -> Result<()> {
    auth.require(PermissionKey::read(Module::Reports))
}

/// Order counts by status, completed revenue, customer and product counts.
#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn summary(
    State(state): State<AppState>,
    auth: RequirePanelUser,
) -> Result<Json<SalesSummary>> {
    require_reports(&auth)?;
    Ok(Json(ReportRepository::new(state.pool()).summary().await?))
}

#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn top_products(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(query): Query<TopProductsQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    require_reports(&auth)?;
    let products = ReportRepository::new(state.pool())
        .top_products(query.limit())
        .await?;
    Ok(Json(products))
}

/// Completed orders and revenue per day over the last `days` days.
#[instrument(skip(state, auth), fields(panel_user_id = %auth.user.id))]
pub async fn sales(
    State(state): State<AppState>,
    auth: RequirePanelUser,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<DailySales>>> {
    require_reports(&auth)?;
    let days = query.days()?;
    let sales = ReportRepository::new(state.pool()).daily_sales(days).await?;
    Ok(Json(sales))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_top_products_limit() {
        assert_eq!(TopProductsQuery::default().limit(), 10);
        assert_eq!(TopProductsQuery { limit: Some(500) }.limit(), 50);
        assert_eq!(TopProductsQuery { limit: Some(0) }.limit(), 1);
    }

    #[test]
    fn test_sales_days_range() {
        assert_eq!(SalesQuery::default().days().unwrap(), 30);
        assert_eq!(SalesQuery { days: Some(365) }.days().unwrap(), 365);
        assert!(SalesQuery { days: Some(0) }.days().is_err());
        assert!(SalesQuery { days: Some(366) }.days().is_err());
    }
}
