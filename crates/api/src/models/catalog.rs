//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vastra_core::{CategoryId, ColourId, ImageId, Lifecycle, ProductId, SizeId, StockLevel};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

/// A product as it appears in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub category_name: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub lifecycle: Lifecycle,
    /// Default image of the first colour, if any.
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product with its colour variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductSummary,
    pub colours: Vec<ColourDetail>,
}

/// A colour variant with its images and SKUs.
#[derive(Debug, Clone, Serialize)]
pub struct ColourDetail {
    pub id: ColourId,
    pub product_id: ProductId,
    pub colour: String,
    pub lifecycle: Lifecycle,
    pub images: Vec<Image>,
    pub sizes: Vec<Size>,
}

/// A stored product image.
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: ImageId,
    pub colour_id: ColourId,
    /// Path relative to the upload directory.
    pub path: String,
    pub url: String,
    pub is_default: bool,
    pub position: i32,
}

/// A SKU with its stock counters.
#[derive(Debug, Clone, Serialize)]
pub struct Size {
    pub id: SizeId,
    pub colour_id: ColourId,
    pub size: String,
    pub quantity: i32,
    pub sold: i32,
    pub available: u32,
    pub lifecycle: Lifecycle,
}

impl Size {
    #[must_use]
    pub fn new(
        id: SizeId,
        colour_id: ColourId,
        size: String,
        stock: StockLevel,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            id,
            colour_id,
            size,
            quantity: stock.quantity(),
            sold: stock.sold(),
            available: stock.available(),
            lifecycle,
        }
    }
}
