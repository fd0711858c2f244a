//! Cart and wishlist projections.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use vastra_core::{ColourId, ProductId, SizeId};

/// One visible cart line.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_size_id: SizeId,
    pub product_id: ProductId,
    pub product_name: String,
    pub colour_id: ColourId,
    pub colour: String,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Units that can currently be ordered.
    pub available: u32,
    pub line_total: Decimal,
    pub image_url: Option<String>,
}

/// A customer's cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub subtotal: Decimal,
}

impl CartView {
    #[must_use]
    pub fn new(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| l.quantity).sum();
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        Self {
            lines,
            item_count,
            subtotal,
        }
    }
}

/// One visible wishlist line.
#[derive(Debug, Clone, Serialize)]
pub struct WishlistLine {
    pub product_size_id: SizeId,
    pub product_id: ProductId,
    pub product_name: String,
    pub colour_id: ColourId,
    pub colour: String,
    pub size: String,
    pub price: Decimal,
    pub available: u32,
    pub image_url: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: i64, quantity: u32) -> CartLine {
        CartLine {
            product_size_id: SizeId::new(1),
            product_id: ProductId::new(1),
            product_name: "Kurta".to_string(),
            colour_id: ColourId::new(1),
            colour: "Indigo".to_string(),
            size: "M".to_string(),
            unit_price: Decimal::from(price),
            quantity,
            available: 10,
            line_total: Decimal::from(price) * Decimal::from(quantity),
            image_url: None,
        }
    }

    #[test]
    fn test_cart_view_sums_lines() {
        let cart = CartView::new(vec![line(500, 2), line(250, 1)]);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.subtotal, Decimal::from(1250));
    }

    #[test]
    fn test_empty_cart() {
        let cart = CartView::new(Vec::new());
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.subtotal, Decimal::ZERO);
    }
}
