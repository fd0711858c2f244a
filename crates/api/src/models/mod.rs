//! Domain models returned by repositories and serialized by handlers.
//!
//! These types are separate from the internal sqlx row types in `db`.

pub mod address;
pub mod audit;
pub mod cart;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod panel_user;
pub mod report;
pub mod role;

pub use address::{Address, AddressInput, AddressSnapshot};
pub use audit::AuditLogEntry;
pub use cart::{CartLine, CartView, WishlistLine};
pub use catalog::{
    Category, ColourDetail, Image, ProductDetail, ProductSummary, Size,
};
pub use customer::Customer;
pub use order::{Order, OrderDetail, OrderLine};
pub use panel_user::PanelUser;
pub use report::{DailySales, SalesSummary, TopProduct};
pub use role::{Permission, Role};

/// Build the public URL of a stored media path.
#[must_use]
pub fn media_url(media_base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        media_base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url_joins_with_single_slash() {
        assert_eq!(
            media_url("http://cdn.test/media/", "/products/1/2/a.png"),
            "http://cdn.test/media/products/1/2/a.png"
        );
        assert_eq!(
            media_url("http://cdn.test/media", "products/1/2/a.png"),
            "http://cdn.test/media/products/1/2/a.png"
        );
    }
}
