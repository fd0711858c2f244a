//! Catalog rules the schema enforces on its own, whatever the caller.
//!
//! Requires `TEST_DATABASE_URL`. Run with:
//! `cargo test -p vastra-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use uuid::Uuid;

use vastra_api::db::{CategoryRepository, ProductRepository, RepositoryError};
use vastra_integration_tests::TestContext;

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_product_price_must_be_positive() {
    let ctx = TestContext::new().await;
    let category = CategoryRepository::new(&ctx.pool)
        .create(&format!("Category {}", Uuid::new_v4()), "")
        .await
        .unwrap();
    let products = ProductRepository::new(&ctx.pool, "http://media.test");

    for price in [Decimal::ZERO, Decimal::from(-10)] {
        let result = products.create(category.id, "Free Kurta", "", price).await;
        assert!(
            matches!(result, Err(RepositoryError::Conflict(_))),
            "price {price} was accepted"
        );
    }

    let created = products
        .create(category.id, "Cotton Kurta", "", Decimal::new(1, 2))
        .await
        .unwrap();
    assert_eq!(created.product.price, Decimal::new(1, 2));
}
