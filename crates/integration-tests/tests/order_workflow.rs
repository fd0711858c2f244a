//! Order placement and payment settlement against `PostgreSQL`.
//!
//! Requires `TEST_DATABASE_URL`. Run with:
//! `cargo test -p vastra-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use vastra_api::db::{AddressRepository, OrderRepository};
use vastra_api::services::{OrderError, OrderSource};
use vastra_core::{CheckoutError, PaymentStatus};
use vastra_integration_tests::{TestContext, payment_id, signature};

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_last_unit_settles_once() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(500), 1).await;
    let (alice, alice_address) = ctx.customer().await;
    let (bob, bob_address) = ctx.customer().await;

    // Both can order: stock is only taken when payment is settled
    let orders = ctx.orders();
    let first = orders
        .create_order(alice.id, OrderSource::BuyNow(size), alice_address)
        .await
        .unwrap();
    let second = orders
        .create_order(bob.id, OrderSource::BuyNow(size), bob_address)
        .await
        .unwrap();

    let (first_pay, second_pay) = (payment_id(), payment_id());
    let first_sig = signature(&first.order.gateway_order_id, &first_pay);
    let second_sig = signature(&second.order.gateway_order_id, &second_pay);

    let (a, b) = tokio::join!(
        orders.verify_payment(
            alice.id,
            &first.order.gateway_order_id,
            &first_pay,
            &first_sig
        ),
        orders.verify_payment(
            bob.id,
            &second.order.gateway_order_id,
            &second_pay,
            &second_sig
        ),
    );

    assert!(a.is_ok() != b.is_ok(), "exactly one settlement must win");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(OrderError::StockChanged)));

    assert_eq!(ctx.stock(size).await, (1, 1));

    let repo = OrderRepository::new(&ctx.pool);
    let mut statuses = vec![
        repo.get(first.order.id).await.unwrap().order.payment_status,
        repo.get(second.order.id).await.unwrap().order.payment_status,
    ];
    statuses.sort_by_key(ToString::to_string);
    assert_eq!(
        statuses,
        vec![PaymentStatus::Completed, PaymentStatus::RefundRequired]
    );
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_replayed_settlement_is_rejected() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(250), 5).await;
    let (customer, address) = ctx.customer().await;

    let orders = ctx.orders();
    let placed = orders
        .create_order(customer.id, OrderSource::BuyNow(size), address)
        .await
        .unwrap();
    let pay = payment_id();
    let sig = signature(&placed.order.gateway_order_id, &pay);
    let expected = ctx.stock_level(size).await.commit(1).unwrap();

    let paid = orders
        .verify_payment(customer.id, &placed.order.gateway_order_id, &pay, &sig)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Completed);
    assert_eq!(paid.gateway_payment_id.as_deref(), Some(pay.as_str()));
    assert_eq!(ctx.stock_level(size).await, expected);
    assert_eq!(ctx.stock(size).await, (5, 1));

    let replay = orders
        .verify_payment(customer.id, &placed.order.gateway_order_id, &pay, &sig)
        .await;
    assert!(matches!(replay, Err(OrderError::NotPending)));
    assert_eq!(ctx.stock(size).await, (5, 1));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_someone_elses_order_is_not_found() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(100), 3).await;
    let (owner, address) = ctx.customer().await;
    let (intruder, _) = ctx.customer().await;

    let orders = ctx.orders();
    let placed = orders
        .create_order(owner.id, OrderSource::BuyNow(size), address)
        .await
        .unwrap();
    let pay = payment_id();
    let sig = signature(&placed.order.gateway_order_id, &pay);

    let result = orders
        .verify_payment(intruder.id, &placed.order.gateway_order_id, &pay, &sig)
        .await;
    assert!(matches!(result, Err(OrderError::NotPending)));
    assert_eq!(ctx.stock(size).await, (3, 0));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_forged_signature_is_rejected() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(100), 3).await;
    let (customer, address) = ctx.customer().await;

    let orders = ctx.orders();
    let placed = orders
        .create_order(customer.id, OrderSource::BuyNow(size), address)
        .await
        .unwrap();
    let pay = payment_id();
    let wrong = signature(&placed.order.gateway_order_id, "pay_someoneelse");

    let result = orders
        .verify_payment(customer.id, &placed.order.gateway_order_id, &pay, &wrong)
        .await;
    assert!(matches!(result, Err(OrderError::Payment(_))));
    assert_eq!(ctx.stock(size).await, (3, 0));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_cart_order_drops_unavailable_lines() {
    let ctx = TestContext::new().await;
    let in_stock = ctx.sku(Decimal::from(500), 5).await;
    let sold_out = ctx.sku(Decimal::from(900), 0).await;
    let (customer, address) = ctx.customer().await;
    ctx.add_to_cart(&customer, in_stock, 2).await;
    ctx.add_to_cart(&customer, sold_out, 1).await;

    let placed = ctx
        .orders()
        .create_order(customer.id, OrderSource::Cart, address)
        .await
        .unwrap();

    assert!(placed.message.is_some());
    assert!(!placed.order.is_buy_now);
    assert_eq!(placed.order.totals.taxable_amount, Decimal::from(1000));
    assert_eq!(placed.order.totals.tax_amount, Decimal::from(50));
    assert_eq!(placed.order.totals.total_amount, Decimal::from(1050));
    assert_eq!(placed.amount, 105_000);

    let detail = OrderRepository::new(&ctx.pool)
        .get(placed.order.id)
        .await
        .unwrap();
    assert_eq!(detail.lines.len(), 1);
    assert_eq!(detail.lines[0].product_size_id, in_stock);
    assert_eq!(detail.lines[0].quantity, 2);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_empty_cart_is_refused() {
    let ctx = TestContext::new().await;
    let (customer, address) = ctx.customer().await;

    let result = ctx
        .orders()
        .create_order(customer.id, OrderSource::Cart, address)
        .await;
    assert!(matches!(result, Err(OrderError::Checkout(_))));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_order_to_another_customers_address_is_refused() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(300), 2).await;
    let (customer, _) = ctx.customer().await;
    let (_, their_address) = ctx.customer().await;

    let result = ctx
        .orders()
        .create_order(customer.id, OrderSource::BuyNow(size), their_address)
        .await;
    assert!(matches!(result, Err(OrderError::AddressNotFound)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_order_to_deleted_address_is_refused() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(300), 2).await;
    let (customer, address) = ctx.customer().await;
    AddressRepository::new(&ctx.pool)
        .soft_delete(customer.id, address)
        .await
        .unwrap();

    let result = ctx
        .orders()
        .create_order(customer.id, OrderSource::BuyNow(size), address)
        .await;
    assert!(matches!(result, Err(OrderError::AddressNotFound)));
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
async fn test_buy_now_on_inactive_size_is_refused() {
    let ctx = TestContext::new().await;
    let size = ctx.sku(Decimal::from(300), 2).await;
    let (customer, address) = ctx.customer().await;
    ctx.deactivate(size).await;

    let result = ctx
        .orders()
        .create_order(customer.id, OrderSource::BuyNow(size), address)
        .await;
    assert!(matches!(
        result,
        Err(OrderError::Checkout(CheckoutError::OutOfStock))
    ));
    assert_eq!(ctx.stock(size).await, (2, 0));
}
