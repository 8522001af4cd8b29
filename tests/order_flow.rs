//! Service-level flows over the in-memory backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use totem_orders::domain::aggregates::{
    OrderStatus, Payment, PaymentDecision, PaymentStatus, TimerStatus,
};
use totem_orders::domain::value_objects::{Money, Quantity};
use totem_orders::error::ServiceError;
use totem_orders::gateway::SandboxGateway;
use totem_orders::services::{CartService, CheckoutService, EventPublisher, KitchenService};
use totem_orders::stores::memory::MemoryBackend;
use totem_orders::stores::{CatalogProduct, Customer, PaymentStore, Stores};

struct Harness {
    backend: MemoryBackend,
    carts: CartService,
    checkout: CheckoutService,
    kitchen: KitchenService,
}

fn harness_with(strict_amount_check: bool) -> Harness {
    let backend = MemoryBackend::new(None);
    let stores = Stores::in_memory(backend.clone());
    let gateway = Arc::new(SandboxGateway::new("https://pay.sandbox.local/qr", 300));
    let events = EventPublisher::disabled();
    Harness {
        backend,
        carts: CartService::new(stores.catalog.clone(), stores.carts.clone()),
        checkout: CheckoutService::new(
            stores.carts.clone(),
            stores.payments.clone(),
            stores.orders.clone(),
            stores.customers.clone(),
            gateway,
            stores.placement.clone(),
            events.clone(),
            strict_amount_check,
        ),
        kitchen: KitchenService::new(stores.orders.clone(), stores.placement.clone(), events),
    }
}

fn harness() -> Harness {
    harness_with(false)
}

fn money(cents: i64) -> Money {
    Money::new(Decimal::new(cents, 2))
}

fn seed_product(backend: &MemoryBackend, price_cents: i64, stock: u32) -> Uuid {
    let id = Uuid::new_v4();
    backend.insert_product(CatalogProduct {
        id,
        name: "X-Burger".into(),
        category: Some("Lanche".into()),
        price: money(price_cents),
        stock: Quantity::new(stock),
        purchasable: true,
    });
    id
}

/// Add, confirm, checkout, and approve: returns the approved payment id.
async fn approved_checkout(h: &Harness, session: &str, amount: Money) -> Uuid {
    h.carts.confirm(session).await.unwrap();
    let qr = h.checkout.request_checkout(session, amount).await.unwrap();
    h.checkout
        .confirm_payment(qr.payment_id, PaymentDecision::Approved, "mp-1", amount, "pix")
        .await
        .unwrap();
    qr.payment_id
}

#[tokio::test]
async fn test_happy_path_scenario() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);

    let added = h.carts.add_item("s1", product, 2, None).await.unwrap();
    assert_eq!(added.cart_subtotal, money(3780));

    h.carts.confirm("s1").await.unwrap();

    let qr = h.checkout.request_checkout("s1", money(3780)).await.unwrap();
    assert!(!qr.qr_url.is_empty());
    let pending = PaymentStore::find(&h.backend, qr.payment_id).await.unwrap().unwrap();
    assert_eq!(pending.status(), PaymentStatus::Pending);

    let approved = h
        .checkout
        .confirm_payment(qr.payment_id, PaymentDecision::Approved, "mp-42", money(3780), "pix")
        .await
        .unwrap();
    assert!(approved);

    let receipt = h.checkout.place_order("s1", qr.payment_id, None).await.unwrap();
    let order = h.kitchen.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::PaymentConfirmed);
    assert_eq!(order.total(), money(3780));
    assert_eq!(order.number(), receipt.order_number);

    assert_eq!(h.backend.product_stock(product), Some(48));
    let view = h.carts.view("s1").await.unwrap();
    assert!(view.items.is_empty());
}

#[tokio::test]
async fn test_place_order_retry_is_idempotent() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 2, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(3780)).await;

    let first = h.checkout.place_order("s1", payment_id, None).await.unwrap();
    let second = h.checkout.place_order("s1", payment_id, None).await.unwrap();
    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.order_number, second.order_number);
    assert_eq!(h.backend.product_stock(product), Some(48));
}

#[tokio::test]
async fn test_insufficient_stock_is_all_or_nothing() {
    let h = harness();
    let plenty = seed_product(&h.backend, 1000, 5);
    let scarce = seed_product(&h.backend, 500, 2);

    h.carts.add_item("s1", plenty, 2, None).await.unwrap();
    h.carts.add_item("s1", scarce, 2, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(3000)).await;

    // Stock drifts after the cart was confirmed: another session takes one.
    h.carts.add_item("s2", scarce, 1, None).await.unwrap();
    let other_payment = approved_checkout(&h, "s2", money(500)).await;
    h.checkout.place_order("s2", other_payment, None).await.unwrap();
    assert_eq!(h.backend.product_stock(scarce), Some(1));

    let err = h.checkout.place_order("s1", payment_id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock { requested: 2, available: 1, .. }));

    // Nothing moved: no order, no decrement on either product, cart intact.
    assert_eq!(h.backend.product_stock(plenty), Some(5));
    assert_eq!(h.backend.product_stock(scarce), Some(1));
    assert_eq!(h.kitchen.list(None).await.unwrap().len(), 1);
    assert_eq!(h.carts.view("s1").await.unwrap().items.len(), 2);
}

#[tokio::test]
async fn test_cancel_restores_stock_once() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 2, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(3780)).await;
    let receipt = h.checkout.place_order("s1", payment_id, None).await.unwrap();
    assert_eq!(h.backend.product_stock(product), Some(48));

    let order = h.kitchen.cancel(receipt.order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Canceled);
    assert_eq!(h.backend.product_stock(product), Some(50));

    // A second cancellation is an illegal transition and must not restore again.
    let err = h.kitchen.cancel(receipt.order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Order(_)));
    assert_eq!(h.backend.product_stock(product), Some(50));
}

#[tokio::test]
async fn test_pickup_from_preparation_is_rejected() {
    let h = harness();
    let product = seed_product(&h.backend, 1000, 10);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(1000)).await;
    let receipt = h.checkout.place_order("s1", payment_id, None).await.unwrap();

    h.kitchen.start_preparing(receipt.order_id).await.unwrap();
    let err = h.kitchen.confirm_pickup(receipt.order_id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Order(_)));
    let order = h.kitchen.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::InPreparation);
}

#[tokio::test]
async fn test_concurrent_placements_get_distinct_numbers() {
    let h = harness();
    let product = seed_product(&h.backend, 1000, 10);

    let mut handles = vec![];
    for i in 0..4 {
        let session = format!("s{i}");
        h.carts.add_item(&session, product, 1, None).await.unwrap();
        let payment_id = approved_checkout(&h, &session, money(1000)).await;
        let checkout = h.checkout.clone();
        handles.push(tokio::spawn(async move {
            checkout.place_order(&session, payment_id, None).await.unwrap()
        }));
    }

    let mut numbers = vec![];
    for handle in handles {
        numbers.push(handle.await.unwrap().order_number);
    }
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 4);
    assert_eq!(h.backend.product_stock(product), Some(6));
}

#[tokio::test]
async fn test_qr_request_is_idempotent_while_pending() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    h.carts.confirm("s1").await.unwrap();

    let first = h.checkout.request_checkout("s1", money(1890)).await.unwrap();
    let second = h.checkout.request_checkout("s1", money(1890)).await.unwrap();
    assert_eq!(first.payment_id, second.payment_id);
    assert_eq!(first.qr_url, second.qr_url);
}

#[tokio::test]
async fn test_checkout_requires_confirmed_cart() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);

    let err = h.checkout.request_checkout("ghost", money(1890)).await.unwrap_err();
    assert!(matches!(err, ServiceError::CartNotFound));

    h.carts.add_item("s1", product, 1, None).await.unwrap();
    let err = h.checkout.request_checkout("s1", money(1890)).await.unwrap_err();
    assert!(matches!(err, ServiceError::CartNotConfirmed));
}

#[tokio::test]
async fn test_resolved_payment_blocks_another_checkout() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    approved_checkout(&h, "s1", money(1890)).await;

    let err = h.checkout.request_checkout("s1", money(1890)).await.unwrap_err();
    assert!(matches!(err, ServiceError::PaymentAlreadyResolved));
}

#[tokio::test]
async fn test_expired_pending_payment_unblocks_checkout() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    h.carts.confirm("s1").await.unwrap();

    let first = h.checkout.request_checkout("s1", money(1890)).await.unwrap();
    let payment = PaymentStore::find(&h.backend, first.payment_id).await.unwrap().unwrap();
    let expired = Payment::restore(
        payment.id(),
        payment.session_id(),
        payment.amount(),
        payment.status(),
        payment.qr().cloned(),
        Some(Utc::now() - Duration::seconds(1)),
        None,
        None,
        None,
        payment.created_at(),
        payment.updated_at(),
    );
    PaymentStore::save(&h.backend, &expired).await.unwrap();

    let renewed = h.checkout.request_checkout("s1", money(1890)).await.unwrap();
    assert_ne!(renewed.payment_id, first.payment_id);
}

#[tokio::test]
async fn test_amount_mismatch_warns_by_default_and_rejects_when_strict() {
    let lenient = harness();
    let product = seed_product(&lenient.backend, 1890, 50);
    lenient.carts.add_item("s1", product, 1, None).await.unwrap();
    lenient.carts.confirm("s1").await.unwrap();
    let qr = lenient.checkout.request_checkout("s1", money(9999)).await.unwrap();
    let payment = PaymentStore::find(&lenient.backend, qr.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.amount(), money(9999));

    let strict = harness_with(true);
    let product = seed_product(&strict.backend, 1890, 50);
    strict.carts.add_item("s1", product, 1, None).await.unwrap();
    strict.carts.confirm("s1").await.unwrap();
    let err = strict.checkout.request_checkout("s1", money(9999)).await.unwrap_err();
    assert!(matches!(err, ServiceError::ClaimedAmountMismatch { .. }));
}

#[tokio::test]
async fn test_webhook_amount_mismatch_leaves_payment_pending() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 2, None).await.unwrap();
    h.carts.confirm("s1").await.unwrap();
    let qr = h.checkout.request_checkout("s1", money(3780)).await.unwrap();

    let err = h
        .checkout
        .confirm_payment(qr.payment_id, PaymentDecision::Approved, "mp-1", money(3779), "pix")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AmountMismatch { .. }));

    let payment = PaymentStore::find(&h.backend, qr.payment_id).await.unwrap().unwrap();
    assert_eq!(payment.status(), PaymentStatus::Pending);
}

#[tokio::test]
async fn test_declined_payment_cannot_place_order() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    h.carts.confirm("s1").await.unwrap();
    let qr = h.checkout.request_checkout("s1", money(1890)).await.unwrap();

    let approved = h
        .checkout
        .confirm_payment(qr.payment_id, PaymentDecision::Declined, "mp-1", money(1890), "pix")
        .await
        .unwrap();
    assert!(!approved);

    let err = h.checkout.place_order("s1", qr.payment_id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::PaymentNotApproved));
    assert_eq!(h.backend.product_stock(product), Some(50));
}

#[tokio::test]
async fn test_place_order_session_mismatch() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(1890)).await;

    let err = h.checkout.place_order("s2", payment_id, None).await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionMismatch));
}

#[tokio::test]
async fn test_customer_reference_is_validated() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    let payment_id = approved_checkout(&h, "s1", money(1890)).await;

    let err = h
        .checkout
        .place_order("s1", payment_id, Some(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CustomerNotFound));

    let customer = Uuid::new_v4();
    h.backend.insert_customer(Customer {
        id: customer,
        name: "Maria".into(),
        email: None,
    });
    let receipt = h.checkout.place_order("s1", payment_id, Some(customer)).await.unwrap();
    let order = h.kitchen.order(receipt.order_id).await.unwrap();
    assert_eq!(order.customer_id(), Some(customer));
}

#[tokio::test]
async fn test_timer_follows_payment_state() {
    let h = harness();
    let product = seed_product(&h.backend, 1890, 50);
    h.carts.add_item("s1", product, 1, None).await.unwrap();
    h.carts.confirm("s1").await.unwrap();
    let qr = h.checkout.request_checkout("s1", money(1890)).await.unwrap();

    assert!(matches!(
        h.checkout.check_timer(qr.payment_id).await.unwrap(),
        TimerStatus::Active { .. }
    ));

    h.checkout
        .confirm_payment(qr.payment_id, PaymentDecision::Declined, "mp-1", money(1890), "pix")
        .await
        .unwrap();
    assert_eq!(h.checkout.check_timer(qr.payment_id).await.unwrap(), TimerStatus::Expired);
}
