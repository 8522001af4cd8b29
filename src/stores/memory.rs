//! In-memory backend
//!
//! Default storage when no database is configured, and the backend the test
//! suite runs against. One mutex guards the whole state, which serializes
//! every operation; the placement and cancellation clusters therefore execute
//! atomically without compensation logic.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Order, OrderItem, OrderStatus, Payment, PaymentStatus};
use crate::domain::value_objects::Quantity;

use super::{
    CartStore, CatalogProduct, Customer, CustomerDirectory, OrderStore, PlacedOrder,
    PlacementError, PlacementPlan, PlacementUnit, PaymentStore, ProductCatalog, StoreError,
};

#[derive(Default)]
struct MemoryState {
    products: HashMap<Uuid, CatalogProduct>,
    carts: HashMap<String, Cart>,
    payments: HashMap<Uuid, Payment>,
    orders: HashMap<Uuid, Order>,
    customers: HashMap<Uuid, Customer>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    cart_ttl: Option<Duration>,
}

impl MemoryBackend {
    pub fn new(cart_ttl_secs: Option<i64>) -> Self {
        Self {
            state: Arc::default(),
            cart_ttl: cart_ttl_secs.map(Duration::seconds),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Short critical sections only; a poisoned lock means a prior panic
        // already took the process down in practice.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_product(&self, product: CatalogProduct) {
        self.lock().products.insert(product.id, product);
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.lock().customers.insert(customer.id, customer);
    }

    pub fn product_stock(&self, id: Uuid) -> Option<u32> {
        self.lock().products.get(&id).map(|p| p.stock.value())
    }

    fn next_order_number(orders: &HashMap<Uuid, Order>) -> i64 {
        orders.values().map(Order::number).max().unwrap_or(0) + 1
    }
}

#[async_trait]
impl ProductCatalog for MemoryBackend {
    async fn product(&self, id: Uuid) -> Result<Option<CatalogProduct>, StoreError> {
        Ok(self.lock().products.get(&id).cloned())
    }
}

#[async_trait]
impl CartStore for MemoryBackend {
    async fn find(&self, session_id: &str) -> Result<Option<Cart>, StoreError> {
        let mut state = self.lock();
        if let (Some(ttl), Some(cart)) = (self.cart_ttl, state.carts.get(session_id)) {
            if Utc::now() - cart.updated_at() > ttl {
                state.carts.remove(session_id);
                return Ok(None);
            }
        }
        Ok(state.carts.get(session_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        self.lock().carts.insert(cart.session_id().to_string(), cart.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.lock().carts.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for MemoryBackend {
    async fn find(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.lock().payments.get(&id).cloned())
    }

    async fn find_latest_for_session(&self, session_id: &str) -> Result<Option<Payment>, StoreError> {
        Ok(self
            .lock()
            .payments
            .values()
            .filter(|p| p.session_id() == session_id)
            .max_by_key(|p| p.created_at())
            .cloned())
    }

    async fn save(&self, payment: &Payment) -> Result<(), StoreError> {
        self.lock().payments.insert(payment.id(), payment.clone());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryBackend {
    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(&id).cloned())
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let state = self.lock();
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| status.map_or(true, |s| o.status() == s))
            .cloned()
            .collect();
        orders.sort_by_key(Order::created_at);
        Ok(orders)
    }

    async fn update(&self, order: &Order) -> Result<(), StoreError> {
        self.lock().orders.insert(order.id(), order.clone());
        Ok(())
    }
}

#[async_trait]
impl CustomerDirectory for MemoryBackend {
    async fn find(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.lock().customers.get(&id).cloned())
    }
}

#[async_trait]
impl PlacementUnit for MemoryBackend {
    async fn place(&self, plan: PlacementPlan) -> Result<PlacedOrder, PlacementError> {
        let mut state = self.lock();

        // The checks repeat the service-level ones because only here, under
        // the state lock, are they race-free.
        let mut payment = state
            .payments
            .get(&plan.payment_id)
            .cloned()
            .ok_or(PlacementError::PaymentNotFound)?;
        if let Some(order_id) = payment.order_id() {
            let order = state.orders.get(&order_id).ok_or(PlacementError::OrderNotFound)?;
            return Ok(PlacedOrder { order_id, order_number: order.number() });
        }
        if payment.status() != PaymentStatus::Approved {
            return Err(PlacementError::PaymentNotApproved);
        }

        // Validate every line before touching any stock.
        for line in &plan.lines {
            let product = state
                .products
                .get(&line.product_id)
                .ok_or(PlacementError::ProductNotFound(line.product_id))?;
            if !product.stock.covers(line.quantity) {
                return Err(PlacementError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: product.stock.value(),
                });
            }
        }

        for line in &plan.lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock = product
                    .stock
                    .subtract(line.quantity)
                    .unwrap_or(Quantity::new(0));
            }
        }

        let number = Self::next_order_number(&state.orders);
        let items = plan
            .lines
            .iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                note: line.note.clone(),
            })
            .collect();
        let order = Order::place(number, plan.customer_id, items);
        payment.link_order(order.id())?;

        let placed = PlacedOrder { order_id: order.id(), order_number: order.number() };
        state.orders.insert(order.id(), order);
        state.payments.insert(payment.id(), payment);
        state.carts.remove(&plan.session_id);
        Ok(placed)
    }

    async fn cancel(&self, order_id: Uuid) -> Result<Order, PlacementError> {
        let mut state = self.lock();
        let mut order = state
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(PlacementError::OrderNotFound)?;
        order.cancel()?;
        for item in order.items() {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock = product.stock.add(item.quantity);
            }
        }
        state.orders.insert(order.id(), order.clone());
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::super::PlanLine;
    use super::*;
    use crate::domain::aggregates::PaymentDecision;
    use crate::domain::value_objects::Money;
    use rust_decimal::Decimal;

    fn product(stock: u32) -> CatalogProduct {
        CatalogProduct {
            id: Uuid::new_v4(),
            name: "Batata frita".into(),
            category: Some("Acompanhamento".into()),
            price: Money::new(Decimal::new(900, 2)),
            stock: Quantity::new(stock),
            purchasable: true,
        }
    }

    #[tokio::test]
    async fn test_cart_ttl_expires_idle_carts() {
        let backend = MemoryBackend::new(Some(60));
        let stale = Cart::restore("cold", vec![], false, Utc::now() - Duration::seconds(120));
        CartStore::save(&backend, &stale).await.unwrap();
        assert!(CartStore::find(&backend, "cold").await.unwrap().is_none());

        let fresh = Cart::new("warm");
        CartStore::save(&backend, &fresh).await.unwrap();
        assert!(CartStore::find(&backend, "warm").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_carts_never_expire_without_ttl() {
        let backend = MemoryBackend::new(None);
        let old = Cart::restore("s", vec![], false, Utc::now() - Duration::days(30));
        CartStore::save(&backend, &old).await.unwrap();
        assert!(CartStore::find(&backend, "s").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_order_numbers_are_sequential() {
        let backend = MemoryBackend::new(None);
        let p = product(10);
        let pid = p.id;
        backend.insert_product(p);

        for expected in 1..=3i64 {
            let mut payment = Payment::create(format!("s{expected}"), Money::new(Decimal::ONE)).unwrap();
            payment.confirm(PaymentDecision::Approved, "ref", "pix").unwrap();
            PaymentStore::save(&backend, &payment).await.unwrap();
            let placed = backend
                .place(PlacementPlan {
                    session_id: format!("s{expected}"),
                    payment_id: payment.id(),
                    customer_id: None,
                    lines: vec![PlanLine {
                        product_id: pid,
                        product_name: "Batata frita".into(),
                        quantity: 1,
                        unit_price: Money::new(Decimal::ONE),
                        note: None,
                    }],
                })
                .await
                .unwrap();
            assert_eq!(placed.order_number, expected);
        }
        assert_eq!(backend.product_stock(pid), Some(7));
    }
}
