//! Storage ports
//!
//! Every persistence concern sits behind a trait so the orchestration
//! services receive concrete backends by injection at startup. Two backends
//! exist: `memory` (default, used when no `DATABASE_URL` is configured, and
//! by the test suite) and `postgres`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, Order, OrderError, OrderStatus, Payment, PaymentError};
use crate::domain::value_objects::{Money, Quantity};

/// Product data the ordering flow needs from the catalog.
#[derive(Clone, Debug)]
pub struct CatalogProduct {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub price: Money,
    pub stock: Quantity,
    pub purchasable: bool,
}

#[derive(Clone, Debug)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read-only catalog lookup. Stock mutations happen only inside the atomic
/// placement/cancellation clusters, never through this interface.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn product(&self, id: Uuid) -> Result<Option<CatalogProduct>, StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// A cart past the configured idle TTL is reported absent.
    async fn find(&self, session_id: &str) -> Result<Option<Cart>, StoreError>;
    async fn save(&self, cart: &Cart) -> Result<(), StoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Payment>, StoreError>;
    async fn find_latest_for_session(&self, session_id: &str) -> Result<Option<Payment>, StoreError>;
    async fn save(&self, payment: &Payment) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError>;
    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError>;
    async fn update(&self, order: &Order) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;
}

/// One cart line ready to be turned into an order item.
#[derive(Clone, Debug)]
pub struct PlanLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub note: Option<String>,
}

/// Everything the placement cluster needs, assembled by the checkout service
/// after its own checks passed.
#[derive(Clone, Debug)]
pub struct PlacementPlan {
    pub session_id: String,
    pub payment_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub lines: Vec<PlanLine>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: i64,
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("payment not found")]
    PaymentNotFound,
    #[error("payment has not been approved")]
    PaymentNotApproved,
    #[error("order not found")]
    OrderNotFound,
    #[error("product {0} not found")]
    ProductNotFound(Uuid),
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The two write clusters that must be all-or-nothing: converting an approved
/// payment into an order (stock decrement + order insert + transaction-number
/// assignment + payment link + cart delete) and cancelling an order (status
/// change + stock restore). Each backend provides its own atomicity: the
/// in-memory backend holds a single state lock for the whole cluster, the
/// Postgres backend runs one transaction with row locks.
#[async_trait]
pub trait PlacementUnit: Send + Sync {
    /// Re-validates stock inside the atomic boundary, so two sessions racing
    /// for the last units of a product cannot both win. Retrying a plan whose
    /// payment is already linked returns the previously created order.
    async fn place(&self, plan: PlacementPlan) -> Result<PlacedOrder, PlacementError>;

    /// Cancels the order and restores the stock decremented at placement,
    /// exactly once (the status machine bars a second cancellation).
    async fn cancel(&self, order_id: Uuid) -> Result<Order, PlacementError>;
}

/// The full set of storage handles, built once at startup and handed to the
/// services (no ambient globals).
#[derive(Clone)]
pub struct Stores {
    pub catalog: Arc<dyn ProductCatalog>,
    pub carts: Arc<dyn CartStore>,
    pub payments: Arc<dyn PaymentStore>,
    pub orders: Arc<dyn OrderStore>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub placement: Arc<dyn PlacementUnit>,
}

impl Stores {
    pub fn in_memory(backend: memory::MemoryBackend) -> Self {
        let backend = Arc::new(backend);
        Self {
            catalog: backend.clone(),
            carts: backend.clone(),
            payments: backend.clone(),
            orders: backend.clone(),
            customers: backend.clone(),
            placement: backend,
        }
    }

    pub fn postgres(pool: sqlx::PgPool, cart_ttl_secs: Option<i64>) -> Self {
        Self {
            catalog: Arc::new(postgres::PgCatalog::new(pool.clone())),
            carts: Arc::new(postgres::PgCartStore::new(pool.clone(), cart_ttl_secs)),
            payments: Arc::new(postgres::PgPaymentStore::new(pool.clone())),
            orders: Arc::new(postgres::PgOrderStore::new(pool.clone())),
            customers: Arc::new(postgres::PgCustomerDirectory::new(pool.clone())),
            placement: Arc::new(postgres::PgPlacement::new(pool)),
        }
    }
}
