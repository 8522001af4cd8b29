//! Postgres backend
//!
//! sqlx implementations of the storage ports. Placement and cancellation run
//! inside a single transaction with `FOR UPDATE` row locks on the payment and
//! the affected product rows; transaction numbers are protected by a unique
//! constraint with a bounded retry on collision.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartLine, Order, OrderItem, OrderStatus, Payment, PaymentStatus, QrCode,
};
use crate::domain::value_objects::{Money, Quantity};

use super::{
    CartStore, CatalogProduct, Customer, CustomerDirectory, OrderStore, PlacedOrder,
    PlacementError, PlacementPlan, PlacementUnit, PaymentStore, ProductCatalog, StoreError,
};

const PLACEMENT_ATTEMPTS: u32 = 3;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    category: Option<String>,
    price: Decimal,
    stock: i32,
    purchasable: bool,
}

impl From<ProductRow> for CatalogProduct {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            price: Money::new(row.price),
            stock: Quantity::new(row.stock.max(0) as u32),
            purchasable: row.purchasable,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    session_id: String,
    confirmed: bool,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    category: Option<String>,
    unit_price: Decimal,
    quantity: i32,
    note: Option<String>,
}

impl From<CartItemRow> for CartLine {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            category: row.category,
            unit_price: Money::new(row.unit_price),
            quantity: row.quantity.max(0) as u32,
            note: row.note,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    session_id: String,
    amount: Decimal,
    status: PaymentStatus,
    qr_url: Option<String>,
    qr_payload: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    external_ref: Option<String>,
    method: Option<String>,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        let qr = match (row.qr_url, row.qr_payload) {
            (Some(url), Some(payload)) => Some(QrCode { url, payload }),
            _ => None,
        };
        Payment::restore(
            row.id,
            row.session_id,
            Money::new(row.amount),
            row.status,
            qr,
            row.expires_at,
            row.external_ref,
            row.method,
            row.order_id,
            row.created_at,
            row.updated_at,
        )
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    transaction_number: i64,
    customer_id: Option<Uuid>,
    status: OrderStatus,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    note: Option<String>,
}

fn order_from_rows(row: OrderRow, item_rows: Vec<OrderItemRow>) -> Order {
    let items = item_rows
        .into_iter()
        .map(|i| OrderItem {
            id: i.id,
            product_id: i.product_id,
            product_name: i.product_name,
            quantity: i.quantity.max(0) as u32,
            unit_price: Money::new(i.unit_price),
            note: i.note,
        })
        .collect();
    Order::restore(
        row.id,
        row.transaction_number,
        row.customer_id,
        row.status,
        items,
        Money::new(row.total),
        row.created_at,
        row.updated_at,
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<CatalogProduct>, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, category, price, stock, purchasable FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(CatalogProduct::from))
    }
}

#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
    ttl: Option<Duration>,
}

impl PgCartStore {
    pub fn new(pool: PgPool, cart_ttl_secs: Option<i64>) -> Self {
        Self { pool, ttl: cart_ttl_secs.map(Duration::seconds) }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find(&self, session_id: &str) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT session_id, confirmed, updated_at FROM carts WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else { return Ok(None) };

        if let Some(ttl) = self.ttl {
            if Utc::now() - row.updated_at > ttl {
                self.delete(session_id).await?;
                return Ok(None);
            }
        }

        let items = sqlx::query_as::<_, CartItemRow>(
            "SELECT id, product_id, product_name, category, unit_price, quantity, note \
             FROM cart_items WHERE session_id = $1 ORDER BY position",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Cart::restore(
            row.session_id,
            items.into_iter().map(CartLine::from).collect(),
            row.confirmed,
            row.updated_at,
        )))
    }

    async fn save(&self, cart: &Cart) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO carts (session_id, confirmed, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (session_id) DO UPDATE SET confirmed = EXCLUDED.confirmed, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.session_id())
        .bind(cart.is_confirmed())
        .bind(cart.updated_at())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(cart.session_id())
            .execute(&mut *tx)
            .await?;

        for (position, line) in cart.lines().iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_items (id, session_id, product_id, product_name, category, unit_price, quantity, note, position) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(line.id)
            .bind(cart.session_id())
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(&line.category)
            .bind(line.unit_price.amount())
            .bind(line.quantity as i32)
            .bind(&line.note)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM carts WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

const PAYMENT_COLUMNS: &str = "id, session_id, amount, status, qr_url, qr_payload, expires_at, \
                               external_ref, method, order_id, created_at, updated_at";

#[async_trait]
impl PaymentStore for PgPaymentStore {
    async fn find(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Payment::from))
    }

    async fn find_latest_for_session(&self, session_id: &str) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE session_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Payment::from))
    }

    async fn save(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payments (id, session_id, amount, status, qr_url, qr_payload, expires_at, external_ref, method, order_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, qr_url = EXCLUDED.qr_url, \
             qr_payload = EXCLUDED.qr_payload, expires_at = EXCLUDED.expires_at, \
             external_ref = EXCLUDED.external_ref, method = EXCLUDED.method, \
             order_id = EXCLUDED.order_id, updated_at = EXCLUDED.updated_at",
        )
        .bind(payment.id())
        .bind(payment.session_id())
        .bind(payment.amount().amount())
        .bind(payment.status())
        .bind(payment.qr().map(|qr| qr.url.clone()))
        .bind(payment.qr().map(|qr| qr.payload.clone()))
        .bind(payment.expires_at())
        .bind(payment.external_ref())
        .bind(payment.method())
        .bind(payment.order_id())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItemRow>, StoreError> {
        Ok(sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, product_id, product_name, quantity, unit_price, note \
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

const ORDER_COLUMNS: &str =
    "id, transaction_number, customer_id, status, total, created_at, updated_at";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => {
                let items = self.items(row.id).await?;
                Ok(Some(order_from_rows(row, items)))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE status = $1 ORDER BY created_at"
                ))
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items(row.id).await?;
            orders.push(order_from_rows(row, items));
        }
        Ok(orders)
    }

    async fn update(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id())
            .bind(order.status())
            .bind(order.updated_at())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn find(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        #[derive(sqlx::FromRow)]
        struct CustomerRow {
            id: Uuid,
            name: String,
            email: Option<String>,
        }
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, name, email FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Customer { id: r.id, name: r.name, email: r.email }))
    }
}

#[derive(Clone)]
pub struct PgPlacement {
    pool: PgPool,
}

impl PgPlacement {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    async fn try_place(&self, plan: &PlacementPlan) -> Result<PlacedOrder, PlacementError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let payment = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
        ))
        .bind(plan.payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?
        .ok_or(PlacementError::PaymentNotFound)?;

        // Retried placement: the payment already carries its order.
        if let Some(order_id) = payment.order_id {
            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
            ))
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?
            .ok_or(PlacementError::OrderNotFound)?;
            return Ok(PlacedOrder { order_id, order_number: row.transaction_number });
        }
        if payment.status != PaymentStatus::Approved {
            return Err(PlacementError::PaymentNotApproved);
        }

        // Lock and validate every product row before the first decrement so
        // a failing line leaves no partial stock changes behind.
        for line in &plan.lines {
            let stock = sqlx::query_as::<_, (i32,)>(
                "SELECT stock FROM products WHERE id = $1 FOR UPDATE",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?
            .ok_or(PlacementError::ProductNotFound(line.product_id))?
            .0;
            if stock < line.quantity as i32 {
                return Err(PlacementError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: stock.max(0) as u32,
                });
            }
        }
        for line in &plan.lines {
            sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
                .bind(line.product_id)
                .bind(line.quantity as i32)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        let number = sqlx::query_as::<_, (i64,)>(
            "SELECT COALESCE(MAX(transaction_number), 0) + 1 FROM orders",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::from)?
        .0;

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

        sqlx::query(
            "INSERT INTO orders (id, transaction_number, customer_id, status, total, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(order.id())
        .bind(order.number())
        .bind(order.customer_id())
        .bind(order.status())
        .bind(order.total().amount())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        for item in order.items() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, product_name, quantity, unit_price, note) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(item.id)
            .bind(order.id())
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity as i32)
            .bind(item.unit_price.amount())
            .bind(&item.note)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        }

        sqlx::query("UPDATE payments SET order_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(plan.payment_id)
            .bind(order.id())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        sqlx::query("DELETE FROM carts WHERE session_id = $1")
            .bind(&plan.session_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(PlacedOrder { order_id: order.id(), order_number: number })
    }
}

#[async_trait]
impl PlacementUnit for PgPlacement {
    async fn place(&self, plan: PlacementPlan) -> Result<PlacedOrder, PlacementError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_place(&plan).await {
                Err(PlacementError::Store(StoreError::Database(e)))
                    if attempts < PLACEMENT_ATTEMPTS && is_unique_violation(&e) =>
                {
                    tracing::debug!(attempt = attempts, "transaction number collision, retrying");
                    continue;
                }
                result => return result,
            }
        }
    }

    async fn cancel(&self, order_id: Uuid) -> Result<Order, PlacementError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::from)?
        .ok_or(PlacementError::OrderNotFound)?;

        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, product_id, product_name, quantity, unit_price, note \
             FROM order_items WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        let mut order = order_from_rows(row, items);
        order.cancel()?;

        for item in order.items() {
            sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
                .bind(item.product_id)
                .bind(item.quantity as i32)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id())
            .bind(order.status())
            .bind(order.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(order)
    }
}
