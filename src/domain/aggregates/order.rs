//! Order aggregate
//!
//! The kitchen-facing record created once a payment is approved. Orders are
//! born `PaymentConfirmed` (payment clears before placement) and only move
//! forward through the preparation pipeline. Cancellation is a status, not a
//! deletion, and is barred once the customer has picked up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
pub enum OrderStatus {
    InCart,
    PaymentPending,
    PaymentConfirmed,
    InPreparation,
    ReadyForPickup,
    PickedUp,
    Canceled,
}

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    number: i64,
    customer_id: Option<Uuid>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Immutable historical record: quantity and unit price as captured in the
/// cart, independent of later catalog changes.
#[derive(Clone, Debug)]
pub struct OrderItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub note: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("order cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("order is already in preparation")]
    AlreadyPreparing,
}

impl Order {
    /// Creates the order produced by a successful placement. Total is the sum
    /// of line totals at creation time and never changes afterwards.
    pub fn place(number: i64, customer_id: Option<Uuid>, items: Vec<OrderItem>) -> Self {
        let now = Utc::now();
        let total = items.iter().map(OrderItem::line_total).sum();
        Self {
            id: Uuid::new_v4(),
            number,
            customer_id,
            status: OrderStatus::PaymentConfirmed,
            items,
            total,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        number: i64,
        customer_id: Option<Uuid>,
        status: OrderStatus,
        items: Vec<OrderItem>,
        total: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, number, customer_id, status, items, total, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn number(&self) -> i64 { self.number }
    pub fn customer_id(&self) -> Option<Uuid> { self.customer_id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total(&self) -> Money { self.total }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn start_preparing(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::PaymentConfirmed => {
                self.status = OrderStatus::InPreparation;
                self.touch();
                Ok(())
            }
            OrderStatus::InPreparation => Err(OrderError::AlreadyPreparing),
            from => Err(OrderError::InvalidTransition { from, to: OrderStatus::InPreparation }),
        }
    }

    pub fn mark_ready(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::InPreparation => {
                self.status = OrderStatus::ReadyForPickup;
                self.touch();
                Ok(())
            }
            from => Err(OrderError::InvalidTransition { from, to: OrderStatus::ReadyForPickup }),
        }
    }

    pub fn confirm_pickup(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::ReadyForPickup => {
                self.status = OrderStatus::PickedUp;
                self.touch();
                Ok(())
            }
            from => Err(OrderError::InvalidTransition { from, to: OrderStatus::PickedUp }),
        }
    }

    /// Reachable from any non-terminal state. A picked-up order cannot be
    /// canceled, and canceled is itself terminal.
    pub fn cancel(&mut self) -> Result<(), OrderError> {
        match self.status {
            OrderStatus::PickedUp | OrderStatus::Canceled => {
                Err(OrderError::InvalidTransition { from: self.status, to: OrderStatus::Canceled })
            }
            _ => {
                self.status = OrderStatus::Canceled;
                self.touch();
                Ok(())
            }
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
