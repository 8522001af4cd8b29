//! Domain events
//!
//! Emitted after state changes commit and published best-effort to NATS when
//! a client is configured.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    PaymentConfirmed { payment_id: Uuid, session_id: String, approved: bool },
    OrderPlaced { order_id: Uuid, order_number: i64, total: Money },
    OrderStatusChanged { order_id: Uuid, status: OrderStatus },
    OrderCanceled { order_id: Uuid },
}

impl DomainEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::PaymentConfirmed { .. } => "payments.confirmed",
            Self::OrderPlaced { .. } => "orders.placed",
            Self::OrderStatusChanged { .. } => "orders.status",
            Self::OrderCanceled { .. } => "orders.canceled",
        }
    }
}
