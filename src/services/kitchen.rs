//! Kitchen-facing order progression
//!
//! Staff endpoints advance orders through the preparation pipeline. Each
//! transition is a load-mutate-save cycle under the order's keyed lock;
//! cancellation goes through the storage backend's atomic unit because it
//! also restores stock.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderError, OrderStatus};
use crate::domain::events::DomainEvent;
use crate::error::ServiceError;
use crate::stores::{OrderStore, PlacementUnit};

use super::events::EventPublisher;
use super::locks::KeyedLocks;

#[derive(Clone)]
pub struct KitchenService {
    orders: Arc<dyn OrderStore>,
    placement: Arc<dyn PlacementUnit>,
    events: EventPublisher,
    locks: KeyedLocks,
}

impl KitchenService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        placement: Arc<dyn PlacementUnit>,
        events: EventPublisher,
    ) -> Self {
        Self { orders, placement, events, locks: KeyedLocks::new() }
    }

    pub async fn start_preparing(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.transition(order_id, Order::start_preparing).await
    }

    pub async fn mark_ready(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.transition(order_id, Order::mark_ready).await
    }

    pub async fn confirm_pickup(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.transition(order_id, Order::confirm_pickup).await
    }

    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(&order_id.to_string()).await;
        let order = self.placement.cancel(order_id).await?;
        self.events
            .publish(&DomainEvent::OrderCanceled { order_id })
            .await;
        Ok(order)
    }

    pub async fn order(&self, order_id: Uuid) -> Result<Order, ServiceError> {
        self.orders
            .find(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound)
    }

    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.list(status).await?)
    }

    async fn transition(
        &self,
        order_id: Uuid,
        apply: fn(&mut Order) -> Result<(), OrderError>,
    ) -> Result<Order, ServiceError> {
        let _guard = self.locks.acquire(&order_id.to_string()).await;
        let mut order = self
            .orders
            .find(order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound)?;
        apply(&mut order)?;
        self.orders.update(&order).await?;
        self.events
            .publish(&DomainEvent::OrderStatusChanged { order_id, status: order.status() })
            .await;
        Ok(order)
    }
}
