//! Kitchen-facing order endpoints

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::value_objects::Money;
use crate::error::ServiceError;

use super::responses::ok;
use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRepr {
    pub order_id: Uuid,
    pub order_number: i64,
    pub customer_id: Option<Uuid>,
    pub order_status: OrderStatus,
    pub items: Vec<OrderItemRepr>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRepr {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub note: Option<String>,
    pub subtotal: Money,
}

impl From<&Order> for OrderRepr {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            order_number: order.number(),
            customer_id: order.customer_id(),
            order_status: order.status(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemRepr {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    note: item.note.clone(),
                    subtotal: item.line_total(),
                })
                .collect(),
            total: order.total(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<OrderStatus>,
}

#[derive(Serialize)]
struct OrderList {
    orders: Vec<OrderRepr>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.kitchen.list(params.status).await?;
    Ok(ok(OrderList { orders: orders.iter().map(OrderRepr::from).collect() }))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.kitchen.order(id).await?;
    Ok(ok(OrderRepr::from(&order)))
}

pub async fn start_preparing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.kitchen.start_preparing(id).await?;
    Ok(ok(OrderRepr::from(&order)))
}

pub async fn mark_ready(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.kitchen.mark_ready(id).await?;
    Ok(ok(OrderRepr::from(&order)))
}

pub async fn confirm_pickup(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.kitchen.confirm_pickup(id).await?;
    Ok(ok(OrderRepr::from(&order)))
}

pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.kitchen.cancel(id).await?;
    Ok(ok(OrderRepr::from(&order)))
}
