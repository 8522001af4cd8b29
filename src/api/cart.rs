//! Cart endpoints

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::value_objects::Money;
use crate::error::ServiceError;

use super::responses::ok;
use super::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    pub product_id: Uuid,
    pub quantity: u32,
    pub note: Option<String>,
}

pub async fn add_item(
    State(state): State<AppState>,
    Json(req): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let added = state
        .carts
        .add_item(&req.session_id, req.product_id, req.quantity, req.note)
        .await?;
    Ok(ok(added))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmCartResponse {
    validated: bool,
    total: Money,
    next_step: &'static str,
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<SessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let total = state.carts.confirm(&req.session_id).await?;
    Ok(ok(ConfirmCartResponse { validated: true, total, next_step: "pagamento" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewParams {
    pub session_id: String,
}

pub async fn view(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let snapshot = state.carts.view(&params.session_id).await?;
    Ok(ok(snapshot))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveItemRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    pub item_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemoveItemResponse {
    cart_subtotal: Money,
}

pub async fn remove_item(
    State(state): State<AppState>,
    Json(req): Json<RemoveItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let cart_subtotal = state.carts.remove_item(&req.session_id, req.item_id).await?;
    Ok(ok(RemoveItemResponse { cart_subtotal }))
}
