//! Payment endpoints: QR issuance, webhook confirmation, order placement,
//! and the kiosk countdown check.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{PaymentDecision, TimerStatus};
use crate::domain::value_objects::Money;
use crate::error::ServiceError;

use super::responses::ok;
use super::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    pub amount: Money,
}

pub async fn generate_qr(
    State(state): State<AppState>,
    Json(req): Json<GenerateQrRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let qr = state
        .checkout
        .request_checkout(&req.session_id, req.amount)
        .await?;
    Ok(ok(qr))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_id: Uuid,
    pub decision: PaymentDecision,
    #[validate(length(min = 1))]
    pub external_ref: String,
    pub amount_paid: Money,
    #[validate(length(min = 1))]
    pub method: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmPaymentResponse {
    confirmed: bool,
}

pub async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let confirmed = state
        .checkout
        .confirm_payment(
            req.payment_id,
            req.decision,
            &req.external_ref,
            req.amount_paid,
            &req.method,
        )
        .await?;
    Ok(ok(ConfirmPaymentResponse { confirmed }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOrderRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    pub payment_id: Uuid,
    pub customer_id: Option<Uuid>,
}

pub async fn register_order(
    State(state): State<AppState>,
    Json(req): Json<RegisterOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    let receipt = state
        .checkout
        .place_order(&req.session_id, req.payment_id, req.customer_id)
        .await?;
    Ok(ok(receipt))
}

/// The timer reply carries the domain value in its `status` field instead of
/// the `sucesso` envelope.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TimerResponse {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    seconds_remaining: i64,
}

pub async fn check_timer(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let (status, seconds_remaining) = match state.checkout.check_timer(payment_id).await? {
        TimerStatus::Active { seconds_remaining } => ("active", seconds_remaining),
        TimerStatus::Expired => ("expired", 0),
    };
    Ok(Json(TimerResponse {
        status,
        timestamp: chrono::Utc::now(),
        seconds_remaining,
    }))
}
