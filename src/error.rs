//! Service error taxonomy
//!
//! Aggregates fail fast with their own typed errors; the services wrap them
//! here together with the orchestration-level failures, and axum turns the
//! lot into the wire envelope. Storage failures never leak detail to the
//! client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{CartError, OrderError, PaymentError};
use crate::domain::value_objects::Money;
use crate::gateway::GatewayError;
use crate::stores::{PlacementError, StoreError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("no cart found for this session")]
    CartNotFound,
    #[error("cart has not been confirmed")]
    CartNotConfirmed,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("a resolved payment already exists for this session")]
    PaymentAlreadyResolved,
    #[error("payment does not belong to this session")]
    SessionMismatch,
    #[error("payment has not been approved")]
    PaymentNotApproved,
    #[error("paid amount {paid} does not match the charged amount {expected}")]
    AmountMismatch { expected: Money, paid: Money },
    #[error("claimed amount {claimed} does not match the cart total {total}")]
    ClaimedAmountMismatch { claimed: Money, total: Money },
    #[error("product {0} not found")]
    ProductNotFound(Uuid),
    #[error("product {0} is not available for purchase")]
    ProductUnavailable(Uuid),
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
    #[error("order not found")]
    OrderNotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PlacementError> for ServiceError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::PaymentNotFound => Self::PaymentNotFound,
            PlacementError::PaymentNotApproved => Self::PaymentNotApproved,
            PlacementError::OrderNotFound => Self::OrderNotFound,
            PlacementError::ProductNotFound(id) => Self::ProductNotFound(id),
            PlacementError::InsufficientStock { product_id, requested, available } => {
                Self::InsufficientStock { product_id, requested, available }
            }
            PlacementError::Payment(e) => Self::Payment(e),
            PlacementError::Order(e) => Self::Order(e),
            PlacementError::Store(e) => Self::Store(e),
        }
    }
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::Cart(CartError::InvalidQuantity) => "INVALID_QUANTITY",
            Self::Cart(CartError::ItemNotFound) => "ITEM_NOT_FOUND",
            Self::Cart(CartError::EmptyCart) => "EMPTY_CART",
            Self::Payment(PaymentError::InvalidAmount) => "INVALID_AMOUNT",
            Self::Payment(PaymentError::NotPending) => "PAYMENT_NOT_PENDING",
            Self::Payment(PaymentError::NotApproved) => "PAYMENT_NOT_APPROVED",
            Self::Payment(PaymentError::AlreadyLinked) => "PAYMENT_ALREADY_LINKED",
            Self::Order(OrderError::InvalidTransition { .. }) => "INVALID_STATUS_TRANSITION",
            Self::Order(OrderError::AlreadyPreparing) => "ALREADY_PREPARING",
            Self::CartNotFound => "CART_NOT_FOUND",
            Self::CartNotConfirmed => "CART_NOT_CONFIRMED",
            Self::PaymentNotFound => "PAYMENT_NOT_FOUND",
            Self::PaymentAlreadyResolved => "PAYMENT_ALREADY_RESOLVED",
            Self::SessionMismatch => "SESSION_MISMATCH",
            Self::PaymentNotApproved => "PAYMENT_NOT_APPROVED",
            Self::AmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::ClaimedAmountMismatch { .. } => "AMOUNT_MISMATCH",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::ProductUnavailable(_) => "PRODUCT_UNAVAILABLE",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::OrderNotFound => "ORDER_NOT_FOUND",
            Self::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            Self::Gateway(_) => "GATEWAY_ERROR",
            Self::Store(_) => "STORAGE_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::Cart(CartError::InvalidQuantity)
            | Self::Payment(PaymentError::InvalidAmount) => StatusCode::BAD_REQUEST,
            Self::Cart(CartError::ItemNotFound)
            | Self::CartNotFound
            | Self::PaymentNotFound
            | Self::ProductNotFound(_)
            | Self::OrderNotFound
            | Self::CustomerNotFound => StatusCode::NOT_FOUND,
            Self::Cart(CartError::EmptyCart)
            | Self::Payment(_)
            | Self::Order(_)
            | Self::CartNotConfirmed
            | Self::PaymentAlreadyResolved
            | Self::SessionMismatch
            | Self::PaymentNotApproved
            | Self::AmountMismatch { .. }
            | Self::ClaimedAmountMismatch { .. }
            | Self::ProductUnavailable(_)
            | Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
    code: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Store(err) => {
                tracing::error!(error = %err, "storage failure");
                "internal error".to_string()
            }
            Self::Gateway(err) => {
                tracing::warn!(error = %err, "payment gateway failure");
                self.to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            status: "erro",
            timestamp: Utc::now(),
            code: self.code(),
            message,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_detail_is_hidden() {
        let err = ServiceError::Store(StoreError::Database(sqlx::Error::PoolClosed));
        assert_eq!(err.code(), "STORAGE_ERROR");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_class() {
        assert_eq!(ServiceError::CartNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ServiceError::Cart(CartError::ItemNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_state_conflict_class() {
        assert_eq!(
            ServiceError::Cart(CartError::EmptyCart).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::PaymentAlreadyResolved.status_code(),
            StatusCode::CONFLICT
        );
    }
}
