//! Payment aggregate
//!
//! A single collection attempt for a confirmed cart. Status moves one way:
//! pending -> approved | declined, and only an approved payment may be linked
//! to an order, exactly once. The expiration timer is advisory and only
//! meaningful while the payment is still pending.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Declined,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentDecision {
    Approved,
    Declined,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrCode {
    pub url: String,
    pub payload: String,
}

#[derive(Clone, Debug)]
pub struct Payment {
    id: Uuid,
    session_id: String,
    amount: Money,
    status: PaymentStatus,
    qr: Option<QrCode>,
    expires_at: Option<DateTime<Utc>>,
    external_ref: Option<String>,
    method: Option<String>,
    order_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment amount must be greater than zero")]
    InvalidAmount,
    #[error("payment is no longer pending")]
    NotPending,
    #[error("payment has not been approved")]
    NotApproved,
    #[error("payment is already linked to an order")]
    AlreadyLinked,
}

/// Result of the advisory expiration check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerStatus {
    Active { seconds_remaining: i64 },
    Expired,
}

impl Payment {
    pub fn create(session_id: impl Into<String>, amount: Money) -> Result<Self, PaymentError> {
        if !amount.is_positive() {
            return Err(PaymentError::InvalidAmount);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            session_id: session_id.into(),
            amount,
            status: PaymentStatus::Pending,
            qr: None,
            expires_at: None,
            external_ref: None,
            method: None,
            order_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        session_id: impl Into<String>,
        amount: Money,
        status: PaymentStatus,
        qr: Option<QrCode>,
        expires_at: Option<DateTime<Utc>>,
        external_ref: Option<String>,
        method: Option<String>,
        order_id: Option<Uuid>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { id, session_id: session_id.into(), amount, status, qr, expires_at, external_ref, method, order_id, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn amount(&self) -> Money { self.amount }
    pub fn status(&self) -> PaymentStatus { self.status }
    pub fn qr(&self) -> Option<&QrCode> { self.qr.as_ref() }
    pub fn expires_at(&self) -> Option<DateTime<Utc>> { self.expires_at }
    pub fn external_ref(&self) -> Option<&str> { self.external_ref.as_deref() }
    pub fn method(&self) -> Option<&str> { self.method.as_deref() }
    pub fn order_id(&self) -> Option<Uuid> { self.order_id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Attaches the QR code handed back by the gateway. Only a pending
    /// payment carries QR data.
    pub fn issue_qr(&mut self, qr: QrCode, ttl_seconds: i64) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::NotPending);
        }
        self.qr = Some(qr);
        self.expires_at = Some(Utc::now() + Duration::seconds(ttl_seconds));
        self.touch();
        Ok(())
    }

    /// Applies the gateway's decision. One-shot: a second call fails and
    /// leaves the recorded decision untouched.
    pub fn confirm(
        &mut self,
        decision: PaymentDecision,
        external_ref: impl Into<String>,
        method: impl Into<String>,
    ) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Pending {
            return Err(PaymentError::NotPending);
        }
        self.status = match decision {
            PaymentDecision::Approved => PaymentStatus::Approved,
            PaymentDecision::Declined => PaymentStatus::Declined,
        };
        self.external_ref = Some(external_ref.into());
        self.method = Some(method.into());
        self.touch();
        Ok(())
    }

    /// Records the order created from this payment. At most one order per
    /// payment, ever.
    pub fn link_order(&mut self, order_id: Uuid) -> Result<(), PaymentError> {
        if self.status != PaymentStatus::Approved {
            return Err(PaymentError::NotApproved);
        }
        if self.order_id.is_some() {
            return Err(PaymentError::AlreadyLinked);
        }
        self.order_id = Some(order_id);
        self.touch();
        Ok(())
    }

    /// Marks a payment whose QR issuance failed at the gateway.
    pub fn mark_error(&mut self) {
        self.status = PaymentStatus::Error;
        self.touch();
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// A non-pending payment always reports expired, whatever the deadline
    /// field says.
    pub fn timer(&self, now: DateTime<Utc>) -> TimerStatus {
        if self.status != PaymentStatus::Pending {
            return TimerStatus::Expired;
        }
        match self.expires_at {
            Some(deadline) if now < deadline => TimerStatus::Active {
                seconds_remaining: (deadline - now).num_seconds(),
            },
            _ => TimerStatus::Expired,
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}
