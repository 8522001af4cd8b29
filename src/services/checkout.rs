//! Checkout orchestration
//!
//! The cart-to-payment-to-order sequence. QR requests are idempotent while a
//! pending payment is fresh; a resolved payment blocks further checkouts for
//! the session; placement delegates its all-or-nothing write cluster to the
//! storage backend and tolerates webhook-style retries by returning the
//! already-created order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Payment, PaymentDecision, PaymentStatus, QrCode, TimerStatus};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Money;
use crate::error::ServiceError;
use crate::gateway::PaymentGateway;
use crate::stores::{
    CartStore, CustomerDirectory, OrderStore, PlacementPlan, PlacementUnit, PlanLine,
    PaymentStore,
};

use super::events::EventPublisher;
use super::locks::KeyedLocks;

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    payments: Arc<dyn PaymentStore>,
    orders: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerDirectory>,
    gateway: Arc<dyn PaymentGateway>,
    placement: Arc<dyn PlacementUnit>,
    events: EventPublisher,
    locks: KeyedLocks,
    strict_amount_check: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQr {
    pub payment_id: Uuid,
    pub qr_url: String,
    pub qr_text: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReceipt {
    pub order_id: Uuid,
    pub order_number: i64,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: Arc<dyn CartStore>,
        payments: Arc<dyn PaymentStore>,
        orders: Arc<dyn OrderStore>,
        customers: Arc<dyn CustomerDirectory>,
        gateway: Arc<dyn PaymentGateway>,
        placement: Arc<dyn PlacementUnit>,
        events: EventPublisher,
        strict_amount_check: bool,
    ) -> Self {
        Self {
            carts,
            payments,
            orders,
            customers,
            gateway,
            placement,
            events,
            locks: KeyedLocks::new(),
            strict_amount_check,
        }
    }

    /// Requests a payment QR code for a confirmed cart. Double-clicks get the
    /// QR of the still-pending payment back instead of a duplicate charge.
    pub async fn request_checkout(
        &self,
        session_id: &str,
        claimed_amount: Money,
    ) -> Result<CheckoutQr, ServiceError> {
        let _guard = self.locks.acquire(session_id).await;

        let cart = self
            .carts
            .find(session_id)
            .await?
            .ok_or(ServiceError::CartNotFound)?;
        if !cart.is_confirmed() {
            return Err(ServiceError::CartNotConfirmed);
        }

        let now = Utc::now();
        if let Some(existing) = self.payments.find_latest_for_session(session_id).await? {
            match existing.status() {
                PaymentStatus::Pending if !existing.is_expired(now) => {
                    if let (Some(qr), Some(expires_at)) = (existing.qr(), existing.expires_at()) {
                        return Ok(CheckoutQr {
                            payment_id: existing.id(),
                            qr_url: qr.url.clone(),
                            qr_text: qr.payload.clone(),
                            expires_at,
                        });
                    }
                    // Pending but never got a QR; fall through to a new attempt.
                }
                PaymentStatus::Approved | PaymentStatus::Declined => {
                    return Err(ServiceError::PaymentAlreadyResolved);
                }
                _ => {}
            }
        }

        if claimed_amount != cart.total() {
            if self.strict_amount_check {
                return Err(ServiceError::ClaimedAmountMismatch {
                    claimed: claimed_amount,
                    total: cart.total(),
                });
            }
            tracing::warn!(
                session_id,
                claimed = %claimed_amount,
                cart_total = %cart.total(),
                "checkout amount differs from cart total, proceeding"
            );
        }

        let mut payment = Payment::create(session_id, claimed_amount)?;
        match self.gateway.generate(payment.id(), payment.amount()).await {
            Ok(issued) => {
                payment.issue_qr(
                    QrCode { url: issued.url.clone(), payload: issued.payload.clone() },
                    issued.ttl_seconds,
                )?;
                self.payments.save(&payment).await?;
                Ok(CheckoutQr {
                    payment_id: payment.id(),
                    qr_url: issued.url,
                    qr_text: issued.payload,
                    expires_at: payment.expires_at().unwrap_or(now),
                })
            }
            Err(err) => {
                payment.mark_error();
                self.payments.save(&payment).await?;
                Err(err.into())
            }
        }
    }

    /// Webhook entry point: applies the gateway's decision. Returns whether
    /// the payment ended up approved.
    pub async fn confirm_payment(
        &self,
        payment_id: Uuid,
        decision: PaymentDecision,
        external_ref: &str,
        amount_paid: Money,
        method: &str,
    ) -> Result<bool, ServiceError> {
        let mut payment = self
            .payments
            .find(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;

        if amount_paid != payment.amount() {
            return Err(ServiceError::AmountMismatch {
                expected: payment.amount(),
                paid: amount_paid,
            });
        }

        payment.confirm(decision, external_ref, method)?;
        self.payments.save(&payment).await?;

        let approved = payment.status() == PaymentStatus::Approved;
        self.events
            .publish(&DomainEvent::PaymentConfirmed {
                payment_id,
                session_id: payment.session_id().to_string(),
                approved,
            })
            .await;
        Ok(approved)
    }

    /// Converts an approved payment plus its cart into a persisted order.
    /// Retries for an already-linked payment succeed with the original
    /// order's identifiers, so at-least-once webhook delivery is safe.
    pub async fn place_order(
        &self,
        session_id: &str,
        payment_id: Uuid,
        customer_id: Option<Uuid>,
    ) -> Result<PlacementReceipt, ServiceError> {
        let _guard = self.locks.acquire(session_id).await;

        let payment = self
            .payments
            .find(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;
        if payment.session_id() != session_id {
            return Err(ServiceError::SessionMismatch);
        }

        if let Some(order_id) = payment.order_id() {
            let order = self
                .orders
                .find(order_id)
                .await?
                .ok_or(ServiceError::OrderNotFound)?;
            return Ok(PlacementReceipt { order_id, order_number: order.number() });
        }

        if payment.status() != PaymentStatus::Approved {
            return Err(ServiceError::PaymentNotApproved);
        }

        let cart = self
            .carts
            .find(session_id)
            .await?
            .ok_or(ServiceError::CartNotFound)?;

        if let Some(customer_id) = customer_id {
            self.customers
                .find(customer_id)
                .await?
                .ok_or(ServiceError::CustomerNotFound)?;
        }

        let plan = PlacementPlan {
            session_id: session_id.to_string(),
            payment_id,
            customer_id,
            lines: cart
                .lines()
                .iter()
                .map(|line| PlanLine {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    note: line.note.clone(),
                })
                .collect(),
        };
        let placed = self.placement.place(plan).await?;

        self.events
            .publish(&DomainEvent::OrderPlaced {
                order_id: placed.order_id,
                order_number: placed.order_number,
                total: cart.total(),
            })
            .await;
        Ok(PlacementReceipt {
            order_id: placed.order_id,
            order_number: placed.order_number,
        })
    }

    /// Advisory expiration check for the kiosk's countdown display.
    pub async fn check_timer(&self, payment_id: Uuid) -> Result<TimerStatus, ServiceError> {
        let payment = self
            .payments
            .find(payment_id)
            .await?
            .ok_or(ServiceError::PaymentNotFound)?;
        Ok(payment.timer(Utc::now()))
    }
}
