//! Payment gateway port
//!
//! The checkout flow only needs QR issuance; confirmation arrives later
//! through the webhook endpoint. `SandboxGateway` stands in for the real
//! provider and issues deterministic codes with a configured TTL.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct IssuedQr {
    pub url: String,
    pub payload: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway rejected the request: {0}")]
    Rejected(String),
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn generate(&self, payment_id: Uuid, amount: Money) -> Result<IssuedQr, GatewayError>;
}

#[derive(Clone, Debug)]
pub struct SandboxGateway {
    base_url: String,
    ttl_seconds: i64,
}

impl SandboxGateway {
    pub fn new(base_url: impl Into<String>, ttl_seconds: i64) -> Self {
        Self { base_url: base_url.into(), ttl_seconds }
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn generate(&self, payment_id: Uuid, amount: Money) -> Result<IssuedQr, GatewayError> {
        Ok(IssuedQr {
            url: format!("{}/{}.png", self.base_url, payment_id),
            payload: format!("pix-sim:{payment_id}:{amount}"),
            ttl_seconds: self.ttl_seconds,
        })
    }
}
