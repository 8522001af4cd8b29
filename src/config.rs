//! Environment-driven configuration

use anyhow::{Context, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Absent means the in-memory backend.
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    /// Idle seconds after which a cart is treated as gone. Absent means
    /// carts never expire.
    pub cart_ttl_secs: Option<i64>,
    pub qr_ttl_secs: i64,
    /// When set, a checkout whose claimed amount differs from the cart total
    /// is rejected instead of logged.
    pub strict_checkout_amount: bool,
    pub gateway_base_url: String,
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match optional("PORT") {
            Some(v) => v.parse::<u16>().context("invalid PORT")?,
            None => 8083,
        };
        let cart_ttl_secs = optional("CART_TTL_SECS")
            .map(|v| v.parse::<i64>().context("invalid CART_TTL_SECS"))
            .transpose()?;
        let qr_ttl_secs = match optional("QR_TTL_SECS") {
            Some(v) => v.parse::<i64>().context("invalid QR_TTL_SECS")?,
            None => 300,
        };
        let strict_checkout_amount = optional("STRICT_CHECKOUT_AMOUNT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(Self {
            port,
            database_url: optional("DATABASE_URL"),
            nats_url: optional("NATS_URL"),
            cart_ttl_secs,
            qr_ttl_secs,
            strict_checkout_amount,
            gateway_base_url: optional("GATEWAY_BASE_URL")
                .unwrap_or_else(|| "https://pay.sandbox.local/qr".to_string()),
        })
    }
}
