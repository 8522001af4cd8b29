//! Totem Orders - Self-service Fast-food Ordering Backend
//!
//! Customers identify themselves at a kiosk, build a session cart, pay
//! through a QR code, and the kitchen advances the resulting order through
//! preparation.
//!
//! ## Flow
//! - Cart: add/remove/confirm/view, one cart per session
//! - Checkout: QR issuance for a confirmed cart, webhook confirmation
//! - Placement: atomic conversion of an approved payment into an order
//! - Kitchen: status progression and cancellation with stock restore

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod services;
pub mod stores;
