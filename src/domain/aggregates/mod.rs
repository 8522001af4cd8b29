//! Domain aggregates

pub mod cart;
pub mod order;
pub mod payment;

pub use cart::{Cart, CartError, CartLine};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentDecision, PaymentError, PaymentStatus, QrCode, TimerStatus};
