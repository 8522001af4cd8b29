//! Orchestration services

pub mod carts;
pub mod checkout;
pub mod events;
pub mod kitchen;
pub mod locks;

pub use carts::{AddedItem, CartLineView, CartService, CartView};
pub use checkout::{CheckoutQr, CheckoutService, PlacementReceipt};
pub use events::EventPublisher;
pub use kitchen::KitchenService;
