//! Cart aggregate
//!
//! One cart per kiosk session. Lines are keyed by product and merged on
//! repeated adds; totals are recomputed after every mutation so the stored
//! subtotal is never stale.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::Money;

#[derive(Clone, Debug)]
pub struct Cart {
    session_id: String,
    lines: Vec<CartLine>,
    subtotal: Money,
    total: Money,
    confirmed: bool,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub category: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub note: Option<String>,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("item not found in cart")]
    ItemNotFound,
    #[error("cannot confirm an empty cart")]
    EmptyCart,
}

impl Cart {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            lines: vec![],
            subtotal: Money::ZERO,
            total: Money::ZERO,
            confirmed: false,
            updated_at: Utc::now(),
        }
    }

    /// Rebuild a cart from stored state. Totals are derived, not trusted.
    pub fn restore(
        session_id: impl Into<String>,
        lines: Vec<CartLine>,
        confirmed: bool,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut cart = Self {
            session_id: session_id.into(),
            lines,
            subtotal: Money::ZERO,
            total: Money::ZERO,
            confirmed,
            updated_at,
        };
        cart.subtotal = cart.lines.iter().map(CartLine::line_total).sum();
        cart.total = cart.subtotal;
        cart
    }

    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn total(&self) -> Money { self.total }
    pub fn is_confirmed(&self) -> bool { self.confirmed }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Adds a line, merging into an existing line for the same product. A
    /// merge keeps the unit price captured on first add; a supplied note
    /// replaces the previous one (last write wins). Returns the id of the
    /// affected line.
    pub fn add_item(&mut self, line: CartLine) -> Result<Uuid, CartError> {
        if line.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let id = match self.lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => {
                existing.quantity += line.quantity;
                if line.note.is_some() {
                    existing.note = line.note;
                }
                existing.id
            }
            None => {
                let id = line.id;
                self.lines.push(line);
                id
            }
        };
        self.recalculate();
        Ok(id)
    }

    /// Removes an entire line; there is no partial-quantity removal.
    pub fn remove_item(&mut self, line_id: Uuid) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.id != line_id);
        if self.lines.len() == before {
            return Err(CartError::ItemNotFound);
        }
        self.recalculate();
        Ok(())
    }

    /// Marks the cart ready for checkout. Re-confirming is a no-op.
    pub fn confirm(&mut self) -> Result<(), CartError> {
        if self.lines.is_empty() {
            return Err(CartError::EmptyCart);
        }
        if !self.confirmed {
            self.confirmed = true;
            self.touch();
        }
        Ok(())
    }

    fn recalculate(&mut self) {
        self.subtotal = self.lines.iter().map(CartLine::line_total).sum();
        self.total = self.subtotal;
        self.touch();
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(product: Uuid, qty: u32, cents: i64) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            product_id: product,
            product_name: "X-Burger".into(),
            category: Some("Lanche".into()),
            unit_price: Money::new(Decimal::new(cents, 2)),
            quantity: qty,
            note: None,
        }
    }

    #[test]
    fn test_add_merges_same_product() {
        let product = Uuid::new_v4();
        let mut cart = Cart::new("s1");
        let first = cart.add_item(line(product, 2, 1890)).unwrap();
        let second = cart.add_item(line(product, 1, 1890)).unwrap();
        assert_eq!(first, second);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.subtotal().amount(), Decimal::new(5670, 2));
    }

    #[test]
    fn test_note_last_write_wins() {
        let product = Uuid::new_v4();
        let mut cart = Cart::new("s1");
        let mut with_note = line(product, 1, 500);
        with_note.note = Some("sem cebola".into());
        cart.add_item(with_note).unwrap();
        cart.add_item(line(product, 1, 500)).unwrap();
        assert_eq!(cart.lines()[0].note.as_deref(), Some("sem cebola"));
        let mut replaced = line(product, 1, 500);
        replaced.note = Some("sem picles".into());
        cart.add_item(replaced).unwrap();
        assert_eq!(cart.lines()[0].note.as_deref(), Some("sem picles"));
    }

    #[test]
    fn test_totals_follow_every_mutation() {
        let mut cart = Cart::new("s1");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let first = cart.add_item(line(a, 2, 1890)).unwrap();
        cart.add_item(line(b, 1, 750)).unwrap();
        let expected: Money = cart.lines().iter().map(CartLine::line_total).sum();
        assert_eq!(cart.total(), expected);
        cart.remove_item(first).unwrap();
        assert_eq!(cart.total().amount(), Decimal::new(750, 2));
        assert_eq!(cart.total(), cart.subtotal());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut cart = Cart::new("s1");
        assert_eq!(cart.add_item(line(Uuid::new_v4(), 0, 1000)), Err(CartError::InvalidQuantity));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_unknown_item() {
        let mut cart = Cart::new("s1");
        cart.add_item(line(Uuid::new_v4(), 1, 1000)).unwrap();
        let before = cart.subtotal();
        assert_eq!(cart.remove_item(Uuid::new_v4()), Err(CartError::ItemNotFound));
        assert_eq!(cart.subtotal(), before);
    }

    #[test]
    fn test_confirm_empty_cart_fails() {
        let mut cart = Cart::new("s1");
        assert_eq!(cart.confirm(), Err(CartError::EmptyCart));
        assert!(!cart.is_confirmed());
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut cart = Cart::new("s1");
        cart.add_item(line(Uuid::new_v4(), 1, 1000)).unwrap();
        cart.confirm().unwrap();
        cart.confirm().unwrap();
        assert!(cart.is_confirmed());
    }
}
