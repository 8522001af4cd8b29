//! Cart operations
//!
//! Thin orchestration over the cart aggregate: resolve the product against
//! the catalog, load or lazily create the session cart, apply the mutation,
//! persist. Every mutation runs under the session's keyed lock so concurrent
//! kiosk taps cannot interleave load-mutate-save cycles.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::Money;
use crate::error::ServiceError;
use crate::stores::{CartStore, ProductCatalog};

use super::locks::KeyedLocks;

#[derive(Clone)]
pub struct CartService {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn CartStore>,
    locks: KeyedLocks,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
    pub item_id: Uuid,
    pub cart_subtotal: Money,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Money,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub category: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub note: Option<String>,
    pub subtotal: Money,
}

impl CartView {
    fn empty() -> Self {
        Self { items: vec![], subtotal: Money::ZERO, total: Money::ZERO }
    }

    fn from_cart(cart: &Cart) -> Self {
        Self {
            items: cart
                .lines()
                .iter()
                .map(|line| CartLineView {
                    item_id: line.id,
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    category: line.category.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    note: line.note.clone(),
                    subtotal: line.line_total(),
                })
                .collect(),
            subtotal: cart.subtotal(),
            total: cart.total(),
        }
    }
}

impl CartService {
    pub fn new(catalog: Arc<dyn ProductCatalog>, carts: Arc<dyn CartStore>) -> Self {
        Self { catalog, carts, locks: KeyedLocks::new() }
    }

    pub async fn add_item(
        &self,
        session_id: &str,
        product_id: Uuid,
        quantity: u32,
        note: Option<String>,
    ) -> Result<AddedItem, ServiceError> {
        let _guard = self.locks.acquire(session_id).await;

        let product = self
            .catalog
            .product(product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound(product_id))?;
        if !product.purchasable {
            return Err(ServiceError::ProductUnavailable(product_id));
        }

        let mut cart = self
            .carts
            .find(session_id)
            .await?
            .unwrap_or_else(|| Cart::new(session_id));
        let item_id = cart.add_item(CartLine {
            id: Uuid::new_v4(),
            product_id: product.id,
            product_name: product.name,
            category: product.category,
            unit_price: product.price,
            quantity,
            note,
        })?;
        self.carts.save(&cart).await?;

        Ok(AddedItem { item_id, cart_subtotal: cart.subtotal() })
    }

    pub async fn remove_item(&self, session_id: &str, item_id: Uuid) -> Result<Money, ServiceError> {
        let _guard = self.locks.acquire(session_id).await;

        let mut cart = self
            .carts
            .find(session_id)
            .await?
            .ok_or(ServiceError::CartNotFound)?;
        cart.remove_item(item_id)?;
        self.carts.save(&cart).await?;
        Ok(cart.subtotal())
    }

    pub async fn confirm(&self, session_id: &str) -> Result<Money, ServiceError> {
        let _guard = self.locks.acquire(session_id).await;

        let mut cart = self
            .carts
            .find(session_id)
            .await?
            .ok_or(ServiceError::CartNotFound)?;
        cart.confirm()?;
        self.carts.save(&cart).await?;
        Ok(cart.total())
    }

    /// Pure read. A session without a cart sees an empty cart, not an error.
    pub async fn view(&self, session_id: &str) -> Result<CartView, ServiceError> {
        Ok(self
            .carts
            .find(session_id)
            .await?
            .as_ref()
            .map(CartView::from_cart)
            .unwrap_or_else(CartView::empty))
    }
}
