//! HTTP surface
//!
//! Route names follow the kiosk's public contract (Portuguese paths); the
//! handlers stay thin and delegate every decision to the services.

pub mod cart;
pub mod orders;
pub mod payment;
pub mod responses;

use axum::routing::{delete, get, post};
use axum::{Json, Router};

use crate::services::{CartService, CheckoutService, KitchenService};

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub checkout: CheckoutService,
    pub kitchen: KitchenService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/carrinho/adicionar", post(cart::add_item))
        .route("/carrinho/confirmar", post(cart::confirm))
        .route("/carrinho/visualizar", get(cart::view))
        .route("/carrinho/remover", delete(cart::remove_item))
        .route("/pagamento/gerar-qrcode", post(payment::generate_qr))
        .route("/pagamento/confirmar", post(payment::confirm))
        .route("/pagamento/registrar-pedido", post(payment::register_order))
        .route("/pagamento/verificar-timer/:payment_id", get(payment::check_timer))
        .route("/pedidos", get(orders::list))
        .route("/pedidos/:id", get(orders::get))
        .route("/pedidos/:id/preparar", post(orders::start_preparing))
        .route("/pedidos/:id/pronto", post(orders::mark_ready))
        .route("/pedidos/:id/retirar", post(orders::confirm_pickup))
        .route("/pedidos/:id/cancelar", post(orders::cancel))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "totem-orders" }))
}
