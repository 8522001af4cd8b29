//! Totem Orders - service entry point

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use totem_orders::api::{self, AppState};
use totem_orders::config::Config;
use totem_orders::gateway::SandboxGateway;
use totem_orders::services::{CartService, CheckoutService, EventPublisher, KitchenService};
use totem_orders::stores::{memory::MemoryBackend, Stores};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let stores = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Stores::postgres(db, config.cart_ttl_secs)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            Stores::in_memory(MemoryBackend::new(config.cart_ttl_secs))
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(error = %err, "could not connect to NATS, events disabled");
                None
            }
        },
        None => None,
    };
    let events = EventPublisher::new(nats);

    let gateway = Arc::new(SandboxGateway::new(
        config.gateway_base_url.clone(),
        config.qr_ttl_secs,
    ));

    let state = AppState {
        carts: CartService::new(stores.catalog.clone(), stores.carts.clone()),
        checkout: CheckoutService::new(
            stores.carts.clone(),
            stores.payments.clone(),
            stores.orders.clone(),
            stores.customers.clone(),
            gateway,
            stores.placement.clone(),
            events.clone(),
            config.strict_checkout_amount,
        ),
        kitchen: KitchenService::new(stores.orders.clone(), stores.placement.clone(), events),
    };

    let app = api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("totem-orders listening on 0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
