mod auth;
mod config;
mod error;
mod forms;
mod handlers;
mod models;
mod render;
mod state;
mod store;

use std::sync::Arc;
use actix_web::{web, App, HttpServer};
use auth::AdminGate;
use config::AppConfig;
use render::JsonRenderer;
use state::AppState;
use tracing::{error, info, Level};
use tracing_subscriber::{self, EnvFilter};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("actix_web=info".parse().expect("valid directive"))
                .add_directive("product_catalog=debug".parse().expect("valid directive"))
        )
        .init();

    info!("Starting product catalog server");

    let config = AppConfig::init().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let store = store::open(&config.backend).await.map_err(|e| {
        error!("Failed to open product store: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    let bind_address = config.bind_address();
    let state = AppState {
        store: store.clone(),
        renderer: Arc::new(JsonRenderer),
        config: Arc::new(config),
    };

    info!("Listening on {}", bind_address);
    let served = HttpServer::new(move || {
        let gate = AdminGate::new(&state.config.jwt_secret, state.config.login_path.clone());
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(|cfg| handlers::configure(cfg, gate))
    })
    .bind(&bind_address)?
    .run()
    .await;

    if let Err(e) = store.close().await {
        error!("Failed to close product store: {}", e);
    }
    info!("Product catalog server stopped");
    served
}
