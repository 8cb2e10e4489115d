//! Catalog API - products, categories and product images over REST

use axum::middleware;
use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use migration::Migrator;
use observability::metrics_middleware;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    observability::init_metrics();

    let db = match &config.database {
        Some(database) => {
            info!("Connecting to PostgreSQL");
            let db = database::postgres::connect_from_config_with_retry(
                database.clone(),
                Some(config.db_retry.clone()),
            )
            .await
            .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

            if config.run_migrations {
                database::postgres::run_migrations::<Migrator>(&db, config.app.name)
                    .await
                    .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;
            }
            Some(db)
        }
        None => {
            warn!("CATALOG_USE_IN_MEMORY is set: the catalog lives only as long as this process");
            None
        }
    };

    let state = AppState { config, db };

    // Build router with API routes (pass reference, not ownership!)
    let api_routes = api::routes(&state);
    let router = axum_helpers::create_router::<openapi::ApiDoc>(
        api_routes,
        state.config.body_limit_bytes(),
    )
    .await?;

    // - /health: liveness with app name/version
    // - /ready: readiness with a database probe
    // - /metrics: Prometheus scrape
    // - /<upload folder>/*: stored product images
    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()))
        .merge(api::metrics_router())
        .merge(api::uploads_router(&state.config.storage))
        .layer(middleware::from_fn(metrics_middleware));

    info!(
        port = state.config.server.port,
        in_memory = state.db.is_none(),
        "Starting Catalog API"
    );

    let db = state.db.clone();
    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30),
        async move {
            if let Some(db) = db {
                info!("Shutting down: closing database connections");
                match db.close().await {
                    Ok(()) => info!("PostgreSQL connection closed successfully"),
                    Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
                }
            }
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Catalog API shutdown complete");
    Ok(())
}
