//! services/portal/src/bin/portal.rs
//!
//! Bootstraps the portal's persistence: migrates the schema, optionally seeds
//! the demo catalog, and warms the active-course cache.

use enrollment_core::CatalogFilter;
use portal_lib::{
    adapters::{DbAdapter, MemoryCacheAdapter},
    config::Config,
    error::ApiError,
    seed::seed_demo_catalog,
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting portal bootstrap...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = AppState::new(config.clone(), db_adapter, Arc::new(MemoryCacheAdapter::new()));

    // --- 4. Seed & Warm the Catalog ---
    if config.seed_demo_data {
        seed_demo_catalog(&app_state.lifecycle).await?;
    }

    let catalog = app_state
        .catalog
        .get_active_filtered(&CatalogFilter::default())
        .await?;
    info!(
        courses = catalog.len(),
        ttl_secs = config.catalog_cache_ttl.as_secs(),
        "Active catalog loaded"
    );
    for course in &catalog {
        let schedule = format!(
            "{}-{}",
            course.start_time.format("%H:%M"),
            course.end_time.format("%H:%M")
        );
        info!(
            code = %course.code,
            name = %course.name,
            credits = course.credits,
            %schedule,
            seats_available = course.seats_available(),
            "Course available"
        );
    }

    Ok(())
}
