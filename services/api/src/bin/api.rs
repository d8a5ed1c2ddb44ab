//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{JwtTokens, PgStore, WsHub},
    config::Config,
    engine::{NotificationEngine, Sweeper},
    error::ApiError,
    web::{router, state::AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
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
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Wire the Realtime Hub, Tokens and Engines ---
    let hub = Arc::new(WsHub::new());
    let tokens = Arc::new(JwtTokens::new(
        &config.token_secret,
        config.token_ttl_hours,
    ));
    let notifier = NotificationEngine::new(
        store.clone(),
        hub.clone(),
        config.dedupe_window_hours,
    );
    let sweeper = Sweeper::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        config.listing_grace_hours,
        config.reminder_lead_days,
        config.sweep_hour_utc,
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        users: store.clone(),
        books: store.clone(),
        listings: store.clone(),
        lendings: store.clone(),
        journal: store.clone(),
        habits: store.clone(),
        notifications: store.clone(),
        notifier: notifier.clone(),
        publisher: hub.clone(),
        tokens,
        hub: hub.clone(),
        sweeper: sweeper.clone(),
        config: config.clone(),
    });

    // --- 5. Start the Background Sweeper ---
    let shutdown = CancellationToken::new();
    let sweeper_task = tokio::spawn(sweeper.run(shutdown.clone()));

    // --- 6. Create the Web Router & Serve ---
    let app = router(app_state);
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
            shutdown.cancel();
        }
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // The sweeper observes the same token; give it a moment to wind down.
    shutdown.cancel();
    let _ = sweeper_task.await;
    Ok(())
}
