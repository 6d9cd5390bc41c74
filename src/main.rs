// src/main.rs

use dotenvy::dotenv;
use quiz_engine::config::Config;
use quiz_engine::routes;
use quiz_engine::site::rest::RestSiteClient;
use quiz_engine::state::AppState;
use quiz_engine::storage::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "quiz_engine.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Open the local store, migrations included
    let store = LocalStore::connect(&config.database_url).await?;
    tracing::info!("Local store ready at {}", config.database_url);

    let client = RestSiteClient::new(&config.site_url, &config.site_token, config.site_user_id)?;
    tracing::info!("Using site {} as user {}", config.site_url, config.site_user_id);

    let state = AppState::new(config.clone(), Arc::new(client), store);

    spawn_sync_task(&state);
    spawn_event_logger(&state);

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically pushes offline answers of every quiz to the site.
fn spawn_sync_task(state: &AppState) {
    let sync = Arc::clone(&state.sync);
    let period = Duration::from_secs(state.config.sync_interval.max(1) as u64);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match sync.sync_all_quizzes(false).await {
                Ok(0) => {}
                Ok(synced) => tracing::info!("Synced offline data of {} quizzes", synced),
                Err(e) => tracing::warn!("Offline sync failed: {}", e),
            }
        }
    });
}

fn spawn_event_logger(state: &AppState) {
    let mut events = state.events.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!(
                    "Attempt {} of quiz {} finished (synced: {}), review can be opened",
                    event.attempt_id,
                    event.quiz_id,
                    event.synced
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} attempt events", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}
