use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use workorbit_backend::app_state::AppState;
use workorbit_backend::config::Config;
use workorbit_backend::db::pool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(true)
        .init();

    Config::init();
    let config = Config::get();

    let db = pool::connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;
    pool::run_migrations(&db)
        .await
        .context("Failed to run migrations")?;

    let state = AppState::new(db.clone());
    let app = workorbit_backend::build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("🚀 Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down...");
}
