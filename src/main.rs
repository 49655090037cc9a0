mod config;
mod datetime;
mod db;
mod fetcher;
mod ingest;
mod parser;
mod routes;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::fetcher::Fetcher;
use crate::ingest::Ingestor;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newswire=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load the static source configuration
    let config = Config::load("sources.toml")?;
    info!("Loaded {} sources from configuration", config.sources.len());

    // Initialize the article store
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:newswire.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);
    let ingestor = Arc::new(Ingestor::new(db.clone(), Fetcher::new(), config.sources));

    let state = Arc::new(AppState {
        db: db.clone(),
        ingestor,
    });

    let app = routes::router(state);

    // Start server
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server starting on http://localhost:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}
