use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::db::Database;
use crate::ingest::Ingestor;

const MIN_LIMIT: i64 = 1;
const MAX_LIMIT: i64 = 200;
const DEFAULT_LIMIT: i64 = 40;

pub struct AppState {
    pub db: Arc<Database>,
    pub ingestor: Arc<Ingestor>,
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/sources", get(list_sources))
        .route("/api/refresh", get(refresh))
        .route("/api/articles", get(articles))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Route handlers
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "News API is running" }))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn list_sources(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.ingestor.sources().to_vec())
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.ingestor.refresh_all().await;
    Json(report)
}

#[derive(Deserialize)]
pub struct ArticlesQuery {
    pub source: Option<String>,
    pub limit: Option<i64>,
    /// Fetch latest from sources before returning
    #[serde(default)]
    pub refresh: bool,
}

fn clamp_limit(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(MIN_LIMIT, MAX_LIMIT)
}

pub async fn articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticlesQuery>,
) -> Result<impl IntoResponse, AppError> {
    if query.refresh {
        // Best-effort: the report never fails the query, it is only logged.
        let report = state.ingestor.refresh_all().await;
        info!("Pre-query refresh inserted {} articles", report.inserted);
    }

    let limit = clamp_limit(query.limit);
    let articles = state
        .db
        .find_articles(query.source.as_deref(), limit)
        .await?;

    Ok(Json(articles))
}
