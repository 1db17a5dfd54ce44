use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

mod config;
mod db;
mod error;
mod model;
mod provider;
mod quest;
mod service;

use config::Config;
use db::Database;
use error::ServiceError;
use provider::HttpMatchProvider;
use quest::QuestView;
use service::QuestService;

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
struct AppState {
    service: Arc<QuestService>,
}

// ============================================================================
// HTTP Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis()
    }))
}

/// GET /api/users/:user_id/quests - offer cycle, then every quest state
async fn list_all_quests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<QuestView>>, ServiceError> {
    let quests = state.service.list_all_quests(user_id).await?;
    Ok(Json(quests))
}

/// POST /api/users/:user_id/quests/offers - current offered quests
async fn offer_quests(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<QuestView>>, ServiceError> {
    let quests = state.service.offer_quests(user_id).await?;
    Ok(Json(quests))
}

/// POST /api/users/:user_id/quests/:user_quest_id/activate
async fn activate_quest(
    State(state): State<AppState>,
    Path((user_id, user_quest_id)): Path<(i64, i64)>,
) -> Result<Json<QuestView>, ServiceError> {
    let quest = state.service.activate_quest(user_id, user_quest_id).await?;
    Ok(Json(quest))
}

/// POST /api/users/:user_id/quests/refresh - ingest recent matches
async fn refresh_progress(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<QuestView>>, ServiceError> {
    let quests = state.service.refresh_progress(user_id).await?;
    Ok(Json(quests))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("questline_server=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let provider = HttpMatchProvider::new(&config.provider_base_url, &config.provider_api_key);
    let state = AppState {
        service: Arc::new(QuestService::new(Arc::new(db), Arc::new(provider))),
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/users/:user_id/quests", get(list_all_quests))
        .route("/api/users/:user_id/quests/offers", post(offer_quests))
        .route("/api/users/:user_id/quests/refresh", post(refresh_progress))
        .route(
            "/api/users/:user_id/quests/:user_quest_id/activate",
            post(activate_quest),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([axum::http::header::CONTENT_TYPE]),
        )
        .with_state(state);

    info!("Quest server listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(listener, app).await.expect("Server error");
}
