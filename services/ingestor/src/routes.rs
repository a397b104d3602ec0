//! The unauthenticated control surface: start/stop/restart/status for
//! individual listeners, a list-all endpoint, autostart, and the liveness
//! and readiness probes. Operator-facing CRUD for client configuration and
//! its authentication layer live outside this service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use cdc_engine::Manager;
use cdc_protocol::{ClientId, StartListenerRequest};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
    pub pool: PgPool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/internal/listeners/{client_id}/start", post(start_listener))
        .route("/internal/listeners/{client_id}/stop", post(stop_listener))
        .route("/internal/listeners/{client_id}/restart", post(restart_listener))
        .route("/internal/listeners/{client_id}", get(get_listener))
        .route("/internal/listeners", get(list_listeners))
        .route("/internal/listeners/autostart", post(autostart))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

async fn start_listener(State(state): State<AppState>, Path(client_id): Path<ClientId>, Json(body): Json<StartListenerRequest>) -> impl IntoResponse {
    Json(state.manager.start(client_id, body.replay).await)
}

async fn stop_listener(State(state): State<AppState>, Path(client_id): Path<ClientId>) -> impl IntoResponse {
    Json(state.manager.stop(client_id).await)
}

async fn restart_listener(State(state): State<AppState>, Path(client_id): Path<ClientId>, Json(body): Json<StartListenerRequest>) -> impl IntoResponse {
    Json(state.manager.restart(client_id, body.replay).await)
}

async fn get_listener(State(state): State<AppState>, Path(client_id): Path<ClientId>) -> impl IntoResponse {
    Json(state.manager.status(client_id).await)
}

async fn list_listeners(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.status_all().await)
}

async fn autostart(State(state): State<AppState>) -> impl IntoResponse {
    match state.manager.autostart_active().await {
        Ok(response) => Json(response).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database unreachable"),
    }
}
