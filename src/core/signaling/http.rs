// src/core/signaling/http.rs

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::hub::Hub;
use super::model::BrowseRequest;
use crate::core::errors::SignalingError;

type SharedHub = Arc<Hub>;

pub async fn serve(
    hub: SharedHub,
    addr: String,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(hub);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn router(hub: SharedHub) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1/browse", post(browse))
        .route("/v1/list/{kind}", get(list))
        .route("/v1/stat/clients", get(stat_clients))
        .with_state(hub)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "lunaricorn signaling bus", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn browse(
    State(hub): State<SharedHub>,
    Json(req): Json<BrowseRequest>,
) -> Result<impl IntoResponse, SignalingError> {
    Ok(Json(hub.events.browse(&req).await?))
}

async fn list(
    State(hub): State<SharedHub>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, SignalingError> {
    Ok(Json(hub.events.list_distinct(&kind).await?))
}

async fn stat_clients(State(hub): State<SharedHub>) -> impl IntoResponse {
    Json(json!({ "active_clients": hub.liveness.len() }))
}
