// src/core/orb/http.rs

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use super::model::{OrbData, OrbMeta};
use super::storage::Storage;
use crate::core::errors::OrbError;

type SharedStorage = Arc<Storage>;

pub async fn serve(
    storage: SharedStorage,
    addr: String,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = router(storage);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

fn router(storage: SharedStorage) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1/data", post(push_data))
        .route("/v1/data/{u}", get(fetch_data))
        .route("/v1/meta", post(push_meta))
        .route("/v1/meta/{id}", get(fetch_meta))
        .with_state(storage)
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "lunaricorn orb store", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn push_data(
    State(storage): State<SharedStorage>,
    Json(record): Json<OrbData>,
) -> Result<impl IntoResponse, OrbError> {
    Ok(Json(storage.push_data(record).await?))
}

async fn fetch_data(
    State(storage): State<SharedStorage>,
    Path(u): Path<Uuid>,
) -> Result<impl IntoResponse, OrbError> {
    Ok(Json(storage.fetch_data(u).await?))
}

async fn push_meta(
    State(storage): State<SharedStorage>,
    Json(record): Json<OrbMeta>,
) -> Result<impl IntoResponse, OrbError> {
    Ok(Json(storage.push_meta(record).await?))
}

async fn fetch_meta(
    State(storage): State<SharedStorage>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, OrbError> {
    Ok(Json(storage.fetch_meta(id).await?))
}
