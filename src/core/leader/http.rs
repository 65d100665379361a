// src/core/leader/http.rs

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use super::LeaderState;
use super::model::{BeaconRequest, NodeStateRequest};
use crate::core::errors::LeaderError;

type SharedState = Arc<LeaderState>;

pub async fn serve(
    state: SharedState,
    shutdown: impl Future<Output = Result<(), tokio::sync::broadcast::error::RecvError>> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await?;
    Ok(())
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/v1", get(root_v1))
        .route("/health", get(health))
        .route("/v1/imalive", post(imalive))
        .route("/v1/list", get(list))
        .route("/v1/discover", post(discover))
        .route("/v1/clusterinfo", get(cluster_info))
        .route("/v1/getenv", get(get_env))
        .route("/v1/utils/get_mid", get(get_mid))
        .route("/v1/utils/get_oid", get(get_oid))
        .route("/v1/nodestate", post(node_state))
        .route("/v1/nodestates", get(node_states))
        .fallback(not_found)
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "lunaricorn cluster registrar",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/v1",
        "status": "ok",
    }))
}

async fn root_v1() -> impl IntoResponse {
    Json(json!({
        "message": "lunaricorn cluster registrar",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/v1/imalive", "/v1/list", "/v1/discover", "/v1/clusterinfo",
            "/v1/getenv", "/v1/utils/get_mid", "/v1/utils/get_oid",
            "/v1/nodestate", "/v1/nodestates",
        ],
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "timestamp": now() }))
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

async fn imalive(
    State(state): State<SharedState>,
    Json(req): Json<BeaconRequest>,
) -> Result<impl IntoResponse, LeaderError> {
    state
        .beacon(
            &req.node_name,
            &req.node_type,
            &req.instance_key,
            req.host.as_deref(),
            req.port,
        )
        .await?;
    Ok(Json(json!({ "status": "received" })))
}

async fn list(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    Ok(Json(state.list().await?))
}

async fn discover(Json(body): Json<serde_json::Value>) -> impl IntoResponse {
    let query = body.get("query").cloned().unwrap_or(serde_json::Value::Null);
    Json(json!({
        "query": query,
        "results": [],
        "total_count": 0,
        "timestamp": now(),
    }))
}

async fn cluster_info(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    Ok(Json(state.cluster_info().await?))
}

async fn get_env(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    if !state.is_ready().await? {
        return Err(LeaderError::NotReady);
    }
    let cfg = state.cluster_config()?;
    Ok(Json(json!({
        "cfg": cfg,
        "core": {"required_nodes": state.config.discover.required_nodes},
        "timestamp": now(),
    })))
}

async fn get_mid(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    let mid = state.next_message_id().await?;
    Ok(Json(json!({ "mid": mid })))
}

async fn get_oid(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    let oid = state.next_object_id().await?;
    Ok(Json(json!({ "oid": oid })))
}

async fn node_state(
    State(state): State<SharedState>,
    Json(req): Json<NodeStateRequest>,
) -> Result<impl IntoResponse, LeaderError> {
    state
        .report_state(super::model::NodeState {
            node: req.node,
            token: String::new(),
            ok: req.ok,
            msg: req.msg.unwrap_or_else(|| "ok".to_string()),
            ex: req.ex.unwrap_or(serde_json::Value::Null),
        })
        .await?;
    Ok(Json(json!({ "status": "received" })))
}

async fn node_states(State(state): State<SharedState>) -> Result<impl IntoResponse, LeaderError> {
    Ok(Json(state.node_states().await?))
}

async fn not_found() -> impl IntoResponse {
    (axum::http::StatusCode::NOT_FOUND, Json(json!({ "message": "not found" })))
}
