// src/core/errors.rs

//! Error types shared by every Lunaricorn role binary.

use std::sync::Arc;
use thiserror::Error;

/// Failures that can occur while talking to the shared relational store.
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database error: {0}")]
    Storage(Arc<sqlx::Error>),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        PersistenceError::Storage(Arc::new(e))
    }
}

/// Errors raised by the cluster registrar and its client.
#[derive(Error, Debug, Clone)]
pub enum LeaderError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("cluster is not ready")]
    NotReady,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("http client error: {0}")]
    HttpClient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for LeaderError {
    fn from(e: reqwest::Error) -> Self {
        LeaderError::HttpClient(e.to_string())
    }
}

/// Errors raised by the signaling hub and its client.
#[derive(Error, Debug, Clone)]
pub enum SignalingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("socket error: {0}")]
    Socket(String),

    #[error("request timed out")]
    Timeout,

    #[error("http client error: {0}")]
    HttpClient(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<zmq::Error> for SignalingError {
    fn from(e: zmq::Error) -> Self {
        SignalingError::Socket(e.to_string())
    }
}

impl From<reqwest::Error> for SignalingError {
    fn from(e: reqwest::Error) -> Self {
        SignalingError::HttpClient(e.to_string())
    }
}

impl From<serde_json::Error> for SignalingError {
    fn from(e: serde_json::Error) -> Self {
        SignalingError::Internal(format!("json error: {e}"))
    }
}

/// Errors raised by the object store and its RPC/HTTP surfaces.
#[derive(Error, Debug, Clone)]
pub enum OrbError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("signaling bus unavailable: {0}")]
    SignalingUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SignalingError> for OrbError {
    fn from(e: SignalingError) -> Self {
        OrbError::SignalingUnavailable(e.to_string())
    }
}

impl From<serde_json::Error> for OrbError {
    fn from(e: serde_json::Error) -> Self {
        OrbError::Internal(format!("json error: {e}"))
    }
}

impl From<OrbError> for tonic::Status {
    fn from(e: OrbError) -> Self {
        match e {
            OrbError::NotFound => tonic::Status::not_found("record not found"),
            OrbError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

mod axum_impls {
    use super::{LeaderError, OrbError, SignalingError};
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde_json::json;

    impl IntoResponse for LeaderError {
        fn into_response(self) -> Response {
            // Every registrar failure, including beacon validation, surfaces
            // as 500 with a bare diagnostic message, matching the original
            // leader service's make_response(..., 500) on every failure path.
            let message = match &self {
                LeaderError::NotReady => "not ready".to_string(),
                LeaderError::InvalidRequest(msg) => msg.clone(),
                other => other.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": message }))).into_response()
        }
    }

    impl IntoResponse for SignalingError {
        fn into_response(self) -> Response {
            let status = match &self {
                SignalingError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "message": self.to_string() }))).into_response()
        }
    }

    impl IntoResponse for OrbError {
        fn into_response(self) -> Response {
            let status = match &self {
                OrbError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                OrbError::NotFound => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(json!({ "message": self.to_string() }))).into_response()
        }
    }
}
