// src/core/signaling/model.rs

use serde::{Deserialize, Serialize};

pub const OWNERLESS: &str = "ownerless";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingEvent {
    pub eid: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: serde_json::Value,
    pub affected: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub source: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub client_id: String,
    pub event_type: Option<String>,
    pub message: Option<serde_json::Value>,
    pub timestamp: Option<i64>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub affected: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status")]
pub enum PushReply {
    #[serde(rename = "success")]
    Success { eid: i64 },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "failed")]
    Failed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BrowseRequest {
    pub timestamp: i64,
    #[serde(default)]
    pub event_types: Option<Vec<String>>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub affected: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<i64>,
}
