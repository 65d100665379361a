// src/core/leader/model.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeaconRequest {
    pub node_name: String,
    pub node_type: String,
    pub instance_key: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub additional: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_name: String,
    pub node_type: String,
    pub instance_key: String,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NodeState {
    pub node: String,
    #[serde(default)]
    pub token: String,
    pub ok: bool,
    #[serde(default = "default_msg")]
    pub msg: String,
    #[serde(default)]
    pub ex: serde_json::Value,
}

fn default_msg() -> String {
    "ok".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStateRequest {
    pub node: String,
    pub ok: bool,
    pub msg: Option<String>,
    pub ex: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterInfo {
    pub nodes_summary: std::collections::BTreeMap<String, String>,
    pub required_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub services: Vec<NodeRecord>,
    pub total_count: usize,
    pub timestamp: i64,
}
