// src/core/leader/client.rs

//! Library used by every other role to register with and discover peers
//! through the cluster registrar.

use std::time::Duration;

use reqwest::Client as HttpClient;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::errors::LeaderError;

use super::model::{ClusterInfo, ListResponse, NodeState, NodeStateRequest};

#[derive(Clone)]
pub struct Identity {
    pub node_name: String,
    pub node_type: String,
    pub instance_key: String,
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub struct Client {
    base_url: String,
    identity: Identity,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: impl Into<String>, identity: Identity) -> Self {
        Self {
            base_url: base_url.into(),
            identity,
            http: HttpClient::new(),
        }
    }

    /// Polls the registrar until it answers `/health`, then sends an
    /// initial beacon and spawns a background task that beacons once per
    /// `interval`. The returned handle is joined on shutdown.
    pub async fn start(
        &self,
        interval: Duration,
        deadline: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, LeaderError> {
        self.wait_reachable(deadline).await?;
        self.beacon_once().await?;

        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let identity = self.identity.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = send_beacon(&http, &base_url, &identity).await {
                            warn!(error = %e, "beacon failed");
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(handle)
    }

    async fn wait_reachable(&self, deadline: Duration) -> Result<(), LeaderError> {
        let start = tokio::time::Instant::now();
        loop {
            match self.http.get(format!("{}/health", self.base_url)).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                _ => {
                    if start.elapsed() >= deadline {
                        return Err(LeaderError::HttpClient(
                            "registrar unreachable before deadline".to_string(),
                        ));
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    async fn beacon_once(&self) -> Result<(), LeaderError> {
        send_beacon(&self.http, &self.base_url, &self.identity).await
    }

    pub async fn list(&self) -> Result<ListResponse, LeaderError> {
        let resp = self.http.get(format!("{}/v1/list", self.base_url)).send().await?;
        Ok(resp.json().await?)
    }

    pub async fn cluster_info(&self) -> Result<ClusterInfo, LeaderError> {
        let resp = self
            .http
            .get(format!("{}/v1/clusterinfo", self.base_url))
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    pub async fn next_message_id(&self) -> Result<i64, LeaderError> {
        let resp = self
            .http
            .get(format!("{}/v1/utils/get_mid", self.base_url))
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;
        body.get("mid")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| LeaderError::Internal("malformed get_mid response".to_string()))
    }

    pub async fn next_object_id(&self) -> Result<i64, LeaderError> {
        let resp = self
            .http
            .get(format!("{}/v1/utils/get_oid", self.base_url))
            .send()
            .await?;
        let body: serde_json::Value = resp.json().await?;
        body.get("oid")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| LeaderError::Internal("malformed get_oid response".to_string()))
    }

    pub async fn report_state(
        &self,
        node: &str,
        ok: bool,
        msg: Option<&str>,
        ex: Option<serde_json::Value>,
    ) -> Result<(), LeaderError> {
        let req = NodeStateRequest {
            node: node.to_string(),
            ok,
            msg: msg.map(|s| s.to_string()),
            ex,
        };
        self.http
            .post(format!("{}/v1/nodestate", self.base_url))
            .json(&req)
            .send()
            .await?;
        Ok(())
    }

    pub async fn fetch_states(&self) -> Result<std::collections::BTreeMap<String, NodeState>, LeaderError> {
        let resp = self
            .http
            .get(format!("{}/v1/nodestates", self.base_url))
            .send()
            .await?;
        Ok(resp.json().await?)
    }
}

async fn send_beacon(http: &HttpClient, base_url: &str, identity: &Identity) -> Result<(), LeaderError> {
    debug!(node = %identity.node_name, "sending beacon");
    http.post(format!("{base_url}/v1/imalive"))
        .json(&json!({
            "node_name": identity.node_name,
            "node_type": identity.node_type,
            "instance_key": identity.instance_key,
            "host": identity.host,
            "port": identity.port,
        }))
        .send()
        .await?;
    Ok(())
}
