// src/core/leader/mod.rs

//! The cluster registrar: liveness beacons, readiness, monotonic ids.

pub mod client;
mod http;
pub mod model;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::Row;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::LeaderConfig;
use crate::core::errors::LeaderError;
use crate::core::persistence::Store;

use model::{ClusterInfo, ListResponse, NodeRecord, NodeState};

pub struct LeaderState {
    pub config: LeaderConfig,
    pub store: Arc<Store>,
}

impl LeaderState {
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    pub async fn install_schema(&self) -> Result<(), LeaderError> {
        self.store
            .install(|conn| {
                Box::pin(async move {
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS last_seen (
                            instance_key TEXT PRIMARY KEY,
                            node_name TEXT NOT NULL,
                            node_type TEXT NOT NULL,
                            host TEXT,
                            port INTEGER,
                            last_seen BIGINT NOT NULL
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS cluster_state (
                            key TEXT PRIMARY KEY,
                            i BIGINT NOT NULL,
                            j JSONB NOT NULL DEFAULT '{}'::jsonb
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS node_state (
                            node TEXT PRIMARY KEY,
                            token TEXT NOT NULL DEFAULT '',
                            ok BOOLEAN NOT NULL,
                            msg TEXT NOT NULL DEFAULT 'ok',
                            ex JSONB NOT NULL DEFAULT '{}'::jsonb
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(LeaderError::from)
    }

    pub async fn beacon(
        &self,
        node_name: &str,
        node_type: &str,
        instance_key: &str,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<(), LeaderError> {
        if node_name.is_empty() || node_type.is_empty() || instance_key.is_empty() {
            return Err(LeaderError::InvalidRequest(
                "Invalid or missing node_name".to_string(),
            ));
        }
        let now = Self::now();
        let node_name = node_name.to_string();
        let node_type = node_type.to_string();
        let instance_key = instance_key.to_string();
        let host = host.map(|s| s.to_string());
        self.store
            .with_tx(move |tx| {
                let node_name = node_name.clone();
                let node_type = node_type.clone();
                let instance_key = instance_key.clone();
                let host = host.clone();
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO last_seen (instance_key, node_name, node_type, host, port, last_seen)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (instance_key) DO UPDATE SET
                            node_name = EXCLUDED.node_name,
                            node_type = EXCLUDED.node_type,
                            host = EXCLUDED.host,
                            port = EXCLUDED.port,
                            last_seen = EXCLUDED.last_seen",
                    )
                    .bind(&instance_key)
                    .bind(&node_name)
                    .bind(&node_type)
                    .bind(&host)
                    .bind(port.map(|p| p as i32))
                    .execute(&mut **tx)
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(LeaderError::from)
    }

    async fn alive_nodes(&self) -> Result<Vec<NodeRecord>, LeaderError> {
        let cutoff = Self::now() - self.config.discover.alive_timeout as i64;
        let rows = self
            .store
            .with_tx(move |tx| {
                Box::pin(async move {
                    sqlx::query(
                        "SELECT instance_key, node_name, node_type, host, port, last_seen
                         FROM last_seen WHERE last_seen >= $1",
                    )
                    .bind(cutoff)
                    .fetch_all(&mut **tx)
                    .await
                })
            })
            .await
            .map_err(LeaderError::from)?;
        Ok(rows
            .into_iter()
            .map(|r| NodeRecord {
                instance_key: r.get("instance_key"),
                node_name: r.get("node_name"),
                node_type: r.get("node_type"),
                host: r.get("host"),
                port: r.get("port"),
                last_seen: r.get("last_seen"),
            })
            .collect())
    }

    pub async fn is_ready(&self) -> Result<bool, LeaderError> {
        let nodes = self.alive_nodes().await?;
        let names: std::collections::HashSet<_> = nodes.iter().map(|n| n.node_name.clone()).collect();
        Ok(self
            .config
            .discover
            .required_nodes
            .iter()
            .all(|req| names.contains(req)))
    }

    pub async fn list(&self) -> Result<ListResponse, LeaderError> {
        if !self.is_ready().await? {
            return Err(LeaderError::NotReady);
        }
        let nodes = self.alive_nodes().await?;
        Ok(ListResponse {
            total_count: nodes.len(),
            services: nodes,
            timestamp: Self::now(),
        })
    }

    pub async fn cluster_info(&self) -> Result<ClusterInfo, LeaderError> {
        let nodes = self.alive_nodes().await?;
        let alive: std::collections::HashSet<_> = nodes.iter().map(|n| n.node_name.clone()).collect();
        let mut summary = BTreeMap::new();
        let mut names: std::collections::BTreeSet<String> =
            self.config.discover.required_nodes.iter().cloned().collect();
        names.extend(alive.iter().cloned());
        for name in names {
            let state = if alive.contains(&name) { "on" } else { "off" };
            summary.insert(name, state.to_string());
        }
        Ok(ClusterInfo {
            nodes_summary: summary,
            required_nodes: self.config.discover.required_nodes.clone(),
        })
    }

    /// Reads `cluster_config_path` off disk fresh on every call, so an
    /// operator editing the file doesn't need to restart the registrar
    /// for `getenv` callers to see the change.
    pub fn cluster_config(&self) -> Result<serde_yaml::Value, LeaderError> {
        let raw = std::fs::read_to_string(&self.config.cluster_config_path).map_err(|e| {
            LeaderError::Internal(format!(
                "reading cluster config {}: {e}",
                self.config.cluster_config_path
            ))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            LeaderError::Internal(format!(
                "parsing cluster config {}: {e}",
                self.config.cluster_config_path
            ))
        })
    }

    pub async fn next_message_id(&self) -> Result<i64, LeaderError> {
        self.store
            .next_cluster_state("MESSAGE_ID")
            .await
            .map_err(LeaderError::from)
    }

    pub async fn next_object_id(&self) -> Result<i64, LeaderError> {
        self.store
            .next_cluster_state("OBJECT_ID")
            .await
            .map_err(LeaderError::from)
    }

    pub async fn report_state(&self, state: NodeState) -> Result<(), LeaderError> {
        self.store
            .with_tx(move |tx| {
                let state = state.clone();
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO node_state (node, token, ok, msg, ex) VALUES ($1, $2, $3, $4, $5)
                         ON CONFLICT (node) DO UPDATE SET
                            token = EXCLUDED.token, ok = EXCLUDED.ok,
                            msg = EXCLUDED.msg, ex = EXCLUDED.ex",
                    )
                    .bind(&state.node)
                    .bind(&state.token)
                    .bind(state.ok)
                    .bind(&state.msg)
                    .bind(&state.ex)
                    .execute(&mut **tx)
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(LeaderError::from)
    }

    pub async fn node_states(&self) -> Result<BTreeMap<String, NodeState>, LeaderError> {
        let rows = self
            .store
            .with_tx(move |tx| {
                Box::pin(async move {
                    sqlx::query("SELECT node, token, ok, msg, ex FROM node_state")
                        .fetch_all(&mut **tx)
                        .await
                })
            })
            .await
            .map_err(LeaderError::from)?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let node: String = r.get("node");
                (
                    node.clone(),
                    NodeState {
                        node,
                        token: r.get("token"),
                        ok: r.get("ok"),
                        msg: r.get("msg"),
                        ex: r.get("ex"),
                    },
                )
            })
            .collect())
    }

    /// Deletes `last_seen` rows older than `max_age_secs`. Never touches a
    /// currently-alive node, since the prune window is always evaluated
    /// against a cutoff stricter than the alive window it guards.
    pub async fn prune_stale_nodes(&self, max_age_secs: u64) -> Result<u64, LeaderError> {
        let cutoff = Self::now() - max_age_secs as i64;
        let affected = self
            .store
            .with_tx(move |tx| {
                Box::pin(async move {
                    let res = sqlx::query("DELETE FROM last_seen WHERE last_seen < $1")
                        .bind(cutoff)
                        .execute(&mut **tx)
                        .await?;
                    Ok(res.rows_affected())
                })
            })
            .await
            .map_err(LeaderError::from)?;
        Ok(affected)
    }
}

pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = LeaderConfig::from_file(config_path)?;
    let db_config = (&config.discover.db).into();
    let store = Arc::new(Store::connect(&db_config).await?);
    let state = Arc::new(LeaderState { config, store });
    state.install_schema().await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = JoinSet::new();

    let prune_state = state.clone();
    let mut prune_rx = shutdown_tx.subscribe();
    tasks.spawn(async move {
        let interval = prune_state.config.discover.prune_interval_secs.max(60);
        let max_age = prune_state.config.discover.alive_timeout * 10;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {
                    match prune_state.prune_stale_nodes(max_age).await {
                        Ok(n) if n > 0 => info!(pruned = n, "pruned stale nodes"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "failed to prune stale nodes"),
                    }
                }
                _ = prune_rx.recv() => break,
            }
        }
    });

    let http_state = state.clone();
    let mut http_rx = shutdown_tx.subscribe();
    tasks.spawn(async move { http::serve(http_state, http_rx.recv()).await });

    tokio::signal::ctrl_c().await.ok();
    info!("leader shutting down");
    let _ = shutdown_tx.send(());
    while tasks.join_next().await.is_some() {}
    Ok(())
}
