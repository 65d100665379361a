// src/config.rs

//! Shared configuration plumbing: YAML loading with environment-variable
//! overrides, following the same `from_file` + `validate()` shape for
//! every role's config struct.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::core::persistence::DbConfig;

fn default_alive_timeout() -> u64 {
    10
}

fn default_prune_interval() -> u64 {
    100
}

fn default_heartbeat_interval() -> u64 {
    5
}

/// The `discover` section shared by every role's config file: database
/// connection plus the registrar URL used by the cluster client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DbSection {
    #[serde(default = "default_db_type")]
    pub db_type: String,
    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default = "default_db_password")]
    pub db_password: String,
    #[serde(default = "default_db_name")]
    pub dbname: String,
}

fn default_db_type() -> String {
    "postgresql".to_string()
}
fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_user() -> String {
    "postgres".to_string()
}
fn default_db_password() -> String {
    "postgres".to_string()
}
fn default_db_name() -> String {
    "lunaricorn".to_string()
}

impl From<&DbSection> for DbConfig {
    fn from(s: &DbSection) -> Self {
        DbConfig {
            db_type: s.db_type.clone(),
            host: s.db_host.clone(),
            port: s.db_port,
            user: s.db_user.clone(),
            password: s.db_password.clone(),
            dbname: s.dbname.clone(),
        }
    }
}

impl DbSection {
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("db_type") {
            self.db_type = v;
        }
        if let Ok(v) = std::env::var("db_host") {
            self.db_host = v;
        }
        if let Ok(v) = std::env::var("db_port") {
            if let Ok(p) = v.parse() {
                self.db_port = p;
            }
        }
        if let Ok(v) = std::env::var("db_user") {
            self.db_user = v;
        }
        if let Ok(v) = std::env::var("db_password") {
            self.db_password = v;
        }
        if let Ok(v) = std::env::var("db_name") {
            self.dbname = v;
        }
    }
}

/// Configuration shared by every cluster-client user (signaling, orb).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterClientConfig {
    #[serde(default = "default_leader_url")]
    pub leader_url: String,
    #[serde(default = "default_heartbeat_interval")]
    pub beacon_interval_secs: u64,
}

fn default_leader_url() -> String {
    "http://localhost:9000".to_string()
}

impl Default for ClusterClientConfig {
    fn default() -> Self {
        Self {
            leader_url: default_leader_url(),
            beacon_interval_secs: default_heartbeat_interval(),
        }
    }
}

impl ClusterClientConfig {
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CLUSTER_LEADER_URL") {
            self.leader_url = v;
        }
    }
}

/// `leader_config.yaml`: registrar host/port and readiness policy.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaderConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_leader_port")]
    pub port: u16,
    pub discover: DiscoverSection,
    #[serde(default = "default_cluster_config_path")]
    pub cluster_config_path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_leader_port() -> u16 {
    9000
}
fn default_cluster_config_path() -> String {
    "cluster_config.yaml".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiscoverSection {
    #[serde(flatten)]
    pub db: DbSection,
    #[serde(default = "default_alive_timeout")]
    pub alive_timeout: u64,
    #[serde(default)]
    pub required_nodes: Vec<String>,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl LeaderConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading leader config from {path}"))?;
        let mut cfg: LeaderConfig =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing leader config {path}"))?;
        cfg.discover.db.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.discover.alive_timeout == 0 {
            return Err(anyhow!("discover.alive_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// `signaling_config.yaml`: hub sockets, history API and cluster client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignalingConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rep_port")]
    pub rep_port: u16,
    #[serde(default = "default_pub_port")]
    pub pub_port: u16,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_subscriber_timeout")]
    pub subscriber_timeout_secs: u64,
    #[serde(flatten)]
    pub db: DbSection,
    #[serde(default)]
    pub cluster: ClusterClientConfig,
}

fn default_rep_port() -> u16 {
    9100
}
fn default_pub_port() -> u16 {
    9101
}
fn default_api_port() -> u16 {
    9102
}
fn default_subscriber_timeout() -> u64 {
    30
}

impl SignalingConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading signaling config from {path}"))?;
        let mut cfg: SignalingConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing signaling config {path}"))?;
        cfg.db.apply_env();
        cfg.cluster.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.rep_port == self.pub_port {
            return Err(anyhow!("rep_port and pub_port must differ"));
        }
        Ok(())
    }
}

/// `orb_config.yaml`: RPC/HTTP ports and cluster client.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(flatten)]
    pub db: DbSection,
    #[serde(default)]
    pub cluster: ClusterClientConfig,
    #[serde(default = "default_signaling_url")]
    pub signaling_rep_url: String,
    #[serde(default = "default_signaling_sub_url")]
    pub signaling_sub_url: String,
    #[serde(default = "default_signaling_api_url")]
    pub signaling_api_url: String,
}

fn default_rpc_port() -> u16 {
    9200
}
fn default_http_port() -> u16 {
    9201
}
fn default_signaling_url() -> String {
    "tcp://localhost:9100".to_string()
}
fn default_signaling_sub_url() -> String {
    "tcp://localhost:9101".to_string()
}
fn default_signaling_api_url() -> String {
    "http://localhost:9102".to_string()
}

impl OrbConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading orb config from {path}"))?;
        let mut cfg: OrbConfig =
            serde_yaml::from_str(&raw).with_context(|| format!("parsing orb config {path}"))?;
        cfg.db.apply_env();
        cfg.cluster.apply_env();
        Ok(cfg)
    }
}
