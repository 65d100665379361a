// src/core/signaling/mod.rs

//! The signaling bus: persistent pub/sub event fabric.

pub mod client;
pub mod hub;
mod http;
pub mod model;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::config::SignalingConfig;
use crate::core::leader;
use crate::core::persistence::Store;

use hub::Hub;
use store::EventStore;

pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = SignalingConfig::from_file(config_path)?;
    let db_config = (&config.db).into();
    let store = Arc::new(Store::connect(&db_config).await?);
    let events = EventStore::new(store);
    events.install_schema().await?;
    let hub = Arc::new(Hub::new(events));

    let identity = leader::client::Identity {
        node_name: "signaling".to_string(),
        node_type: "signaling".to_string(),
        instance_key: format!("signaling-{}", std::process::id()),
        host: None,
        port: Some(config.api_port),
    };
    let leader_client = leader::client::Client::new(&config.cluster.leader_url, identity);
    let (leader_shutdown_tx, leader_shutdown_rx) = watch::channel(false);
    let beacon_handle = leader_client
        .start(
            Duration::from_secs(config.cluster.beacon_interval_secs),
            Duration::from_secs(30),
            leader_shutdown_rx,
        )
        .await?;

    let ctx = zmq::Context::new();
    let rt_handle = tokio::runtime::Handle::current();
    let rep_addr = format!("tcp://{}:{}", config.host, config.rep_port);
    let pub_addr = format!("tcp://{}:{}", config.host, config.pub_port);
    let _rep_thread = hub::spawn_rep_loop(hub.clone(), ctx, rep_addr, pub_addr, rt_handle);
    let _sweeper = hub::spawn_liveness_sweeper(
        hub.clone(),
        Duration::from_secs(config.subscriber_timeout_secs),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut http_rx = shutdown_tx.subscribe();
    let http_addr = format!("{}:{}", config.host, config.api_port);
    let http_hub = hub.clone();
    let http_task = tokio::spawn(async move {
        http::serve(http_hub, http_addr, async move {
            let _ = http_rx.recv().await;
        })
        .await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("signaling hub shutting down");
    let _ = shutdown_tx.send(());
    let _ = leader_shutdown_tx.send(true);
    let _ = http_task.await;
    beacon_handle.abort();
    Ok(())
}
