// src/core/orb/mod.rs

//! The object store: two record families (`OrbData`, `OrbMeta`) exposed
//! concurrently over gRPC and HTTP, both backed by the same storage and
//! both registering with the cluster registrar.

mod grpc;
mod http;
pub mod model;
pub mod proto;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tonic::transport::Server;
use tracing::info;

use crate::config::OrbConfig;
use crate::core::leader;
use crate::core::persistence::Store;
use crate::core::signaling::client::Client as SignalingClient;

use grpc::OrbService;
use proto::orb::orb_server::OrbServer;
use storage::Storage;

pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = OrbConfig::from_file(config_path)?;
    let db_config = (&config.db).into();
    let store = Arc::new(Store::connect(&db_config).await?);

    let signaling = SignalingClient::connect(
        &config.signaling_rep_url,
        &config.signaling_sub_url,
        &config.signaling_api_url,
        Duration::from_secs(3),
    )?;

    let storage = Arc::new(Storage::new(store, signaling));
    storage.install_schema().await?;

    let identity = leader::client::Identity {
        node_name: "orb".to_string(),
        node_type: "orb".to_string(),
        instance_key: format!("orb-{}", std::process::id()),
        host: None,
        port: Some(config.http_port),
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

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let http_storage = storage.clone();
    let http_addr = format!("{}:{}", config.host, config.http_port);
    let mut http_rx = shutdown_tx.subscribe();
    let http_task = tokio::spawn(async move {
        http::serve(http_storage, http_addr, async move {
            let _ = http_rx.recv().await;
        })
        .await
    });

    let grpc_addr = format!("{}:{}", config.host, config.rpc_port).parse()?;
    let grpc_service = OrbServer::new(OrbService::new(storage.clone()));
    let mut grpc_rx = shutdown_tx.subscribe();
    let grpc_task = tokio::spawn(async move {
        Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, async move {
                let _ = grpc_rx.recv().await;
            })
            .await
    });

    info!(http = %config.http_port, rpc = %config.rpc_port, "orb server listening");

    tokio::signal::ctrl_c().await.ok();
    info!("orb server shutting down");
    let _ = shutdown_tx.send(());
    let _ = leader_shutdown_tx.send(true);
    let _ = http_task.await;
    let _ = grpc_task.await;
    beacon_handle.abort();
    Ok(())
}
