use std::sync::Arc;
use std::time::Duration;

use lunaricorn::config::{DiscoverSection, LeaderConfig};
use lunaricorn::leader::LeaderState;

use super::test_helpers;

fn config(required_nodes: Vec<String>, alive_timeout: u64) -> LeaderConfig {
    let mut db = test_helpers::db_config();
    // LeaderConfig embeds the db section by field name, not by `DbConfig`;
    // build it through the yaml-facing `DiscoverSection` shape directly.
    let discover = DiscoverSection {
        db: lunaricorn::config::DbSection {
            db_type: db.db_type.clone(),
            db_host: std::mem::take(&mut db.host),
            db_port: db.port,
            db_user: std::mem::take(&mut db.user),
            db_password: std::mem::take(&mut db.password),
            dbname: std::mem::take(&mut db.dbname),
        },
        alive_timeout,
        required_nodes,
        prune_interval_secs: 3600,
    };
    LeaderConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        discover,
        cluster_config_path: "cluster_config.yaml".to_string(),
    }
}

#[tokio::test]
async fn registration_and_readiness_scenario() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };

    let signaling_name = test_helpers::unique("signaling");
    let orb_name = test_helpers::unique("orb");
    let cfg = config(vec![signaling_name.clone(), orb_name.clone()], 2);
    let state = Arc::new(LeaderState { config: cfg, store });
    state.install_schema().await.unwrap();

    state
        .beacon(&signaling_name, "sig", &test_helpers::unique("sig-key"), None, None)
        .await
        .unwrap();
    assert!(
        state.list().await.is_err(),
        "cluster must not be ready until every required node has beaconed"
    );

    state
        .beacon(&orb_name, "orb", &test_helpers::unique("orb-key"), None, None)
        .await
        .unwrap();
    let listing = state.list().await.expect("cluster should be ready now");
    assert!(listing.total_count >= 2);
    assert!(state.is_ready().await.unwrap());

    // Wait past the alive window without further beacons.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert!(
        state.list().await.is_err(),
        "readiness must lapse once a required node's beacon goes stale"
    );
}

#[tokio::test]
async fn beacon_rejects_missing_node_name() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let cfg = config(vec![], 10);
    let state = LeaderState { config: cfg, store };
    state.install_schema().await.unwrap();

    let err = state.beacon("", "sig", "some-key", None, None).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn repeated_beacon_with_same_key_does_not_grow_the_node_count() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let cfg = config(vec![], 10);
    let state = LeaderState { config: cfg, store };
    state.install_schema().await.unwrap();

    let key = test_helpers::unique("stable-key");
    state.beacon("stable", "svc", &key, None, None).await.unwrap();
    let first = state.list().await.unwrap().total_count;
    state.beacon("stable", "svc", &key, None, None).await.unwrap();
    let second = state.list().await.unwrap().total_count;
    assert_eq!(first, second);
}

#[tokio::test]
async fn monotonic_ids_are_distinct_and_increasing_under_concurrency() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let cfg = config(vec![], 10);
    let state = Arc::new(LeaderState { config: cfg, store });
    state.install_schema().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let state = state.clone();
        handles.push(tokio::spawn(async move { state.next_message_id().await.unwrap() }));
    }
    let mut ids: Vec<i64> = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len(), "ids must be distinct");
}

#[tokio::test]
async fn cluster_config_reads_the_configured_yaml_file() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let cfg = config(vec![], 10);
    let state = LeaderState { config: cfg, store };
    let doc = state.cluster_config().expect("cluster_config.yaml should parse");
    assert_eq!(doc.get("environment").and_then(|v| v.as_str()), Some("dev"));
}

#[tokio::test]
async fn cluster_config_surfaces_a_missing_file_as_an_error() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let mut cfg = config(vec![], 10);
    cfg.cluster_config_path = "does_not_exist.yaml".to_string();
    let state = LeaderState { config: cfg, store };
    assert!(state.cluster_config().is_err());
}

#[tokio::test]
async fn install_schema_is_idempotent() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let cfg = config(vec![], 10);
    let state = LeaderState { config: cfg, store };
    state.install_schema().await.unwrap();
    state.install_schema().await.unwrap();
}
