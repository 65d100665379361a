//! Exercises the orb storage layer's signaling emission against a hand
//! rolled REQ/REP responder standing in for the signaling hub, so these
//! tests only need a reachable Postgres instance and not a full hub
//! process.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lunaricorn::core::signaling::client::Client as SignalingClient;
use lunaricorn::orb::model::{OrbData, OrbDataSubtype, OrbMeta};
use lunaricorn::orb::storage::Storage;

use super::test_helpers;

type Received = Arc<Mutex<Vec<serde_json::Value>>>;

fn spawn_fake_hub() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let ctx = zmq::Context::new();
        let rep = ctx.socket(zmq::REP).expect("create REP socket");
        rep.bind("tcp://127.0.0.1:0").expect("bind REP socket");
        let endpoint = rep
            .get_last_endpoint()
            .expect("last endpoint call")
            .expect("valid endpoint string");
        tx.send(endpoint).unwrap();
        loop {
            let msg = match rep.recv_bytes(0) {
                Ok(m) => m,
                Err(_) => break,
            };
            let value: serde_json::Value =
                serde_json::from_slice(&msg).unwrap_or(serde_json::Value::Null);
            let reply = if value.get("type").and_then(|v| v.as_str()) == Some("push") {
                let mut guard = received_clone.lock().unwrap();
                guard.push(value);
                serde_json::json!({ "status": "success", "eid": guard.len() as i64 })
            } else {
                serde_json::json!({ "status": "success" })
            };
            let _ = rep.send(serde_json::to_vec(&reply).unwrap(), 0);
        }
    });
    let endpoint = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("fake hub failed to start");
    (endpoint, received)
}

fn storage_with_fake_hub(store: Arc<lunaricorn::core::persistence::Store>) -> (Storage, Received) {
    let (rep_addr, received) = spawn_fake_hub();
    let client = SignalingClient::connect(
        &rep_addr,
        "tcp://127.0.0.1:1",
        "http://127.0.0.1:1",
        Duration::from_secs(2),
    )
    .expect("connect signaling client");
    (Storage::new(store, client), received)
}

#[tokio::test]
async fn push_data_emits_exactly_one_file_op_new_event() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let (storage, received) = storage_with_fake_hub(store);
    storage.install_schema().await.unwrap();

    let record = OrbData {
        subtype: OrbDataSubtype::Json,
        data: serde_json::json!({"hello": "world"}),
        ..Default::default()
    };
    let saved = storage.push_data(record).await.unwrap();
    assert!(saved.u.is_some());

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event["event_type"].as_str(), Some("FileOp_new"));
    assert_eq!(event["tags"][0].as_str(), Some("orb"));
    assert_eq!(
        event["message"]["uuid"].as_str(),
        Some(saved.u.unwrap().to_string().as_str())
    );
}

#[tokio::test]
async fn push_data_update_emits_file_op_update_event() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let (storage, received) = storage_with_fake_hub(store);
    storage.install_schema().await.unwrap();

    let created = storage
        .push_data(OrbData {
            data: serde_json::json!({"v": 1}),
            ..Default::default()
        })
        .await
        .unwrap();
    received.lock().unwrap().clear();

    let updated = storage
        .push_data(OrbData {
            u: created.u,
            data: serde_json::json!({"v": 2}),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.u, created.u);

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"].as_str(), Some("FileOp_update"));
}

#[tokio::test]
async fn push_meta_new_record_emits_matching_id_and_uuid() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let (storage, received) = storage_with_fake_hub(store);
    storage.install_schema().await.unwrap();

    let u = uuid::Uuid::now_v7();
    let saved = storage
        .push_meta(OrbMeta {
            u: Some(u),
            handle: 7,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(saved.id > 0);

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"].as_str(), Some("FileOp_new"));
    assert_eq!(events[0]["message"]["id"].as_i64(), Some(saved.id));
    assert_eq!(events[0]["message"]["uuid"].as_str(), Some(u.to_string().as_str()));
}

#[tokio::test]
async fn fetch_returns_none_for_absent_records() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let (storage, _received) = storage_with_fake_hub(store);
    storage.install_schema().await.unwrap();

    assert!(storage.fetch_data(uuid::Uuid::now_v7()).await.unwrap().is_none());
    assert!(storage.fetch_meta(-1).await.unwrap().is_none());
}
