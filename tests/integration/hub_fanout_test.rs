//! Drives a real `Hub` over real zmq sockets bound on ephemeral-ish local
//! ports and verifies the ordering invariant from the fan-out scenario:
//! a wildcard subscriber must observe pushed events in push order, with
//! consecutive `eid`s.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lunaricorn::core::signaling::client::Client as SignalingClient;
use lunaricorn::core::signaling::hub::{self, Hub};
use lunaricorn::core::signaling::model::SignalingEvent;
use lunaricorn::core::signaling::store::EventStore;

use super::test_helpers;

fn ephemeral_ports() -> (u16, u16) {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let base = 41000 + (nanos % 4000) as u16;
    (base, base + 1)
}

#[tokio::test]
async fn subscriber_observes_events_in_push_order() {
    let Some(store) = test_helpers::try_connect().await else {
        return;
    };
    let events = EventStore::new(store);
    events.install_schema().await.unwrap();
    let hub_state = Arc::new(Hub::new(events));

    let (rep_port, pub_port) = ephemeral_ports();
    let rep_addr = format!("tcp://127.0.0.1:{rep_port}");
    let pub_addr = format!("tcp://127.0.0.1:{pub_port}");
    let rt = tokio::runtime::Handle::current();
    let _rep_thread = hub::spawn_rep_loop(
        hub_state.clone(),
        zmq::Context::new(),
        rep_addr.clone(),
        pub_addr.clone(),
        rt,
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let client = SignalingClient::connect(
        &rep_addr,
        &pub_addr,
        "http://127.0.0.1:1",
        Duration::from_secs(2),
    )
    .unwrap();
    let received: Arc<Mutex<Vec<SignalingEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_store = received.clone();
    client.watch_all();
    client.set_sink(Arc::new(move |event| sink_store.lock().unwrap().push(event)));
    client.start(Duration::from_secs(30)).unwrap();
    // Let the SUB socket complete its connection handshake before pushing.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let marker = test_helpers::unique("fanout");
    let mut pushed_eids = Vec::new();
    for event_type in ["a", "b", "a"] {
        let eid = client
            .push_event(
                event_type,
                serde_json::json!({"marker": &marker}),
                Some("test"),
                None,
            )
            .unwrap();
        pushed_eids.push(eid);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let count = received
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.payload.get("marker").and_then(|v| v.as_str()) == Some(marker.as_str()))
            .count();
        if count >= 3 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("subscriber never observed all three pushed events");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let observed: Vec<i64> = received
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.payload.get("marker").and_then(|v| v.as_str()) == Some(marker.as_str()))
        .map(|e| e.eid)
        .collect();
    assert_eq!(observed, pushed_eids);
    assert_eq!(pushed_eids[1], pushed_eids[0] + 1);
    assert_eq!(pushed_eids[2], pushed_eids[0] + 2);

    client.stop();
}
