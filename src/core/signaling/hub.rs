// src/core/signaling/hub.rs

//! The signaling hub: a REQ/REP request socket, a PUB fan-out socket, and
//! an HTTP history API, all sharing one event store.
//!
//! `zmq::Socket` is not `Send`, so the REP loop runs on its own OS thread
//! rather than as a tokio task, driving the async event store through a
//! captured runtime handle. This mirrors the "parallel threads and
//! channels" mapping called out for the original's thread-based design.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

use super::model::{HeartbeatRequest, PushReply, PushRequest, OWNERLESS};
use super::store::EventStore;

pub struct Hub {
    pub events: EventStore,
    pub liveness: DashMap<String, Instant>,
}

impl Hub {
    pub fn new(events: EventStore) -> Self {
        Self {
            events,
            liveness: DashMap::new(),
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    async fn handle_push(&self, req: PushRequest, pub_socket: &zmq::Socket) -> PushReply {
        self.liveness.insert(req.client_id.clone(), Instant::now());
        let Some(message) = req.message else {
            return PushReply::Error {
                message: "Missing required field: message".to_string(),
            };
        };
        let Some(event_type) = req.event_type else {
            return PushReply::Error {
                message: "Missing required field: type".to_string(),
            };
        };
        let ctime = req.timestamp.unwrap_or_else(Self::now);
        let result = self
            .events
            .append(
                &event_type,
                &message,
                &req.affected,
                &req.tags,
                req.source.as_deref(),
                ctime,
            )
            .await;
        let eid = match result {
            Ok(eid) => eid,
            Err(e) => {
                error!(error = %e, "failed to persist signaling event");
                return PushReply::Failed;
            }
        };

        let envelope = serde_json::json!({
            "eid": eid,
            "type": event_type,
            "payload": message,
            "timestamp": ctime,
            "source": req.source.unwrap_or_else(|| OWNERLESS.to_string()),
            "affected": req.affected,
            "tags": req.tags,
        });
        if let Ok(bytes) = serde_json::to_vec(&envelope) {
            if let Err(e) = pub_socket.send(bytes, 0) {
                warn!(error = %e, "failed to publish event to subscribers");
            }
        }
        PushReply::Success { eid }
    }

    fn handle_heartbeat(&self, req: &HeartbeatRequest) {
        self.liveness.insert(req.client_id.clone(), Instant::now());
    }

    fn sweep_dead(&self, timeout: Duration) {
        self.liveness
            .retain(|_, last| last.elapsed() < timeout);
    }
}

/// Runs the REP loop on a dedicated OS thread. `rt` is used to block on
/// the async event-store work for each request.
pub fn spawn_rep_loop(
    hub: Arc<Hub>,
    ctx: zmq::Context,
    bind_addr: String,
    pub_addr: String,
    rt: Handle,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let rep = match ctx.socket(zmq::REP) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to create REP socket");
                return;
            }
        };
        if let Err(e) = rep.bind(&bind_addr) {
            error!(error = %e, "failed to bind REP socket");
            return;
        }
        let pub_socket = match ctx.socket(zmq::PUB) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to create PUB socket");
                return;
            }
        };
        if let Err(e) = pub_socket.bind(&pub_addr) {
            error!(error = %e, "failed to bind PUB socket");
            return;
        }
        info!(rep = %bind_addr, pub = %pub_addr, "signaling hub sockets bound");

        loop {
            let msg = match rep.recv_bytes(0) {
                Ok(m) => m,
                Err(e) => {
                    error!(error = %e, "REP recv failed");
                    continue;
                }
            };
            let reply = handle_raw_message(&hub, &msg, &pub_socket, &rt);
            if let Err(e) = rep.send(reply, 0) {
                error!(error = %e, "REP send failed");
            }
        }
    })
}

fn handle_raw_message(
    hub: &Arc<Hub>,
    msg: &[u8],
    pub_socket: &zmq::Socket,
    rt: &Handle,
) -> Vec<u8> {
    let parsed: serde_json::Value = match serde_json::from_slice(msg) {
        Ok(v) => v,
        Err(_) => {
            return serde_json::to_vec(&PushReply::Error {
                message: "malformed request".to_string(),
            })
            .unwrap();
        }
    };
    let msg_type = parsed.get("type").and_then(|v| v.as_str()).unwrap_or("");
    if msg_type == "heartbeat" {
        if let Ok(req) = serde_json::from_value::<HeartbeatRequest>(parsed) {
            hub.handle_heartbeat(&req);
        }
        return serde_json::to_vec(&serde_json::json!({ "status": "success" })).unwrap();
    }
    match serde_json::from_value::<PushRequest>(parsed) {
        Ok(req) => {
            let reply = rt.block_on(hub.handle_push(req, pub_socket));
            serde_json::to_vec(&reply).unwrap()
        }
        Err(e) => serde_json::to_vec(&PushReply::Error {
            message: format!("malformed request: {e}"),
        })
        .unwrap(),
    }
}

pub fn spawn_liveness_sweeper(hub: Arc<Hub>, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(timeout / 2);
        loop {
            interval.tick().await;
            hub.sweep_dead(timeout);
        }
    })
}
