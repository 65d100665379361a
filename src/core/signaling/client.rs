// src/core/signaling/client.rs

//! Thread-safe signaling client: REQ socket for push/heartbeat, SUB
//! socket for fan-out, with automatic reconnect on transient failure.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parking_lot::Mutex as PLMutex;
use serde_json::json;
use tracing::{debug, warn};

use crate::core::errors::SignalingError;

use super::model::{BrowseRequest, SignalingEvent};

pub type Sink = Arc<dyn Fn(SignalingEvent) + Send + Sync>;

struct Sockets {
    req: zmq::Socket,
}

pub struct Client {
    ctx: zmq::Context,
    rep_url: String,
    sub_url: String,
    req_timeout: Duration,
    sockets: PLMutex<Sockets>,
    watched_types: Mutex<HashSet<String>>,
    sink: Mutex<Option<Sink>>,
    stop: Arc<AtomicBool>,
    http: reqwest::blocking::Client,
    api_url: String,
}

const WILDCARD: &str = "*";

impl Client {
    pub fn connect(
        rep_url: &str,
        sub_url: &str,
        api_url: &str,
        req_timeout: Duration,
    ) -> Result<Arc<Self>, SignalingError> {
        let ctx = zmq::Context::new();
        let req = open_req_socket(&ctx, rep_url, req_timeout)?;
        let client = Arc::new(Self {
            ctx,
            rep_url: rep_url.to_string(),
            sub_url: sub_url.to_string(),
            req_timeout,
            sockets: PLMutex::new(Sockets { req }),
            watched_types: Mutex::new(HashSet::new()),
            sink: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            http: reqwest::blocking::Client::new(),
            api_url: api_url.to_string(),
        });
        Ok(client)
    }

    pub fn set_sink(&self, sink: Sink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    pub fn watch_type(&self, event_type: impl Into<String>) {
        self.watched_types.lock().unwrap().insert(event_type.into());
    }

    pub fn watch_all(&self) {
        self.watched_types.lock().unwrap().insert(WILDCARD.to_string());
    }

    fn wanted(&self, event_type: &str) -> bool {
        let watched = self.watched_types.lock().unwrap();
        watched.contains(WILDCARD) || watched.contains(event_type)
    }

    /// Spawns the background receiver thread that polls the SUB socket
    /// and the heartbeat thread that pings the hub periodically. Both
    /// run until `stop()` is called.
    pub fn start(self: &Arc<Self>, heartbeat_interval: Duration) -> Result<(), SignalingError> {
        let sub = open_sub_socket(&self.ctx, &self.sub_url)?;
        let receiver = self.clone();
        std::thread::spawn(move || receiver.receive_loop(sub));

        let heartbeat = self.clone();
        std::thread::spawn(move || heartbeat.heartbeat_loop(heartbeat_interval));
        Ok(())
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn receive_loop(self: Arc<Self>, sub: zmq::Socket) {
        while !self.stop.load(Ordering::SeqCst) {
            let mut items = [sub.as_poll_item(zmq::POLLIN)];
            match zmq::poll(&mut items, 200) {
                Ok(n) if n > 0 && items[0].is_readable() => match sub.recv_bytes(0) {
                    Ok(bytes) => self.dispatch(&bytes),
                    Err(e) => warn!(error = %e, "SUB recv failed"),
                },
                Ok(_) => {}
                Err(e) => warn!(error = %e, "SUB poll failed"),
            }
        }
    }

    fn dispatch(&self, bytes: &[u8]) {
        let event: SignalingEvent = match serde_json::from_slice(bytes) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "malformed event on SUB socket");
                return;
            }
        };
        if !self.wanted(&event.event_type) {
            return;
        }
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink(event);
        }
    }

    fn heartbeat_loop(self: Arc<Self>, interval: Duration) {
        while !self.stop.load(Ordering::SeqCst) {
            std::thread::sleep(interval);
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.heartbeat() {
                debug!(error = %e, "heartbeat failed");
            }
        }
    }

    fn heartbeat(&self) -> Result<(), SignalingError> {
        let body = json!({ "type": "heartbeat", "client_id": client_id() });
        self.request(&body).map(|_| ())
    }

    pub fn push_event(
        &self,
        event_type: &str,
        payload: serde_json::Value,
        source: Option<&str>,
        tags: Option<Vec<String>>,
    ) -> Result<i64, SignalingError> {
        let body = json!({
            "type": "push",
            "client_id": client_id(),
            "event_type": event_type,
            "message": payload,
            "source": source,
            "tags": tags,
        });
        let reply = self.request(&body)?;
        match reply.get("status").and_then(|v| v.as_str()) {
            Some("success") => reply
                .get("eid")
                .and_then(|v| v.as_i64())
                .ok_or_else(|| SignalingError::Internal("missing eid in reply".to_string())),
            Some("error") => Err(SignalingError::InvalidRequest(
                reply
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("push rejected")
                    .to_string(),
            )),
            _ => Err(SignalingError::Internal("push failed".to_string())),
        }
    }

    /// Sends `body` on the REQ socket, reconnecting and retrying exactly
    /// once on timeout or socket error.
    fn request(&self, body: &serde_json::Value) -> Result<serde_json::Value, SignalingError> {
        match self.try_request(body) {
            Ok(v) => Ok(v),
            Err(_) => {
                self.reconnect_req()?;
                self.try_request(body)
            }
        }
    }

    fn try_request(&self, body: &serde_json::Value) -> Result<serde_json::Value, SignalingError> {
        let sockets = self.sockets.lock();
        let payload = serde_json::to_vec(body)?;
        sockets.req.send(payload, 0)?;
        let mut items = [sockets.req.as_poll_item(zmq::POLLIN)];
        let n = zmq::poll(&mut items, self.req_timeout.as_millis() as i64)?;
        if n == 0 || !items[0].is_readable() {
            return Err(SignalingError::Timeout);
        }
        let bytes = sockets.req.recv_bytes(0)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn reconnect_req(&self) -> Result<(), SignalingError> {
        let fresh = open_req_socket(&self.ctx, &self.rep_url, self.req_timeout)?;
        let mut sockets = self.sockets.lock();
        sockets.req = fresh;
        Ok(())
    }

    pub fn browse_events(&self, req: &BrowseRequest) -> Result<Vec<SignalingEvent>, SignalingError> {
        let resp = self
            .http
            .post(format!("{}/v1/browse", self.api_url))
            .json(req)
            .send()?;
        Ok(resp.json()?)
    }

    pub fn list(&self, kind: &str) -> Result<Vec<String>, SignalingError> {
        let resp = self
            .http
            .get(format!("{}/v1/list/{}", self.api_url, kind))
            .send()?;
        Ok(resp.json()?)
    }
}

fn open_req_socket(
    ctx: &zmq::Context,
    url: &str,
    timeout: Duration,
) -> Result<zmq::Socket, SignalingError> {
    let socket = ctx.socket(zmq::REQ)?;
    socket.set_linger(0)?;
    socket.set_rcvtimeo(timeout.as_millis() as i32)?;
    socket.connect(url)?;
    Ok(socket)
}

fn open_sub_socket(ctx: &zmq::Context, url: &str) -> Result<zmq::Socket, SignalingError> {
    let socket = ctx.socket(zmq::SUB)?;
    socket.connect(url)?;
    socket.set_subscribe(b"")?;
    Ok(socket)
}

fn client_id() -> String {
    static ID: once_cell::sync::Lazy<String> = once_cell::sync::Lazy::new(|| {
        format!("{}-{}", std::process::id(), uuid::Uuid::now_v7())
    });
    ID.clone()
}
