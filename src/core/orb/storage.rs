// src/core/orb/storage.rs

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use sqlx::Row;
use tracing::warn;
use uuid::Uuid;

use crate::core::errors::OrbError;
use crate::core::persistence::Store;
use crate::core::signaling::client::Client as SignalingClient;

use super::model::{OrbData, OrbDataSubtype, OrbMeta};

pub struct Storage {
    store: Arc<Store>,
    signaling: Arc<SignalingClient>,
}

impl Storage {
    pub fn new(store: Arc<Store>, signaling: Arc<SignalingClient>) -> Self {
        Self { store, signaling }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    pub async fn install_schema(&self) -> Result<(), OrbError> {
        self.store
            .install(|conn| {
                Box::pin(async move {
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS orb_data (
                            u UUID PRIMARY KEY,
                            subtype TEXT NOT NULL,
                            src TEXT,
                            chain_left UUID,
                            chain_right UUID,
                            parent UUID,
                            ctime BIGINT NOT NULL,
                            flags JSONB NOT NULL DEFAULT '[]'::jsonb,
                            data JSONB NOT NULL
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS orb_meta (
                            id BIGSERIAL PRIMARY KEY,
                            u UUID,
                            data_type TEXT NOT NULL DEFAULT '@json',
                            ctime BIGINT NOT NULL,
                            flags JSONB NOT NULL DEFAULT '[]'::jsonb,
                            handle BIGINT NOT NULL DEFAULT 0
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE INDEX IF NOT EXISTS orb_meta_data_type_idx ON orb_meta (data_type)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query("CREATE INDEX IF NOT EXISTS orb_meta_u_idx ON orb_meta (u)")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .await
            .map_err(OrbError::from)
    }

    /// Inserts or updates a data record. `u` absent or nil means a new
    /// record (a fresh UUIDv7 is assigned). Emits exactly one
    /// `FileOp_new` / `FileOp_update` signaling event on success; no
    /// event is emitted if the database write itself fails.
    pub async fn push_data(&self, mut record: OrbData) -> Result<OrbData, OrbError> {
        let is_new = record.u.is_none() || record.u == Some(Uuid::nil());
        if is_new {
            record.u = Some(Uuid::now_v7());
            record.ctime = Self::now();
        }
        let record_for_tx = record.clone();
        self.store
            .with_tx(move |tx| {
                let record = record_for_tx.clone();
                Box::pin(async move {
                    sqlx::query(
                        "INSERT INTO orb_data (u, subtype, src, chain_left, chain_right, parent, ctime, flags, data)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                         ON CONFLICT (u) DO UPDATE SET
                            subtype = EXCLUDED.subtype, src = EXCLUDED.src,
                            chain_left = EXCLUDED.chain_left, chain_right = EXCLUDED.chain_right,
                            parent = EXCLUDED.parent, flags = EXCLUDED.flags, data = EXCLUDED.data",
                    )
                    .bind(record.u)
                    .bind(record.subtype.as_str())
                    .bind(&record.src)
                    .bind(record.chain_left)
                    .bind(record.chain_right)
                    .bind(record.parent)
                    .bind(record.ctime)
                    .bind(json!(record.flags))
                    .bind(&record.data)
                    .execute(&mut **tx)
                    .await?;
                    Ok(())
                })
            })
            .await
            .map_err(OrbError::from)?;

        let event_type = if is_new { "FileOp_new" } else { "FileOp_update" };
        self.emit(event_type, json!({ "uuid": record.u }));
        Ok(record)
    }

    pub async fn push_meta(&self, mut record: OrbMeta) -> Result<OrbMeta, OrbError> {
        let is_new = record.id <= 0;
        if record.ctime == 0 {
            record.ctime = Self::now();
        }
        let record_for_tx = record.clone();
        let id = self
            .store
            .with_tx(move |tx| {
                let record = record_for_tx.clone();
                let is_new = is_new;
                Box::pin(async move {
                    if is_new {
                        let row = sqlx::query(
                            "INSERT INTO orb_meta (u, data_type, ctime, flags, handle)
                             VALUES ($1, $2, $3, $4, $5) RETURNING id",
                        )
                        .bind(record.u)
                        .bind(&record.data_type)
                        .bind(record.ctime)
                        .bind(json!(record.flags))
                        .bind(record.handle)
                        .fetch_one(&mut **tx)
                        .await?;
                        Ok(row.get::<i64, _>("id"))
                    } else {
                        sqlx::query(
                            "UPDATE orb_meta SET u = $2, data_type = $3, flags = $4, handle = $5
                             WHERE id = $1",
                        )
                        .bind(record.id)
                        .bind(record.u)
                        .bind(&record.data_type)
                        .bind(json!(record.flags))
                        .bind(record.handle)
                        .execute(&mut **tx)
                        .await?;
                        Ok(record.id)
                    }
                })
            })
            .await
            .map_err(OrbError::from)?;
        record.id = id;

        let event_type = if is_new { "FileOp_new" } else { "FileOp_update" };
        self.emit(event_type, json!({ "id": id, "uuid": record.u }));
        Ok(record)
    }

    pub async fn fetch_data(&self, u: Uuid) -> Result<Option<OrbData>, OrbError> {
        let row = self
            .store
            .with_tx(move |tx| {
                Box::pin(async move {
                    sqlx::query(
                        "SELECT u, subtype, src, chain_left, chain_right, parent, ctime, flags, data
                         FROM orb_data WHERE u = $1",
                    )
                    .bind(u)
                    .fetch_optional(&mut **tx)
                    .await
                })
            })
            .await
            .map_err(OrbError::from)?;
        Ok(row.map(|r| OrbData {
            u: r.get("u"),
            subtype: OrbDataSubtype::parse(r.get::<String, _>("subtype").as_str()),
            src: r.get("src"),
            chain_left: r.get("chain_left"),
            chain_right: r.get("chain_right"),
            parent: r.get("parent"),
            ctime: r.get("ctime"),
            flags: r
                .get::<serde_json::Value, _>("flags")
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            data: r.get("data"),
        }))
    }

    pub async fn fetch_meta(&self, id: i64) -> Result<Option<OrbMeta>, OrbError> {
        let row = self
            .store
            .with_tx(move |tx| {
                Box::pin(async move {
                    sqlx::query("SELECT id, u, data_type, ctime, flags, handle FROM orb_meta WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut **tx)
                        .await
                })
            })
            .await
            .map_err(OrbError::from)?;
        Ok(row.map(|r| OrbMeta {
            id: r.get("id"),
            u: r.get("u"),
            data_type: r.get("data_type"),
            ctime: r.get("ctime"),
            flags: r
                .get::<serde_json::Value, _>("flags")
                .as_array()
                .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            handle: r.get("handle"),
        }))
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Err(e) = self
            .signaling
            .push_event(event_type, payload, Some("orb"), Some(vec!["orb".to_string()]))
        {
            warn!(error = %e, "failed to publish orb signaling event");
        }
    }
}
