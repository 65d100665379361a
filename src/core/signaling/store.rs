// src/core/signaling/store.rs

//! Append-only event log backing the signaling bus.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::Row;

use crate::core::errors::{PersistenceError, SignalingError};
use crate::core::persistence::Store;

use super::model::{BrowseRequest, SignalingEvent, OWNERLESS};

/// Deny-list for string filter values passed into `browse`. Parameters are
/// always bound through `sqlx`; this is a defense-in-depth check applied
/// before a query is even built.
static DENY_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[;'"\\]|--|/\*|\*/"#).unwrap());

fn validate_filters(req: &BrowseRequest) -> Result<(), SignalingError> {
    let all = req
        .event_types
        .iter()
        .flatten()
        .chain(req.sources.iter().flatten())
        .chain(req.affected.iter().flatten())
        .chain(req.tags.iter().flatten());
    for value in all {
        if DENY_LIST.is_match(value) {
            return Err(SignalingError::InvalidRequest(format!(
                "filter value rejected: {value}"
            )));
        }
    }
    Ok(())
}

pub struct EventStore {
    store: Arc<Store>,
}

impl EventStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn install_schema(&self) -> Result<(), PersistenceError> {
        self.store
            .install(|conn| {
                Box::pin(async move {
                    sqlx::query(
                        "CREATE TABLE IF NOT EXISTS signaling_events (
                            eid BIGSERIAL PRIMARY KEY,
                            type TEXT NOT NULL,
                            payload JSONB NOT NULL,
                            affected JSONB,
                            tags JSONB,
                            owner TEXT NOT NULL,
                            ctime BIGINT NOT NULL
                        )",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE INDEX IF NOT EXISTS signaling_events_ctime_idx ON signaling_events (ctime)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE INDEX IF NOT EXISTS signaling_events_owner_idx ON signaling_events (owner)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE INDEX IF NOT EXISTS signaling_events_type_idx ON signaling_events (type)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    sqlx::query(
                        "CREATE INDEX IF NOT EXISTS signaling_events_tags_gin_idx ON signaling_events USING gin (tags)",
                    )
                    .execute(&mut *conn)
                    .await?;
                    Ok(())
                })
            })
            .await
    }

    /// Appends one event and returns its database-assigned `eid`.
    pub async fn append(
        &self,
        event_type: &str,
        payload: &serde_json::Value,
        affected: &Option<Vec<String>>,
        tags: &Option<Vec<String>>,
        owner: Option<&str>,
        ctime: i64,
    ) -> Result<i64, PersistenceError> {
        let event_type = event_type.to_string();
        let payload = payload.clone();
        let affected = affected.clone();
        let tags = tags.clone();
        let owner = owner.unwrap_or(OWNERLESS).to_string();
        self.store
            .with_tx(move |tx| {
                let event_type = event_type.clone();
                let payload = payload.clone();
                let affected = affected.clone();
                let tags = tags.clone();
                let owner = owner.clone();
                Box::pin(async move {
                    let row = sqlx::query(
                        "INSERT INTO signaling_events (type, payload, affected, tags, owner, ctime)
                         VALUES ($1, $2, $3, $4, $5, $6) RETURNING eid",
                    )
                    .bind(&event_type)
                    .bind(&payload)
                    .bind(affected.map(|a| serde_json::json!(a)))
                    .bind(tags.map(|t| serde_json::json!(t)))
                    .bind(&owner)
                    .bind(ctime)
                    .fetch_one(&mut **tx)
                    .await?;
                    Ok(row.get::<i64, _>("eid"))
                })
            })
            .await
    }

    pub async fn browse(&self, req: &BrowseRequest) -> Result<Vec<SignalingEvent>, SignalingError> {
        validate_filters(req)?;
        let mut sql = String::from(
            "SELECT eid, type, payload, affected, tags, owner, ctime FROM signaling_events WHERE ctime >= $1",
        );
        let mut idx = 2;
        if req.event_types.is_some() {
            sql.push_str(&format!(" AND type = ANY(${idx})"));
            idx += 1;
        }
        if req.sources.is_some() {
            sql.push_str(&format!(" AND owner = ANY(${idx})"));
            idx += 1;
        }
        if req.tags.is_some() {
            sql.push_str(&format!(" AND tags ?| ${idx}"));
            idx += 1;
        }
        if req.affected.is_some() {
            sql.push_str(&format!(" AND affected ?| ${idx}"));
            idx += 1;
        }
        sql.push_str(" ORDER BY ctime DESC");
        let has_limit = matches!(req.limit, Some(n) if n > 0);
        if has_limit {
            sql.push_str(&format!(" LIMIT ${idx}"));
        }

        let req = req.clone();
        let rows = self
            .store
            .with_tx(move |tx| {
                let sql = sql.clone();
                let req = req.clone();
                Box::pin(async move {
                    let mut query = sqlx::query(&sql).bind(req.timestamp);
                    if let Some(types) = &req.event_types {
                        query = query.bind(types.clone());
                    }
                    if let Some(sources) = &req.sources {
                        query = query.bind(sources.clone());
                    }
                    if let Some(tags) = &req.tags {
                        query = query.bind(tags.clone());
                    }
                    if let Some(affected) = &req.affected {
                        query = query.bind(affected.clone());
                    }
                    if matches!(req.limit, Some(n) if n > 0) {
                        query = query.bind(req.limit.unwrap());
                    }
                    query.fetch_all(&mut **tx).await
                })
            })
            .await
            .map_err(SignalingError::from)?;

        Ok(rows
            .into_iter()
            .map(|r| SignalingEvent {
                eid: r.get("eid"),
                event_type: r.get("type"),
                payload: r.get("payload"),
                affected: r
                    .get::<Option<serde_json::Value>, _>("affected")
                    .and_then(|v| serde_json::from_value(v).ok()),
                tags: r
                    .get::<Option<serde_json::Value>, _>("tags")
                    .and_then(|v| serde_json::from_value(v).ok()),
                source: r.get("owner"),
                timestamp: r.get("ctime"),
            })
            .collect())
    }

    pub async fn list_distinct(&self, column: &str) -> Result<Vec<String>, PersistenceError> {
        let sql = match column {
            "tags" => "SELECT DISTINCT jsonb_array_elements_text(tags) AS v FROM signaling_events WHERE tags IS NOT NULL ORDER BY v",
            "types" => "SELECT DISTINCT type AS v FROM signaling_events ORDER BY v",
            "affected" => "SELECT DISTINCT jsonb_array_elements_text(affected) AS v FROM signaling_events WHERE affected IS NOT NULL ORDER BY v",
            "owners" => "SELECT DISTINCT owner AS v FROM signaling_events ORDER BY v",
            other => return Err(PersistenceError::Config(format!("unknown list column {other}"))),
        }
        .to_string();
        let rows = self
            .store
            .with_tx(move |tx| {
                let sql = sql.clone();
                Box::pin(async move { sqlx::query(&sql).fetch_all(&mut **tx).await })
            })
            .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("v")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req_with_tags(tags: Vec<&str>) -> BrowseRequest {
        BrowseRequest {
            timestamp: 0,
            tags: Some(tags.into_iter().map(String::from).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_ordinary_filter_values() {
        assert!(validate_filters(&req_with_tags(vec!["orb", "alpha-1"])).is_ok());
    }

    #[test]
    fn rejects_quotes_and_statement_terminators() {
        assert!(validate_filters(&req_with_tags(vec!["x'; DROP TABLE signaling_events;--"])).is_err());
        assert!(validate_filters(&req_with_tags(vec!["\"quoted\""])).is_err());
        assert!(validate_filters(&req_with_tags(vec!["back\\slash"])).is_err());
    }

    #[test]
    fn rejects_sql_comment_markers() {
        assert!(validate_filters(&req_with_tags(vec!["a/*comment*/b"])).is_err());
        assert!(validate_filters(&req_with_tags(vec!["a -- comment"])).is_err());
    }
}
