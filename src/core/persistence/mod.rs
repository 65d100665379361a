// src/core/persistence/mod.rs

//! The shared relational-store adapter used by every Lunaricorn role.
//!
//! `Store` owns exactly one serialized `PgConnection` rather than a pool:
//! the cluster registrar's monotonic id allocation and the signaling
//! event log both depend on single-writer, strictly-ordered statements.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection, Row};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::core::errors::PersistenceError;

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub db_type: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl DbConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.dbname
        )
    }
}

/// A single, mutex-serialized connection to the cluster's relational store.
///
/// Every statement runs inside its own short-lived transaction: commit on
/// success, rollback on error. A connection observed closed is
/// reconnected exactly once before the statement is retried; a second
/// failure is surfaced to the caller.
pub struct Store {
    options: PgConnectOptions,
    conn: Mutex<PgConnection>,
}

impl Store {
    pub async fn connect(config: &DbConfig) -> Result<Self, PersistenceError> {
        let options = connect_options(config)?;
        let conn = tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect_with(&options))
            .await
            .map_err(|_| {
                PersistenceError::Connection(format!(
                    "connect timed out after {CONNECT_TIMEOUT:?}"
                ))
            })?
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        Ok(Self {
            options,
            conn: Mutex::new(conn),
        })
    }

    /// Runs `schema` against a scratch connection guarded by the store's
    /// mutex. Every caller's `install` closure is expected to use
    /// `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS` so that
    /// repeated calls at process start are idempotent.
    pub async fn install<F>(&self, schema: F) -> Result<(), PersistenceError>
    where
        F: for<'c> FnOnce(
            &'c mut PgConnection,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<(), sqlx::Error>> + Send + 'c>,
        >,
    {
        let mut guard = self.conn.lock().await;
        schema(&mut guard).await.map_err(PersistenceError::from)
    }

    async fn reconnect(&self, guard: &mut PgConnection) -> Result<(), PersistenceError> {
        warn!("database connection lost, reconnecting");
        let fresh = tokio::time::timeout(CONNECT_TIMEOUT, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| {
                PersistenceError::Connection(format!(
                    "reconnect timed out after {CONNECT_TIMEOUT:?}"
                ))
            })?
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;
        *guard = fresh;
        info!("database connection re-established");
        Ok(())
    }

    /// Runs `op` inside a transaction on the single shared connection,
    /// reconnecting and retrying once if the connection was closed.
    pub async fn with_tx<T, F>(&self, op: F) -> Result<T, PersistenceError>
    where
        F: for<'c> Fn(
            &'c mut sqlx::Transaction<'_, sqlx::Postgres>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, sqlx::Error>> + Send + 'c>,
        >,
    {
        let mut guard = self.conn.lock().await;
        match Self::run_once(&mut guard, &op).await {
            Ok(v) => Ok(v),
            Err(e) if is_connection_closed(&e) => {
                self.reconnect(&mut guard).await?;
                Self::run_once(&mut guard, &op)
                    .await
                    .map_err(PersistenceError::from)
            }
            Err(e) => Err(PersistenceError::from(e)),
        }
    }

    async fn run_once<T, F>(conn: &mut PgConnection, op: &F) -> Result<T, sqlx::Error>
    where
        F: for<'c> Fn(
            &'c mut sqlx::Transaction<'_, sqlx::Postgres>,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<T, sqlx::Error>> + Send + 'c>,
        >,
    {
        let mut tx = conn.begin().await?;
        match op(&mut tx).await {
            Ok(v) => {
                tx.commit().await?;
                Ok(v)
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Atomic read-modify-write increment used by the cluster registrar's
    /// `MESSAGE_ID` / `OBJECT_ID` singletons. A single round trip via
    /// `INSERT ... ON CONFLICT ... DO UPDATE` avoids the separate
    /// get-then-update race the original implementation suffered from.
    pub async fn next_cluster_state(&self, key: &str) -> Result<i64, PersistenceError> {
        let key = key.to_string();
        self.with_tx(move |tx| {
            let key = key.clone();
            Box::pin(async move {
                let row = sqlx::query(
                    "INSERT INTO cluster_state (key, i, j) VALUES ($1, 1, '{}'::jsonb) \
                     ON CONFLICT (key) DO UPDATE SET i = cluster_state.i + 1 \
                     RETURNING i",
                )
                .bind(&key)
                .fetch_one(&mut **tx)
                .await?;
                Ok(row.get::<i64, _>("i"))
            })
        })
        .await
    }
}

/// Builds the connection options every role's `Store` connects with:
/// application name for `pg_stat_activity` visibility and a per-statement
/// timeout so a stuck query can't wedge the single shared connection.
/// Autocommit-off is achieved structurally rather than as a session
/// setting: every statement in `with_tx` runs inside an explicit
/// `BEGIN`/`COMMIT`, never as a bare implicit-transaction statement.
fn connect_options(config: &DbConfig) -> Result<PgConnectOptions, PersistenceError> {
    let options = PgConnectOptions::from_str(&config.connection_url())
        .map_err(|e| PersistenceError::Connection(e.to_string()))?
        .application_name("lunaricorn")
        .options([(
            "statement_timeout",
            STATEMENT_TIMEOUT.as_millis().to_string(),
        )]);
    Ok(options)
}

fn is_connection_closed(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolClosed)
}

/// A small helper for reading environment-variable overrides, applied on
/// top of (never in place of) YAML-loaded configuration, matching the
/// five `db_*` keys documented for every Lunaricorn config file.
pub fn apply_env_overrides(cfg: &mut DbConfig) {
    if let Ok(v) = std::env::var("db_type") {
        cfg.db_type = v;
    }
    if let Ok(v) = std::env::var("db_host") {
        cfg.host = v;
    }
    if let Ok(v) = std::env::var("db_port") {
        if let Ok(p) = v.parse() {
            cfg.port = p;
        }
    }
    if let Ok(v) = std::env::var("db_user") {
        cfg.user = v;
    }
    if let Ok(v) = std::env::var("db_password") {
        cfg.password = v;
    }
    if let Ok(v) = std::env::var("db_name") {
        cfg.dbname = v;
    }
}

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const STATEMENT_TIMEOUT: Duration = Duration::from_secs(30);
