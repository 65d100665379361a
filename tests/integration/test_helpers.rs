//! Shared scaffolding for black-box tests that need a real Postgres
//! instance. Connection parameters come from the same `db_*` environment
//! variables the services themselves honor (`db_host`, `db_port`,
//! `db_user`, `db_password`, `db_name`), defaulting to a local instance.
//! A test that cannot reach Postgres prints a notice and returns early
//! rather than failing the whole suite in environments without a
//! database available.

use std::sync::Arc;

use lunaricorn::core::persistence::{DbConfig, Store};

pub fn db_config() -> DbConfig {
    DbConfig {
        db_type: "postgresql".to_string(),
        host: std::env::var("db_host").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("db_port")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5432),
        user: std::env::var("db_user").unwrap_or_else(|_| "postgres".to_string()),
        password: std::env::var("db_password").unwrap_or_else(|_| "postgres".to_string()),
        dbname: std::env::var("db_name").unwrap_or_else(|_| "lunaricorn_test".to_string()),
    }
}

pub async fn try_connect() -> Option<Arc<Store>> {
    match Store::connect(&db_config()).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            eprintln!("skipping: no postgres reachable ({e})");
            None
        }
    }
}

/// A short, random suffix so concurrent test runs against a shared
/// schema don't collide on node names / instance keys.
pub fn unique(label: &str) -> String {
    format!("{label}-{}", uuid::Uuid::new_v4())
}
