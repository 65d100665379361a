// src/core/orb/model.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrbDataSubtype {
    #[serde(rename = "@json")]
    Json,
    #[serde(rename = "@raw")]
    Raw,
}

impl OrbDataSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrbDataSubtype::Json => "@json",
            OrbDataSubtype::Raw => "@raw",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "@raw" => OrbDataSubtype::Raw,
            _ => OrbDataSubtype::Json,
        }
    }
}

/// A data record keyed by a UUIDv7 that embeds its creation time. The
/// chain fields are plain caller-managed handles, not owning references:
/// they may point anywhere, including at each other, and are never
/// resolved or validated by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbData {
    pub u: Option<Uuid>,
    pub subtype: OrbDataSubtype,
    pub src: Option<String>,
    pub chain_left: Option<Uuid>,
    pub chain_right: Option<Uuid>,
    pub parent: Option<Uuid>,
    pub ctime: i64,
    pub flags: Vec<String>,
    pub data: serde_json::Value,
}

impl Default for OrbData {
    fn default() -> Self {
        Self {
            u: None,
            subtype: OrbDataSubtype::Json,
            src: None,
            chain_left: None,
            chain_right: None,
            parent: None,
            ctime: 0,
            flags: Vec::new(),
            data: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbMeta {
    pub id: i64,
    pub u: Option<Uuid>,
    #[serde(default = "default_data_type")]
    pub data_type: String,
    pub ctime: i64,
    pub flags: Vec<String>,
    pub handle: i64,
}

fn default_data_type() -> String {
    "@json".to_string()
}

impl Default for OrbMeta {
    fn default() -> Self {
        Self {
            id: 0,
            u: None,
            data_type: default_data_type(),
            ctime: 0,
            flags: Vec::new(),
            handle: 0,
        }
    }
}
