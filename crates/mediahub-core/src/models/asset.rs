use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Derivation state of an asset.
///
/// Ingestion creates assets in `Stored`; the derivation engine moves them to
/// `Optimized` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetState {
    Stored,
    Optimized,
}

/// A managed media record.
///
/// `file_name`, `content_hash` and the disks are fixed at creation. `size` and
/// `mime_type` always describe the currently stored original and change when the
/// original is optimized. `conversions` maps conversion name to derived file name
/// and only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub collection_name: String,
    pub disk: String,
    pub conversions_disk: String,
    pub file_name: String,
    pub size: i64,
    pub mime_type: String,
    pub content_hash: String,
    pub data: Map<String, JsonValue>,
    pub conversions: BTreeMap<String, String>,
    pub optimized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn state(&self) -> AssetState {
        if self.optimized_at.is_some() {
            AssetState::Optimized
        } else {
            AssetState::Stored
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn has_conversion(&self, name: &str) -> bool {
        self.conversions
            .get(name)
            .map(|f| !f.is_empty())
            .unwrap_or(false)
    }
}

/// Fields required to create an asset record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub collection_name: String,
    pub disk: String,
    pub conversions_disk: String,
    pub file_name: String,
    pub size: i64,
    pub mime_type: String,
    pub content_hash: String,
}

impl NewAsset {
    /// Materialize the record with a fresh id and timestamps, empty data and conversions.
    pub fn into_asset(self, now: DateTime<Utc>) -> Asset {
        Asset {
            id: Uuid::new_v4(),
            collection_name: self.collection_name,
            disk: self.disk,
            conversions_disk: self.conversions_disk,
            file_name: self.file_name,
            size: self.size,
            mime_type: self.mime_type,
            content_hash: self.content_hash,
            data: Map::new(),
            conversions: BTreeMap::new(),
            optimized_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Next `updated_at` value: now, but always strictly after `previous`.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let min = previous + chrono::Duration::microseconds(1);
    if now > min {
        now
    } else {
        min
    }
}
