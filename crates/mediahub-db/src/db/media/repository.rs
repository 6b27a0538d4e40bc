use async_trait::async_trait;
use mediahub_core::models::{Asset, NewAsset};
use mediahub_core::AppError;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Persistence of asset records.
///
/// Every mutation bumps `updated_at`. Mutations on a missing id fail with
/// `AppError::NotFound`.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Insert a new record with empty `data` and `conversions`.
    async fn create(&self, new_asset: NewAsset) -> Result<Asset, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError>;

    /// Oldest asset with this content hash, if any.
    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError>;

    /// Bump `updated_at` only; it strictly increases on every call.
    async fn touch(&self, id: Uuid) -> Result<Asset, AppError>;

    /// Record a re-encoded original. `optimized_at` is only ever set once.
    async fn mark_optimized(&self, id: Uuid, mime_type: &str, size: i64)
        -> Result<Asset, AppError>;

    /// Add one `name -> file_name` entry without touching sibling entries.
    async fn add_conversion(
        &self,
        id: Uuid,
        conversion_name: &str,
        file_name: &str,
    ) -> Result<Asset, AppError>;

    /// Merge custom fields into `data`; keys not mentioned are kept.
    async fn update_data(&self, id: Uuid, data: Map<String, JsonValue>)
        -> Result<Asset, AppError>;

    async fn move_to_collection(&self, id: Uuid, collection_name: &str)
        -> Result<Asset, AppError>;

    async fn list_by_collection(&self, collection_name: &str) -> Result<Vec<Asset>, AppError>;

    /// Remove the record; `false` when it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

pub(crate) fn asset_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Asset {} not found", id))
}
