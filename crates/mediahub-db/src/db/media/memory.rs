use super::repository::{asset_not_found, AssetRepository};
use async_trait::async_trait;
use chrono::Utc;
use mediahub_core::models::{next_updated_at, Asset, NewAsset};
use mediahub_core::AppError;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Process-local asset repository
///
/// Used by tests and by the CLI when no database is configured. Each operation holds
/// the map lock for its whole read-modify-write, so mutations never interleave.
#[derive(Clone, Default)]
pub struct InMemoryAssetRepository {
    assets: Arc<Mutex<HashMap<Uuid, Asset>>>,
}

impl InMemoryAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|assets| assets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Asset>>, AppError> {
        self.assets
            .lock()
            .map_err(|_| AppError::Internal("Asset repository lock poisoned".to_string()))
    }

    fn mutate<F>(&self, id: Uuid, f: F) -> Result<Asset, AppError>
    where
        F: FnOnce(&mut Asset),
    {
        let mut assets = self.lock()?;
        let asset = assets.get_mut(&id).ok_or_else(|| asset_not_found(id))?;
        f(asset);
        asset.updated_at = next_updated_at(asset.updated_at, Utc::now());
        Ok(asset.clone())
    }
}

#[async_trait]
impl AssetRepository for InMemoryAssetRepository {
    async fn create(&self, new_asset: NewAsset) -> Result<Asset, AppError> {
        let asset = new_asset.into_asset(Utc::now());
        self.lock()?.insert(asset.id, asset.clone());
        Ok(asset)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError> {
        Ok(self
            .lock()?
            .values()
            .filter(|a| a.content_hash == content_hash)
            .min_by_key(|a| (a.created_at, a.id))
            .cloned())
    }

    async fn touch(&self, id: Uuid) -> Result<Asset, AppError> {
        self.mutate(id, |_| {})
    }

    async fn mark_optimized(
        &self,
        id: Uuid,
        mime_type: &str,
        size: i64,
    ) -> Result<Asset, AppError> {
        self.mutate(id, |asset| {
            asset.mime_type = mime_type.to_string();
            asset.size = size;
            asset.optimized_at.get_or_insert_with(Utc::now);
        })
    }

    async fn add_conversion(
        &self,
        id: Uuid,
        conversion_name: &str,
        file_name: &str,
    ) -> Result<Asset, AppError> {
        self.mutate(id, |asset| {
            asset
                .conversions
                .insert(conversion_name.to_string(), file_name.to_string());
        })
    }

    async fn update_data(
        &self,
        id: Uuid,
        data: Map<String, JsonValue>,
    ) -> Result<Asset, AppError> {
        self.mutate(id, |asset| asset.data.extend(data))
    }

    async fn move_to_collection(
        &self,
        id: Uuid,
        collection_name: &str,
    ) -> Result<Asset, AppError> {
        self.mutate(id, |asset| {
            asset.collection_name = collection_name.to_string();
        })
    }

    async fn list_by_collection(&self, collection_name: &str) -> Result<Vec<Asset>, AppError> {
        let mut assets: Vec<Asset> = self
            .lock()?
            .values()
            .filter(|a| a.collection_name == collection_name)
            .cloned()
            .collect();
        assets.sort_by_key(|a| (a.created_at, a.id));
        Ok(assets)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_asset(hash: &str) -> NewAsset {
        NewAsset {
            collection_name: "avatars".into(),
            disk: "public".into(),
            conversions_disk: "public".into(),
            file_name: "photo.jpg".into(),
            size: 1024,
            mime_type: "image/jpeg".into(),
            content_hash: hash.into(),
        }
    }

    #[tokio::test]
    async fn create_starts_empty_and_stored() {
        let repo = InMemoryAssetRepository::new();
        let asset = repo.create(new_asset("h1")).await.unwrap();

        assert!(asset.data.is_empty());
        assert!(asset.conversions.is_empty());
        assert!(asset.optimized_at.is_none());
        assert_eq!(repo.find_by_id(asset.id).await.unwrap(), Some(asset.clone()));
        assert_eq!(repo.find_by_hash("h1").await.unwrap().map(|a| a.id), Some(asset.id));
        assert!(repo.find_by_hash("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_strictly_increases_updated_at() {
        let repo = InMemoryAssetRepository::new();
        let asset = repo.create(new_asset("h")).await.unwrap();

        let first = repo.touch(asset.id).await.unwrap();
        let second = repo.touch(asset.id).await.unwrap();
        assert!(first.updated_at > asset.updated_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn optimized_at_is_set_once() {
        let repo = InMemoryAssetRepository::new();
        let asset = repo.create(new_asset("h")).await.unwrap();

        let first = repo.mark_optimized(asset.id, "image/webp", 10).await.unwrap();
        let second = repo.mark_optimized(asset.id, "image/webp", 9).await.unwrap();
        assert_eq!(first.optimized_at, second.optimized_at);
        assert_eq!(second.size, 9);
        assert_eq!(second.mime_type, "image/webp");
    }

    #[tokio::test]
    async fn conversions_and_data_merge() {
        let repo = InMemoryAssetRepository::new();
        let asset = repo.create(new_asset("h")).await.unwrap();

        repo.add_conversion(asset.id, "thumb", "photo_thumb.jpg").await.unwrap();
        let asset2 = repo.add_conversion(asset.id, "large", "photo_large.jpg").await.unwrap();
        assert_eq!(asset2.conversions.len(), 2);

        let mut data = Map::new();
        data.insert("alt".into(), json!("A cat"));
        repo.update_data(asset.id, data).await.unwrap();
        let mut more = Map::new();
        more.insert("credit".into(), json!({"by": "me"}));
        let updated = repo.update_data(asset.id, more).await.unwrap();
        assert_eq!(updated.data.get("alt"), Some(&json!("A cat")));
        assert_eq!(updated.data.get("credit"), Some(&json!({"by": "me"})));
    }

    #[tokio::test]
    async fn mutations_on_missing_asset_are_not_found() {
        let repo = InMemoryAssetRepository::new();
        let err = repo.touch(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn list_and_move_between_collections() {
        let repo = InMemoryAssetRepository::new();
        let a = repo.create(new_asset("a")).await.unwrap();
        repo.create(new_asset("b")).await.unwrap();

        repo.move_to_collection(a.id, "banners").await.unwrap();
        assert_eq!(repo.list_by_collection("avatars").await.unwrap().len(), 1);
        let banners = repo.list_by_collection("banners").await.unwrap();
        assert_eq!(banners[0].id, a.id);
    }
}
