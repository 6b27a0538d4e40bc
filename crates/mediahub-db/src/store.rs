//! Asset records together with the files they reference

use crate::db::AssetRepository;
use mediahub_core::models::{Asset, NewAsset};
use mediahub_core::{AppError, PathNamer};
use mediahub_storage::{delete_dir_if_empty, DiskManager};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

/// Where a file lives: disk name plus disk-relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageLocation {
    pub disk: String,
    pub path: String,
}

/// Facade over the asset repository, the configured disks and the path namer.
#[derive(Clone)]
pub struct MediaStore {
    repository: Arc<dyn AssetRepository>,
    disks: DiskManager,
    namer: PathNamer,
    thumbnail_conversion: Option<String>,
}

impl MediaStore {
    pub fn new(repository: Arc<dyn AssetRepository>, disks: DiskManager, namer: PathNamer) -> Self {
        Self {
            repository,
            disks,
            namer,
            thumbnail_conversion: None,
        }
    }

    /// Conversion used by [`MediaStore::thumbnail_location`].
    pub fn with_thumbnail_conversion(mut self, name: Option<String>) -> Self {
        self.thumbnail_conversion = name;
        self
    }

    pub fn repository(&self) -> &Arc<dyn AssetRepository> {
        &self.repository
    }

    pub fn disks(&self) -> &DiskManager {
        &self.disks
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    pub async fn create(&self, new_asset: NewAsset) -> Result<Asset, AppError> {
        self.repository.create(new_asset).await
    }

    /// Fetch an asset, failing with `NotFound` when it does not exist.
    pub async fn get(&self, id: Uuid) -> Result<Asset, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Asset>, AppError> {
        self.repository.find_by_id(id).await
    }

    pub async fn find_by_hash(&self, content_hash: &str) -> Result<Option<Asset>, AppError> {
        self.repository.find_by_hash(content_hash).await
    }

    pub async fn list_by_collection(&self, collection_name: &str) -> Result<Vec<Asset>, AppError> {
        self.repository.list_by_collection(collection_name).await
    }

    /// Merge caller-defined fields into the asset's custom data.
    pub async fn update_data(
        &self,
        id: Uuid,
        data: Map<String, JsonValue>,
    ) -> Result<Asset, AppError> {
        self.repository.update_data(id, data).await
    }

    /// Reassign the asset to another collection. Files stay where they are, since
    /// paths only depend on the asset id.
    pub async fn move_to_collection(
        &self,
        id: Uuid,
        collection_name: &str,
    ) -> Result<Asset, AppError> {
        self.repository.move_to_collection(id, collection_name).await
    }

    pub fn original_location(&self, asset: &Asset) -> StorageLocation {
        StorageLocation {
            disk: asset.disk.clone(),
            path: self.namer.original_path(asset),
        }
    }

    /// Location of a recorded conversion, `None` when it has not been generated.
    pub fn conversion_location(
        &self,
        asset: &Asset,
        conversion_name: &str,
    ) -> Option<StorageLocation> {
        asset
            .conversions
            .get(conversion_name)
            .filter(|file_name| !file_name.is_empty())
            .map(|file_name| StorageLocation {
                disk: asset.conversions_disk.clone(),
                path: self.namer.stored_conversion_path(asset, file_name),
            })
    }

    /// The thumbnail conversion when generated, the original otherwise.
    pub fn thumbnail_location(&self, asset: &Asset) -> StorageLocation {
        self.thumbnail_conversion
            .as_deref()
            .and_then(|name| self.conversion_location(asset, name))
            .unwrap_or_else(|| self.original_location(asset))
    }

    /// Delete an asset's files, then its record.
    ///
    /// The original must be gone (deleted now or already absent) before the record is
    /// touched; a failure there leaves everything in place. Conversions and empty
    /// directories are removed best-effort. Returns `false` for an unknown id.
    #[tracing::instrument(skip(self), fields(asset_id = %id))]
    pub async fn delete_with_files(&self, id: Uuid) -> Result<bool, AppError> {
        let Some(asset) = self.repository.find_by_id(id).await? else {
            return Ok(false);
        };

        let disk = self.disks.get(&asset.disk)?;
        let original = self.namer.original_path(&asset);
        let existed = disk.delete(&original).await?;
        if !existed {
            tracing::warn!(path = %original, "Original already missing during delete");
        }

        match self.disks.get(&asset.conversions_disk) {
            Ok(conversions_disk) => {
                for (name, file_name) in &asset.conversions {
                    let path = self.namer.stored_conversion_path(&asset, file_name);
                    if let Err(e) = conversions_disk.delete(&path).await {
                        tracing::warn!(
                            conversion = %name,
                            path = %path,
                            error = %e,
                            "Failed to delete conversion file"
                        );
                    }
                }

                let dir = self.namer.conversions_dir(asset.id);
                if let Err(e) = delete_dir_if_empty(conversions_disk.as_ref(), &dir).await {
                    tracing::warn!(dir = %dir, error = %e, "Failed to remove conversions directory");
                }
            }
            Err(e) => {
                tracing::warn!(
                    disk = %asset.conversions_disk,
                    error = %e,
                    "Conversions disk unavailable, conversion files left behind"
                );
            }
        }

        let dir = self.namer.original_dir(asset.id);
        if let Err(e) = delete_dir_if_empty(disk.as_ref(), &dir).await {
            tracing::warn!(dir = %dir, error = %e, "Failed to remove asset directory");
        }

        let deleted = self.repository.delete(asset.id).await?;
        tracing::info!(deleted, "Asset deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryAssetRepository;
    use bytes::Bytes;
    use mediahub_storage::{Disk, LocalDisk};
    use serde_json::json;

    struct Fixture {
        _dir: tempfile::TempDir,
        disk: Arc<LocalDisk>,
        store: MediaStore,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let disk = Arc::new(LocalDisk::new("public", dir.path()).await.unwrap());
        let disks = DiskManager::new().with_disk(disk.clone());
        let store = MediaStore::new(
            Arc::new(InMemoryAssetRepository::new()),
            disks,
            PathNamer::new("media"),
        )
        .with_thumbnail_conversion(Some("thumbnail".into()));
        Fixture {
            _dir: dir,
            disk,
            store,
        }
    }

    async fn stored_asset(f: &Fixture) -> Asset {
        let asset = f
            .store
            .create(NewAsset {
                collection_name: "avatars".into(),
                disk: "public".into(),
                conversions_disk: "public".into(),
                file_name: "photo.jpg".into(),
                size: 4,
                mime_type: "image/jpeg".into(),
                content_hash: "abc".into(),
            })
            .await
            .unwrap();
        f.disk
            .write_bytes(&f.store.namer().original_path(&asset), Bytes::from_static(b"orig"))
            .await
            .unwrap();
        asset
    }

    #[tokio::test]
    async fn get_missing_asset_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            f.store.get(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_with_files_removes_everything() {
        let f = fixture().await;
        let asset = stored_asset(&f).await;
        let conversion = f.store.namer().conversion_path(&asset, "thumbnail");
        f.disk
            .write_bytes(&conversion, Bytes::from_static(b"thumb"))
            .await
            .unwrap();
        f.store
            .repository()
            .add_conversion(asset.id, "thumbnail", "photo_thumbnail.jpg")
            .await
            .unwrap();

        assert!(f.store.delete_with_files(asset.id).await.unwrap());

        assert!(!f.disk.exists(&conversion).await.unwrap());
        assert!(!f.disk.exists(&f.store.namer().base_path(asset.id)).await.unwrap());
        assert!(f.store.find_by_id(asset.id).await.unwrap().is_none());
        assert!(!f.store.delete_with_files(asset.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_with_files_tolerates_missing_original() {
        let f = fixture().await;
        let asset = stored_asset(&f).await;
        f.disk
            .delete(&f.store.namer().original_path(&asset))
            .await
            .unwrap();

        assert!(f.store.delete_with_files(asset.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_with_unknown_disk_keeps_record() {
        let f = fixture().await;
        let asset = f
            .store
            .create(NewAsset {
                collection_name: "c".into(),
                disk: "gone".into(),
                conversions_disk: "gone".into(),
                file_name: "a.png".into(),
                size: 1,
                mime_type: "image/png".into(),
                content_hash: "x".into(),
            })
            .await
            .unwrap();

        assert!(matches!(
            f.store.delete_with_files(asset.id).await,
            Err(AppError::DiskNotConfigured(_))
        ));
        assert!(f.store.find_by_id(asset.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn thumbnail_falls_back_to_original() {
        let f = fixture().await;
        let asset = stored_asset(&f).await;

        assert_eq!(f.store.thumbnail_location(&asset), f.store.original_location(&asset));

        let asset = f
            .store
            .repository()
            .add_conversion(asset.id, "thumbnail", "photo_thumbnail.jpg")
            .await
            .unwrap();
        let thumb = f.store.thumbnail_location(&asset);
        assert_eq!(
            thumb.path,
            format!("media/{}/conversions/photo_thumbnail.jpg", asset.id)
        );
        assert!(f.store.conversion_location(&asset, "large").is_none());
    }

    #[tokio::test]
    async fn custom_data_and_collection_moves() {
        let f = fixture().await;
        let asset = stored_asset(&f).await;

        let mut data = Map::new();
        data.insert("alt".into(), json!("Portrait"));
        let updated = f.store.update_data(asset.id, data).await.unwrap();
        assert_eq!(updated.data.get("alt"), Some(&json!("Portrait")));

        let moved = f.store.move_to_collection(asset.id, "team").await.unwrap();
        assert_eq!(moved.collection_name, "team");
        assert_eq!(f.store.original_location(&moved), f.store.original_location(&asset));
    }
}
