use crate::traits::{
    collect_stream, join_key, trim_dir, ByteStream, Disk, StorageError, StorageResult,
};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mediahub_core::DiskDriver;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::sync::Arc;

/// Object store backed disk (S3 and S3-compatible providers)
///
/// Object stores have no real directories: `make_dir` is a no-op and a directory
/// exists only while objects live below it.
#[derive(Clone)]
pub struct ObjectStoreDisk {
    name: String,
    store: Arc<dyn ObjectStore>,
    driver: DiskDriver,
}

impl ObjectStoreDisk {
    /// Create an S3 disk
    ///
    /// # Arguments
    /// * `name` - Disk name used in configuration and on asset records
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(
        name: impl Into<String>,
        bucket: String,
        region: Option<String>,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials and defaults come from the AWS_* environment.
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(region) = region {
            builder = builder.with_region(region);
        }

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            store: Arc::new(store),
            driver: DiskDriver::S3,
        })
    }

    /// Wrap an existing store, e.g. `object_store::memory::InMemory` in tests.
    pub fn from_store(
        name: impl Into<String>,
        driver: DiskDriver,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            driver,
        }
    }

    fn location(key: &str) -> StorageResult<Path> {
        Path::parse(key).map_err(|e| StorageError::InvalidKey(format!("{}: {}", key, e)))
    }

    fn prefix(dir: &str) -> StorageResult<Option<Path>> {
        let dir = trim_dir(dir);
        if dir.is_empty() {
            Ok(None)
        } else {
            Self::location(dir).map(Some)
        }
    }
}

#[async_trait]
impl Disk for ObjectStoreDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> DiskDriver {
        self.driver
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let location = Self::location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    disk = %self.name,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store read failed"
                );
                StorageError::ReadFailed(other.to_string())
            }
        })?;

        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(|e| StorageError::ReadFailed(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn write(&self, key: &str, data: ByteStream) -> StorageResult<u64> {
        let location = Self::location(key)?;
        let start = std::time::Instant::now();

        // Single put of the buffered payload.
        let bytes = collect_stream(data).await?;
        let size = bytes.len() as u64;

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(bytes)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                disk = %self.name,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object store write failed"
            );
            StorageError::WriteFailed(e.to_string())
        })?;

        tracing::info!(
            disk = %self.name,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store write successful"
        );

        Ok(size)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        // S3 deletes are idempotent, so existence has to be checked up front.
        if !self.exists(key).await? {
            return Ok(false);
        }

        let location = Self::location(key)?;
        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(disk = %self.name, key = %key, "Object store delete successful");
                Ok(true)
            }
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let prefix = Self::prefix(dir)?;
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut keys: Vec<String> = listing
            .objects
            .into_iter()
            .map(|meta| meta.location.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_dirs(&self, dir: &str) -> StorageResult<Vec<String>> {
        let prefix = Self::prefix(dir)?;
        let listing = self
            .store
            .list_with_delimiter(prefix.as_ref())
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        let mut keys: Vec<String> = listing
            .common_prefixes
            .into_iter()
            .filter_map(|p| p.filename().map(|name| join_key(dir, name)))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn make_dir(&self, _dir: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn delete_dir(&self, dir: &str) -> StorageResult<bool> {
        let prefix = Self::prefix(dir)?.ok_or_else(|| {
            StorageError::InvalidKey("Refusing to delete the disk root".to_string())
        })?;

        let objects: Vec<_> = self
            .store
            .list(Some(&prefix))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        for location in &objects {
            match self.store.delete(location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => return Err(StorageError::DeleteFailed(e.to_string())),
            }
        }

        tracing::debug!(
            disk = %self.name,
            dir = %dir,
            objects = objects.len(),
            "Object store prefix removed"
        );

        Ok(!objects.is_empty())
    }
}
