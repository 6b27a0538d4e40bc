#[cfg(feature = "storage-local")]
use crate::LocalDisk;
#[cfg(feature = "storage-s3")]
use crate::ObjectStoreDisk;
use crate::{Disk, StorageError, StorageResult};
use mediahub_core::{DiskConfig, DiskDriver};
use std::sync::Arc;

/// Create a disk based on its configuration
pub async fn create_disk(config: &DiskConfig) -> StorageResult<Arc<dyn Disk>> {
    match config.driver {
        #[cfg(feature = "storage-s3")]
        DiskDriver::S3 => {
            let bucket = config.bucket.clone().ok_or_else(|| {
                StorageError::ConfigError(format!("Disk [{}] has no bucket configured", config.name))
            })?;

            let disk = ObjectStoreDisk::s3(
                config.name.clone(),
                bucket,
                config.region.clone(),
                config.endpoint.clone(),
            )?;
            Ok(Arc::new(disk))
        }

        #[cfg(not(feature = "storage-s3"))]
        DiskDriver::S3 => Err(StorageError::ConfigError(
            "S3 disks not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        DiskDriver::Local => {
            let root = config.root.clone().ok_or_else(|| {
                StorageError::ConfigError(format!(
                    "Disk [{}] has no root directory configured",
                    config.name
                ))
            })?;

            let disk = LocalDisk::new(config.name.clone(), root).await?;
            Ok(Arc::new(disk))
        }

        #[cfg(not(feature = "storage-local"))]
        DiskDriver::Local => Err(StorageError::ConfigError(
            "Local disks not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_local_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskConfig::local("public", dir.path().to_string_lossy());
        let disk = create_disk(&config).await.unwrap();
        assert_eq!(disk.name(), "public");
        assert_eq!(disk.driver(), DiskDriver::Local);
    }

    #[tokio::test]
    async fn s3_disk_requires_bucket() {
        let config = DiskConfig {
            name: "s3".into(),
            driver: DiskDriver::S3,
            root: None,
            bucket: None,
            region: None,
            endpoint: None,
        };
        assert!(matches!(
            create_disk(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
