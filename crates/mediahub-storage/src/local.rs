use crate::traits::{join_key, trim_dir, ByteStream, Disk, StorageError, StorageResult};
use async_trait::async_trait;
use futures::StreamExt;
use mediahub_core::DiskDriver;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Local filesystem disk
#[derive(Clone, Debug)]
pub struct LocalDisk {
    name: String,
    root: PathBuf,
}

impl LocalDisk {
    /// Create a new LocalDisk, creating the root directory if needed
    ///
    /// # Arguments
    /// * `name` - Disk name used in configuration and on asset records
    /// * `root` - Root directory for file storage (e.g., "/var/lib/mediahub/public")
    pub async fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(LocalDisk {
            name: name.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a storage key to a filesystem path with traversal protection.
    ///
    /// Keys are relative; absolute keys and `..` components are rejected so a key can
    /// never resolve outside the root directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "Storage key must be relative: {}",
                key
            )));
        }

        for component in Path::new(key).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "Storage key contains invalid components: {}",
                        key
                    )))
                }
            }
        }

        Ok(self.root.join(trim_dir(key)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn list_entries(&self, dir: &str, want_dirs: bool) -> StorageResult<Vec<String>> {
        let path = self.key_to_path(dir)?;
        let mut entries = match fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to list directory {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() != want_dirs {
                continue;
            }
            keys.push(join_key(dir, &entry.file_name().to_string_lossy()));
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl Disk for LocalDisk {
    fn name(&self) -> &str {
        &self.name
    }

    fn driver(&self) -> DiskDriver {
        DiskDriver::Local
    }

    fn local_path(&self, path: &str) -> Option<PathBuf> {
        self.key_to_path(path).ok()
    }

    async fn read(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key)?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if file.metadata().await?.is_dir() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(StorageError::from));
        Ok(Box::pin(stream))
    }

    async fn write(&self, key: &str, mut data: ByteStream) -> StorageResult<u64> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let mut size: u64 = 0;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
            })?;
            size += chunk.len() as u64;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            disk = %self.name,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local disk write successful"
        );

        Ok(size)
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(disk = %self.name, key = %key, "Local disk delete successful");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        self.list_entries(dir, false).await
    }

    async fn list_dirs(&self, dir: &str) -> StorageResult<Vec<String>> {
        self.list_entries(dir, true).await
    }

    async fn make_dir(&self, dir: &str) -> StorageResult<()> {
        let path = self.key_to_path(dir)?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    async fn delete_dir(&self, dir: &str) -> StorageResult<bool> {
        let path = self.key_to_path(dir)?;
        if path == self.root {
            return Err(StorageError::InvalidKey(
                "Refusing to delete the disk root".to_string(),
            ));
        }

        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(disk = %self.name, dir = %dir, "Local directory removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete directory {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
