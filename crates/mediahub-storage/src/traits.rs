//! Disk abstraction trait
//!
//! This module defines the `Disk` trait that all storage backends must implement.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use mediahub_core::{AppError, DiskDriver};
use std::path::PathBuf;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Disk [{0}] is not configured")]
    DiskNotConfigured(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked file contents moving to or from a disk
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::FileDoesNotExist(key),
            StorageError::DiskNotConfigured(name) => AppError::DiskNotConfigured(name),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Wrap an in-memory buffer as a single-chunk stream.
pub fn stream_from_bytes(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a stream into one buffer.
pub async fn collect_stream(mut stream: ByteStream) -> StorageResult<Bytes> {
    let mut buffer = Vec::new();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(Bytes::from(buffer))
}

/// A named place where files live, addressed by `/`-separated relative paths.
///
/// Directories are a view over keys: backends without real directories (object stores)
/// report a directory as existing while it has at least one object below it.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Configured disk name
    fn name(&self) -> &str;

    fn driver(&self) -> DiskDriver;

    /// Local filesystem location of `path`, for backends that have one.
    fn local_path(&self, _path: &str) -> Option<PathBuf> {
        None
    }

    /// Open `path` as a stream of chunks. Missing files yield `StorageError::NotFound`.
    async fn read(&self, path: &str) -> StorageResult<ByteStream>;

    async fn read_bytes(&self, path: &str) -> StorageResult<Bytes> {
        collect_stream(self.read(path).await?).await
    }

    /// Write (or overwrite) `path` from a stream and return the number of bytes written.
    async fn write(&self, path: &str, data: ByteStream) -> StorageResult<u64>;

    async fn write_bytes(&self, path: &str, data: Bytes) -> StorageResult<()> {
        self.write(path, stream_from_bytes(data)).await.map(|_| ())
    }

    /// Remove a file; `false` when it was already absent.
    async fn delete(&self, path: &str) -> StorageResult<bool>;

    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Files directly inside `dir`, as disk-relative paths.
    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>>;

    /// Directories directly inside `dir`, as disk-relative paths.
    async fn list_dirs(&self, dir: &str) -> StorageResult<Vec<String>>;

    async fn make_dir(&self, dir: &str) -> StorageResult<()>;

    /// Remove a directory and everything below it; `false` when it did not exist.
    async fn delete_dir(&self, dir: &str) -> StorageResult<bool>;
}

/// Normalize a directory argument to `a/b` (no leading or trailing slash).
pub(crate) fn trim_dir(dir: &str) -> &str {
    dir.trim_matches('/')
}

/// Join a directory and an entry name into a disk-relative path.
pub(crate) fn join_key(dir: &str, name: &str) -> String {
    let dir = trim_dir(dir);
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
