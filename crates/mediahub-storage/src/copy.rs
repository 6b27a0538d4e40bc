//! Moving files between the local filesystem and disks

use crate::traits::{Disk, StorageError, StorageResult};
use futures::StreamExt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

/// Stream a local file into `disk` at `dest`, returning the bytes written.
///
/// With `delete_source` the local file is removed after a successful write. When the
/// source already is the destination (a local disk rooted over it) nothing is written
/// and nothing is deleted.
pub async fn copy_into(
    disk: &dyn Disk,
    source: &Path,
    dest: &str,
    delete_source: bool,
) -> StorageResult<u64> {
    if is_same_file(disk, source, dest).await {
        return Ok(fs::metadata(source).await?.len());
    }

    let file = fs::File::open(source).await.map_err(|e| {
        StorageError::ReadFailed(format!("Failed to open {}: {}", source.display(), e))
    })?;

    let stream = ReaderStream::new(file).map(|chunk| chunk.map_err(StorageError::from));
    let written = disk.write(dest, Box::pin(stream)).await?;

    if delete_source {
        if let Err(e) = fs::remove_file(source).await {
            tracing::warn!(
                path = %source.display(),
                error = %e,
                "Failed to delete copied source file"
            );
        }
    }

    Ok(written)
}

/// Stream `path` from `disk` into a local file, returning the bytes written.
pub async fn copy_to_local(disk: &dyn Disk, path: &str, target: &Path) -> StorageResult<u64> {
    let mut stream = disk.read(path).await?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(target).await.map_err(|e| {
        StorageError::WriteFailed(format!("Failed to create {}: {}", target.display(), e))
    })?;

    let mut size: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(size)
}

/// Remove `dir` when it holds neither files nor subdirectories.
pub async fn delete_dir_if_empty(disk: &dyn Disk, dir: &str) -> StorageResult<bool> {
    if !disk.list_files(dir).await?.is_empty() || !disk.list_dirs(dir).await?.is_empty() {
        return Ok(false);
    }
    disk.delete_dir(dir).await
}

async fn is_same_file(disk: &dyn Disk, source: &Path, dest: &str) -> bool {
    let Some(dest_path) = disk.local_path(dest) else {
        return false;
    };
    match (
        fs::canonicalize(source).await,
        fs::canonicalize(&dest_path).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
