//! Turning every supported input into a local file plus a display name

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::StreamExt;
use mediahub_core::naming::{base_name, split_name_and_extension};
use mediahub_core::AppError;
use mediahub_storage::{copy_to_local, DiskManager, StorageError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use uuid::Uuid;

const DOWNLOAD_NAME: &str = "download";
const UPLOAD_NAME: &str = "upload";

/// A file received over a transport (multipart upload, RPC stream...).
pub struct UploadedFile {
    pub file_name: String,
    pub reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
    /// Error reported by the transport while receiving the file
    pub transport_error: Option<String>,
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("transport_error", &self.transport_error)
            .finish_non_exhaustive()
    }
}

/// Where ingested bytes come from
#[derive(Debug)]
pub enum MediaSource {
    /// An existing file on the local filesystem
    LocalPath(PathBuf),
    /// An object on a configured disk, downloaded first
    Disk { disk: String, key: String },
    /// An HTTP(S) resource, downloaded first
    Url(String),
    Upload(UploadedFile),
    /// Base64 payload, optionally prefixed with a data-URL header. Must decode to an image.
    Base64 {
        data: String,
        file_name: Option<String>,
    },
}

impl MediaSource {
    /// The caller's own file, for local sources.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaSource::LocalPath(path) => Some(path),
            _ => None,
        }
    }
}

/// A local, readable copy of the source.
///
/// Temporary copies are deleted when this value is dropped.
#[derive(Debug)]
pub struct NormalizedSource {
    path: PathBuf,
    display_name: String,
    temp: Option<TempPath>,
}

impl NormalizedSource {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    fn temporary(temp: TempPath, display_name: String) -> Self {
        Self {
            path: temp.to_path_buf(),
            display_name,
            temp: Some(temp),
        }
    }
}

/// Reserve an empty temporary file that is removed when the guard drops.
pub fn new_temp_path(temp_dir: Option<&Path>, prefix: &str) -> Result<TempPath, AppError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let file = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(|e| AppError::Internal(format!("Failed to create temporary file: {}", e)))?;
    Ok(file.into_temp_path())
}

#[derive(Clone)]
pub struct SourceNormalizer {
    disks: DiskManager,
    http: reqwest::Client,
    temp_dir: Option<PathBuf>,
}

impl SourceNormalizer {
    pub fn new(disks: DiskManager, temp_dir: Option<PathBuf>) -> Self {
        Self {
            disks,
            http: reqwest::Client::new(),
            temp_dir,
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub async fn normalize(&self, source: MediaSource) -> Result<NormalizedSource, AppError> {
        match source {
            MediaSource::LocalPath(path) => self.from_local(path).await,
            MediaSource::Disk { disk, key } => self.from_disk(&disk, &key).await,
            MediaSource::Url(url) => self.from_url(&url).await,
            MediaSource::Upload(upload) => self.from_upload(upload).await,
            MediaSource::Base64 { data, file_name } => {
                self.from_base64(&data, file_name.as_deref()).await
            }
        }
    }

    pub fn temp_path(&self, prefix: &str) -> Result<TempPath, AppError> {
        new_temp_path(self.temp_dir.as_deref(), prefix)
    }

    async fn from_local(&self, path: PathBuf) -> Result<NormalizedSource, AppError> {
        let metadata = fs::metadata(&path).await.map_err(|e| {
            AppError::Source(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AppError::Source(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| UPLOAD_NAME.to_string());

        Ok(NormalizedSource {
            path,
            display_name,
            temp: None,
        })
    }

    async fn from_disk(&self, disk_name: &str, key: &str) -> Result<NormalizedSource, AppError> {
        let disk = self
            .disks
            .get(disk_name)
            .map_err(|e| AppError::Source(e.to_string()))?;

        let temp = self.temp_path("mediahub-remote-")?;
        copy_to_local(disk.as_ref(), key, &temp).await.map_err(|e| match e {
            StorageError::NotFound(_) => AppError::Source(format!(
                "File [{}] does not exist on disk [{}]",
                key, disk_name
            )),
            other => AppError::Source(format!(
                "Failed to download [{}] from disk [{}]: {}",
                key, disk_name, other
            )),
        })?;

        Ok(NormalizedSource::temporary(temp, base_name(key).to_string()))
    }

    async fn from_url(&self, url: &str) -> Result<NormalizedSource, AppError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Source(format!("Failed to download {}: {}", url, e)))?;

        let display_name = response
            .url()
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(DOWNLOAD_NAME)
            .to_string();

        let temp = self.temp_path("mediahub-download-")?;
        let mut file = fs::File::create(&temp).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| AppError::Source(format!("Download of {} failed: {}", url, e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(url = %url, file_name = %display_name, "Remote file downloaded");

        Ok(NormalizedSource::temporary(temp, display_name))
    }

    async fn from_upload(&self, upload: UploadedFile) -> Result<NormalizedSource, AppError> {
        if let Some(error) = upload.transport_error {
            return Err(AppError::Source(format!(
                "Upload of '{}' failed: {}",
                upload.file_name, error
            )));
        }

        let temp = self.temp_path("mediahub-upload-")?;
        let mut file = fs::File::create(&temp).await?;
        let mut reader = upload.reader;
        tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| AppError::Source(format!("Failed to receive upload: {}", e)))?;
        file.flush().await?;

        let display_name = match base_name(&upload.file_name) {
            "" => UPLOAD_NAME.to_string(),
            name => name.to_string(),
        };

        Ok(NormalizedSource::temporary(temp, display_name))
    }

    async fn from_base64(
        &self,
        data: &str,
        file_name: Option<&str>,
    ) -> Result<NormalizedSource, AppError> {
        // Drop a `data:image/png;base64,` style header.
        let payload = match data.find(',') {
            Some(idx) => &data[idx + 1..],
            None => data,
        };
        let payload: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = STANDARD
            .decode(payload.as_bytes())
            .map_err(|e| AppError::Source(format!("Invalid base64 payload: {}", e)))?;

        let kind = infer::get(&bytes)
            .filter(|kind| kind.mime_type().starts_with("image/"))
            .ok_or_else(|| {
                AppError::Source("Base64 payload is not a recognizable image".to_string())
            })?;

        let stem = file_name
            .map(|name| split_name_and_extension(name).0)
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| format!("file_{}", Uuid::new_v4().simple()));
        let display_name = format!("{}.{}", stem, kind.extension());

        let temp = self.temp_path("mediahub-base64-")?;
        fs::write(&temp, &bytes).await?;

        Ok(NormalizedSource::temporary(temp, display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mediahub_storage::{Disk, LocalDisk};
    use std::sync::Arc;

    // 1x1 transparent PNG
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    async fn normalizer(root: &Path) -> SourceNormalizer {
        let disk = LocalDisk::new("remote", root.join("remote")).await.unwrap();
        disk.write_bytes("inbox/Report Final.PDF", Bytes::from_static(b"%PDF-1.4"))
            .await
            .unwrap();
        SourceNormalizer::new(
            DiskManager::new().with_disk(Arc::new(disk)),
            Some(root.to_path_buf()),
        )
    }

    #[tokio::test]
    async fn local_path_is_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;
        let path = dir.path().join("photo.jpg");
        std::fs::write(&path, b"x").unwrap();

        let normalized = n.normalize(MediaSource::LocalPath(path.clone())).await.unwrap();
        assert_eq!(normalized.path(), path.as_path());
        assert_eq!(normalized.display_name(), "photo.jpg");
        assert!(!normalized.is_temporary());
        drop(normalized);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn missing_local_path_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;
        let err = n
            .normalize(MediaSource::LocalPath(dir.path().join("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Source(_)));

        let err = n
            .normalize(MediaSource::LocalPath(dir.path().to_path_buf()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Source(_)));
    }

    #[tokio::test]
    async fn disk_reference_is_downloaded_to_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        let normalized = n
            .normalize(MediaSource::Disk {
                disk: "remote".into(),
                key: "inbox/Report Final.PDF".into(),
            })
            .await
            .unwrap();
        assert_eq!(normalized.display_name(), "Report Final.PDF");
        assert!(normalized.is_temporary());
        assert_eq!(std::fs::read(normalized.path()).unwrap(), b"%PDF-1.4");

        let temp = normalized.path().to_path_buf();
        drop(normalized);
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn missing_disk_object_or_unknown_disk_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        for (disk, key) in [("remote", "inbox/missing.jpg"), ("nowhere", "a.jpg")] {
            let err = n
                .normalize(MediaSource::Disk {
                    disk: disk.into(),
                    key: key.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Source(_)), "{disk}/{key}");
        }
    }

    #[tokio::test]
    async fn upload_with_transport_error_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        let err = n
            .normalize(MediaSource::Upload(UploadedFile {
                file_name: "a.jpg".into(),
                reader: Box::pin(&b"partial"[..]),
                transport_error: Some("connection reset".into()),
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Source(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn upload_is_spooled() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        let normalized = n
            .normalize(MediaSource::Upload(UploadedFile {
                file_name: "C:\\Users\\me\\cat.png".into(),
                reader: Box::pin(&b"meow"[..]),
                transport_error: None,
            }))
            .await
            .unwrap();
        assert_eq!(normalized.display_name(), "cat.png");
        assert_eq!(std::fs::read(normalized.path()).unwrap(), b"meow");
    }

    #[tokio::test]
    async fn base64_image_with_data_url_header() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        let normalized = n
            .normalize(MediaSource::Base64 {
                data: format!("data:image/png;base64,{}", PNG_B64),
                file_name: Some("pixel.jpg".into()),
            })
            .await
            .unwrap();
        assert_eq!(normalized.display_name(), "pixel.png");

        let anonymous = n
            .normalize(MediaSource::Base64 {
                data: PNG_B64.into(),
                file_name: None,
            })
            .await
            .unwrap();
        assert!(anonymous.display_name().starts_with("file_"));
        assert!(anonymous.display_name().ends_with(".png"));
    }

    #[tokio::test]
    async fn base64_non_image_or_garbage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let n = normalizer(dir.path()).await;

        let pdf = STANDARD.encode(b"%PDF-1.4 not an image");
        for data in [pdf, "***not base64***".to_string()] {
            let err = n
                .normalize(MediaSource::Base64 {
                    data,
                    file_name: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Source(_)));
        }
    }
}
