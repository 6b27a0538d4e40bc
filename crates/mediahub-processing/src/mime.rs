//! Mime type and extension detection

use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const OCTET_STREAM: &str = "application/octet-stream";
// Enough for every signature `infer` knows about.
const SNIFF_LEN: usize = 8192;

/// Result of type detection for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedType {
    pub mime_type: String,
    /// Extension implied by the content signature, if it was recognized
    pub extension: Option<String>,
}

/// Sniff the content signature, fall back to the file name, then to octet-stream.
pub fn detect_from_bytes(head: &[u8], file_name: &str) -> DetectedType {
    if let Some(kind) = infer::get(head) {
        return DetectedType {
            mime_type: kind.mime_type().to_string(),
            extension: Some(kind.extension().to_string()),
        };
    }

    let mime_type = mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    DetectedType {
        mime_type,
        extension: None,
    }
}

/// Detect the type of a local file from its first bytes and its display name.
pub async fn detect_file(path: &Path, file_name: &str) -> io::Result<DetectedType> {
    let mut file = File::open(path).await?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(detect_from_bytes(&head, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn signature_wins_over_name() {
        let detected = detect_from_bytes(PNG_MAGIC, "photo.jpg");
        assert_eq!(detected.mime_type, "image/png");
        assert_eq!(detected.extension.as_deref(), Some("png"));
    }

    #[test]
    fn falls_back_to_name_then_octet_stream() {
        let svg = detect_from_bytes(b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>", "logo.svg");
        assert_eq!(svg.mime_type, "image/svg+xml");
        assert_eq!(svg.extension, None);

        let unknown = detect_from_bytes(b"\x00\x01\x02", "blob");
        assert_eq!(unknown.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn detects_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noext");
        std::fs::write(&path, PNG_MAGIC).unwrap();

        let detected = detect_file(&path, "noext").await.unwrap();
        assert_eq!(detected.mime_type, "image/png");
    }
}
