use mediahub_core::{MediaHubConfig, ValidationError};

/// Size ceiling and mime allow-list applied before an asset record is created.
///
/// Size is checked first. A file exactly at the ceiling passes. Mime types must match
/// an allowed entry exactly; there is no wildcard matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidator {
    max_size_bytes: Option<u64>,
    allowed_mime_types: Vec<String>,
}

impl FileValidator {
    /// `None` for `max_size_bytes` means unlimited.
    pub fn new(max_size_bytes: Option<u64>, allowed_mime_types: Vec<String>) -> Self {
        Self {
            max_size_bytes,
            allowed_mime_types,
        }
    }

    pub fn from_config(config: &MediaHubConfig) -> Self {
        Self::new(
            config.max_file_size_bytes(),
            config.allowed_mime_types.clone(),
        )
    }

    pub fn max_size_bytes(&self) -> Option<u64> {
        self.max_size_bytes
    }

    pub fn validate(&self, size: u64, mime_type: &str) -> Result<(), ValidationError> {
        self.validate_named("", size, mime_type)
    }

    /// Same as [`FileValidator::validate`], carrying the file name into the error.
    pub fn validate_named(
        &self,
        file_name: &str,
        size: u64,
        mime_type: &str,
    ) -> Result<(), ValidationError> {
        if let Some(max) = self.max_size_bytes {
            if size > max {
                return Err(ValidationError::FileTooLarge {
                    file_name: file_name.to_string(),
                    size,
                    max,
                });
            }
        }

        if !self.allowed_mime_types.iter().any(|m| m == mime_type) {
            return Err(ValidationError::MimeTypeNotAllowed {
                file_name: file_name.to_string(),
                mime_type: mime_type.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(max: Option<u64>) -> FileValidator {
        FileValidator::new(max, vec!["image/jpeg".into(), "image/png".into()])
    }

    #[test]
    fn size_boundary_is_inclusive() {
        let v = validator(Some(50_000));
        assert!(v.validate(50_000, "image/jpeg").is_ok());
        assert_eq!(
            v.validate_named("a.jpg", 50_001, "image/jpeg"),
            Err(ValidationError::FileTooLarge {
                file_name: "a.jpg".into(),
                size: 50_001,
                max: 50_000
            })
        );
    }

    #[test]
    fn unlimited_when_no_ceiling() {
        let v = validator(None);
        assert!(v.validate(u64::MAX, "image/png").is_ok());
    }

    #[test]
    fn mime_must_match_exactly() {
        let v = validator(None);
        for mime in ["image/*", "IMAGE/JPEG", "image/gif", "image/jpeg; charset=binary"] {
            assert!(matches!(
                v.validate(1, mime),
                Err(ValidationError::MimeTypeNotAllowed { .. })
            ));
        }
    }

    #[test]
    fn size_is_checked_before_mime() {
        let v = validator(Some(10));
        assert!(matches!(
            v.validate(11, "text/plain"),
            Err(ValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn from_config_uses_decimal_kilobytes() {
        let config = MediaHubConfig {
            max_uploaded_file_size_in_kb: 50,
            ..Default::default()
        };
        assert_eq!(FileValidator::from_config(&config).max_size_bytes(), Some(50_000));

        let config = MediaHubConfig {
            max_uploaded_file_size_in_kb: 0,
            ..Default::default()
        };
        assert_eq!(FileValidator::from_config(&config).max_size_bytes(), None);
    }
}
