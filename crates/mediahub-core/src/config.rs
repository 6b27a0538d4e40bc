//! Configuration module
//!
//! [`MediaHubConfig`] is built once from the environment (optionally seeded from a
//! `.env` file) and handed to each component at construction. Nothing reads
//! configuration through globals.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::conversions::{ConversionRule, ConversionsConfig, Fit};
use crate::storage_types::DiskDriver;

const ENV_PREFIX: &str = "MEDIAHUB_";

// Common constants
const DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DISK: &str = "public";
const DEFAULT_LOCAL_ROOT: &str = "storage/media";
const PATH_PREFIX: &str = "media";
const MAX_UPLOADED_FILE_SIZE_IN_KB: u64 = 4000;
const ALLOWED_MIME_TYPES: &str = "image/jpeg,image/png,image/webp,image/gif,image/svg+xml,\
application/pdf,application/msword,\
application/vnd.openxmlformats-officedocument.wordprocessingml.document,\
application/vnd.ms-excel,application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const OPTIMIZABLE_MIME_TYPES: &str = "image/jpeg,image/png,image/webp";
const ORIGINAL_MAX_DIMENSIONS: u32 = 2880;
const OPTIMIZE_QUALITY: &str = "normal";
const JOB_QUEUE: &str = "default";
const JOB_TIMEOUT_SECS: u64 = 180;
const JOB_MAX_WORKERS: usize = 2;
const JOB_MAX_RETRIES: u32 = 3;
const THUMBNAIL_CONVERSION_NAME: &str = "thumbnail";
const THUMBNAIL_SIZE: u32 = 150;

/// A named storage backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskConfig {
    pub name: String,
    pub driver: DiskDriver,
    /// Root directory (local driver)
    pub root: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub endpoint: Option<String>,
}

impl DiskConfig {
    pub fn local(name: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: DiskDriver::Local,
            root: Some(root.into()),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

/// Manipulations applied to original images during optimization
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OriginalImageManipulations {
    pub optimize: bool,
    /// Longest edge after optimization; `None` keeps the original dimensions
    pub max_dimensions: Option<u32>,
}

impl Default for OriginalImageManipulations {
    fn default() -> Self {
        Self {
            optimize: true,
            max_dimensions: Some(ORIGINAL_MAX_DIMENSIONS),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaHubConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub disks: Vec<DiskConfig>,
    pub disk_name: String,
    pub conversions_disk_name: String,
    pub path_prefix: String,
    /// 0 = unlimited; 1 KB = 1000 bytes
    pub max_uploaded_file_size_in_kb: u64,
    pub allowed_mime_types: Vec<String>,
    pub optimizable_mime_types: Vec<String>,
    pub image_conversions: ConversionsConfig,
    pub original_image_manipulations: OriginalImageManipulations,
    /// Quality preset name used when re-encoding images
    pub optimize_quality: String,
    pub job_queue: String,
    pub job_timeout_secs: u64,
    pub job_max_workers: usize,
    pub job_max_retries: u32,
    pub thumbnail_conversion_name: Option<String>,
    pub temp_dir: Option<PathBuf>,
}

impl Default for MediaHubConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            disks: vec![DiskConfig::local(DEFAULT_DISK, DEFAULT_LOCAL_ROOT)],
            disk_name: DEFAULT_DISK.to_string(),
            conversions_disk_name: DEFAULT_DISK.to_string(),
            path_prefix: PATH_PREFIX.to_string(),
            max_uploaded_file_size_in_kb: MAX_UPLOADED_FILE_SIZE_IN_KB,
            allowed_mime_types: split_list(ALLOWED_MIME_TYPES),
            optimizable_mime_types: split_list(OPTIMIZABLE_MIME_TYPES),
            image_conversions: default_conversions(),
            original_image_manipulations: OriginalImageManipulations::default(),
            optimize_quality: OPTIMIZE_QUALITY.to_string(),
            job_queue: JOB_QUEUE.to_string(),
            job_timeout_secs: JOB_TIMEOUT_SECS,
            job_max_workers: JOB_MAX_WORKERS,
            job_max_retries: JOB_MAX_RETRIES,
            thumbnail_conversion_name: Some(THUMBNAIL_CONVERSION_NAME.to_string()),
            temp_dir: None,
        }
    }
}

impl MediaHubConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let disk_names = split_list(&var("DISKS").unwrap_or_else(|| DEFAULT_DISK.to_string()));
        let mut disks = Vec::with_capacity(disk_names.len());
        for name in disk_names {
            disks.push(disk_from_env(&name)?);
        }

        let disk_name = var("DISK_NAME").unwrap_or_else(|| DEFAULT_DISK.to_string());
        let conversions_disk_name =
            var("CONVERSIONS_DISK_NAME").unwrap_or_else(|| disk_name.clone());

        let image_conversions = match (var("IMAGE_CONVERSIONS"), var("IMAGE_CONVERSIONS_FILE")) {
            (Some(json), _) => ConversionsConfig::from_json(&json)
                .map_err(|e| anyhow::anyhow!("MEDIAHUB_IMAGE_CONVERSIONS is invalid: {}", e))?,
            (None, Some(path)) => {
                let json = std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read conversions file {}: {}", path, e)
                })?;
                ConversionsConfig::from_json(&json)
                    .map_err(|e| anyhow::anyhow!("Conversions file {} is invalid: {}", path, e))?
            }
            (None, None) => default_conversions(),
        };

        let max_dimensions = parse_or("ORIGINAL_MAX_DIMENSIONS", ORIGINAL_MAX_DIMENSIONS);

        let config = Self {
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            disks,
            disk_name,
            conversions_disk_name,
            path_prefix: var("PATH_PREFIX").unwrap_or_else(|| PATH_PREFIX.to_string()),
            max_uploaded_file_size_in_kb: parse_or(
                "MAX_UPLOADED_FILE_SIZE_IN_KB",
                MAX_UPLOADED_FILE_SIZE_IN_KB,
            ),
            allowed_mime_types: split_list(
                &var("ALLOWED_MIME_TYPES").unwrap_or_else(|| ALLOWED_MIME_TYPES.to_string()),
            ),
            optimizable_mime_types: split_list(
                &var("OPTIMIZABLE_MIME_TYPES")
                    .unwrap_or_else(|| OPTIMIZABLE_MIME_TYPES.to_string()),
            ),
            image_conversions,
            original_image_manipulations: OriginalImageManipulations {
                optimize: parse_bool_or("ORIGINAL_OPTIMIZE", true),
                max_dimensions: (max_dimensions > 0).then_some(max_dimensions),
            },
            optimize_quality: var("OPTIMIZE_QUALITY")
                .unwrap_or_else(|| OPTIMIZE_QUALITY.to_string())
                .to_lowercase(),
            job_queue: var("JOB_QUEUE").unwrap_or_else(|| JOB_QUEUE.to_string()),
            job_timeout_secs: parse_or("JOB_TIMEOUT_SECS", JOB_TIMEOUT_SECS),
            job_max_workers: parse_or("JOB_MAX_WORKERS", JOB_MAX_WORKERS),
            job_max_retries: parse_or("JOB_MAX_RETRIES", JOB_MAX_RETRIES),
            thumbnail_conversion_name: Some(
                var("THUMBNAIL_CONVERSION_NAME")
                    .unwrap_or_else(|| THUMBNAIL_CONVERSION_NAME.to_string()),
            )
            .filter(|s| !s.is_empty()),
            temp_dir: var("TEMP_DIR").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for name in [&self.disk_name, &self.conversions_disk_name] {
            if self.disk(name).is_none() {
                return Err(anyhow::anyhow!(
                    "Disk [{}] is used as a default but is not listed in MEDIAHUB_DISKS",
                    name
                ));
            }
        }

        for disk in &self.disks {
            match disk.driver {
                DiskDriver::Local if disk.root.is_none() => {
                    return Err(anyhow::anyhow!(
                        "Local disk [{}] requires MEDIAHUB_DISK_{}_ROOT",
                        disk.name,
                        disk.name.to_uppercase()
                    ));
                }
                DiskDriver::S3 if disk.bucket.is_none() => {
                    return Err(anyhow::anyhow!(
                        "S3 disk [{}] requires MEDIAHUB_DISK_{}_BUCKET",
                        disk.name,
                        disk.name.to_uppercase()
                    ));
                }
                _ => {}
            }
        }

        if self.job_timeout_secs == 0 {
            return Err(anyhow::anyhow!("MEDIAHUB_JOB_TIMEOUT_SECS must be positive"));
        }

        if self.job_max_workers == 0 {
            return Err(anyhow::anyhow!("MEDIAHUB_JOB_MAX_WORKERS must be positive"));
        }

        Ok(())
    }

    pub fn disk(&self, name: &str) -> Option<&DiskConfig> {
        self.disks.iter().find(|d| d.name == name)
    }

    /// Size ceiling in bytes, `None` when unlimited.
    pub fn max_file_size_bytes(&self) -> Option<u64> {
        match self.max_uploaded_file_size_in_kb {
            0 => None,
            kb => Some(kb.saturating_mul(1000)),
        }
    }

    pub fn is_optimizable(&self, mime_type: &str) -> bool {
        self.optimizable_mime_types.iter().any(|m| m == mime_type)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

fn default_conversions() -> ConversionsConfig {
    ConversionsConfig::wildcard(
        THUMBNAIL_CONVERSION_NAME,
        ConversionRule {
            fit: Some(Fit::Crop.to_string()),
            width: Some(THUMBNAIL_SIZE),
            height: Some(THUMBNAIL_SIZE),
            format: None,
        },
    )
}

fn disk_from_env(name: &str) -> Result<DiskConfig, anyhow::Error> {
    let key = |suffix: &str| format!("DISK_{}_{}", name.to_uppercase(), suffix);

    let driver = match var(&key("DRIVER")) {
        Some(driver) => driver.parse()?,
        None => DiskDriver::Local,
    };

    let root = var(&key("ROOT")).or_else(|| {
        (driver == DiskDriver::Local && name == DEFAULT_DISK).then(|| DEFAULT_LOCAL_ROOT.into())
    });

    Ok(DiskConfig {
        name: name.to_string(),
        driver,
        root,
        bucket: var(&key("BUCKET")),
        region: var(&key("REGION")).or_else(|| env::var("AWS_REGION").ok()),
        endpoint: var(&key("ENDPOINT")),
    })
}

fn var(key: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, key))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool_or(key: &str, default: bool) -> bool {
    match var(key).map(|v| v.to_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => true,
        Some(v) if v == "false" || v == "0" || v == "no" => false,
        _ => default,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MediaHubConfig::default();
        config.validate().unwrap();
        assert_eq!(config.job_timeout(), Duration::from_secs(180));
        assert!(config.is_optimizable("image/jpeg"));
        assert!(!config.is_optimizable("image/gif"));
        assert_eq!(config.image_conversions.for_collection("any").len(), 1);
    }

    #[test]
    fn max_file_size_uses_decimal_kilobytes() {
        let mut config = MediaHubConfig {
            max_uploaded_file_size_in_kb: 50,
            ..Default::default()
        };
        assert_eq!(config.max_file_size_bytes(), Some(50_000));

        config.max_uploaded_file_size_in_kb = 0;
        assert_eq!(config.max_file_size_bytes(), None);
    }

    #[test]
    fn validate_rejects_unknown_default_disk() {
        let config = MediaHubConfig {
            conversions_disk_name: "cdn".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cdn"));
    }

    #[test]
    fn validate_rejects_s3_disk_without_bucket() {
        let mut config = MediaHubConfig::default();
        config.disks.push(DiskConfig {
            name: "s3".to_string(),
            driver: DiskDriver::S3,
            root: None,
            bucket: None,
            region: Some("eu-west-1".to_string()),
            endpoint: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn split_list_trims_and_lowercases() {
        assert_eq!(
            split_list(" Image/JPEG , ,image/png"),
            vec!["image/jpeg".to_string(), "image/png".to_string()]
        );
    }
}
