//! Background optimization of originals and generation of conversions
//!
//! A derivation run works on a local copy of the stored original:
//!
//! 1. the original is optimized once (re-encoded, optionally shrunk to the configured
//!    maximum dimensions) and written back over the stored file;
//! 2. every configured conversion missing on the asset is rendered from a fresh copy of
//!    that (optimized) local file, stored on the conversions disk and recorded.
//!
//! Runs for the same asset are serialized inside one engine. Completed steps are
//! recorded as they finish, so a run abandoned half-way resumes where it stopped.

use crate::compression::QualityPreset;
use crate::image::ImageManipulator;
use crate::source::new_temp_path;
use bytes::Bytes;
use mediahub_core::models::Asset;
use mediahub_core::{AppError, ConversionsConfig, MediaHubConfig, OriginalImageManipulations};
use mediahub_db::MediaStore;
use mediahub_storage::{copy_to_local, Disk};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tempfile::TempPath;
use tokio::fs;
use uuid::Uuid;

/// Outcome of one derivation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DerivationReport {
    pub asset_id: Uuid,
    /// The asset no longer exists; nothing was done
    pub missing: bool,
    /// The original was optimized during this run
    pub optimized: bool,
    pub conversions_written: Vec<String>,
}

impl DerivationReport {
    fn new(asset_id: Uuid) -> Self {
        Self {
            asset_id,
            ..Default::default()
        }
    }

    /// Whether the run changed anything on disk or in the record.
    pub fn did_work(&self) -> bool {
        self.optimized || !self.conversions_written.is_empty()
    }
}

/// Derivation-related configuration, extracted from [`MediaHubConfig`]
#[derive(Debug, Clone)]
pub struct DerivationSettings {
    pub conversions: ConversionsConfig,
    pub optimizable_mime_types: Vec<String>,
    pub original: OriginalImageManipulations,
    pub quality: QualityPreset,
    pub temp_dir: Option<PathBuf>,
}

impl DerivationSettings {
    pub fn from_config(config: &MediaHubConfig) -> Result<Self, AppError> {
        Ok(Self {
            conversions: config.image_conversions.clone(),
            optimizable_mime_types: config.optimizable_mime_types.clone(),
            original: config.original_image_manipulations.clone(),
            quality: QualityPreset::parse(&config.optimize_quality)?,
            temp_dir: config.temp_dir.clone(),
        })
    }

    fn is_optimizable(&self, asset: &Asset) -> bool {
        asset.is_image() && self.optimizable_mime_types.iter().any(|m| *m == asset.mime_type)
    }

    /// Maximum dimensions applied to the original, when the policy allows resizing.
    fn original_max_dimensions(&self, collection_name: &str) -> Option<u32> {
        if !self.original.optimize || self.conversions.original_disabled(collection_name) {
            return None;
        }
        self.original.max_dimensions
    }
}

type LockMap = HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>;

/// Optimizes originals and renders conversions for stored assets.
pub struct DerivationEngine {
    store: MediaStore,
    settings: DerivationSettings,
    manipulator: ImageManipulator,
    locks: Arc<Mutex<LockMap>>,
}

impl DerivationEngine {
    pub fn new(store: MediaStore, settings: DerivationSettings) -> Self {
        let manipulator = ImageManipulator::new(settings.quality);
        Self {
            store,
            settings,
            manipulator,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(store: MediaStore, config: &MediaHubConfig) -> Result<Self, AppError> {
        Ok(Self::new(store, DerivationSettings::from_config(config)?))
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn settings(&self) -> &DerivationSettings {
        &self.settings
    }

    /// Optimize the original and render missing conversions for one asset.
    ///
    /// A vanished asset is not an error: the report comes back with `missing` set.
    #[tracing::instrument(skip_all, fields(asset_id = %asset_id))]
    pub async fn derive(&self, asset_id: Uuid) -> Result<DerivationReport, AppError> {
        let lease = AssetLease::acquire(&self.locks, asset_id);
        let _guard = lease.mutex.lock().await;

        let start = Instant::now();
        let report = self.derive_locked(asset_id).await?;

        tracing::info!(
            optimized = report.optimized,
            conversions = report.conversions_written.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Derivation finished"
        );

        Ok(report)
    }

    async fn derive_locked(&self, asset_id: Uuid) -> Result<DerivationReport, AppError> {
        let mut report = DerivationReport::new(asset_id);

        let Some(mut asset) = self.store.find_by_id(asset_id).await? else {
            tracing::warn!("Asset vanished before derivation");
            report.missing = true;
            return Ok(report);
        };

        if !self.settings.is_optimizable(&asset) {
            tracing::debug!(mime_type = %asset.mime_type, "Asset is not an optimizable image");
            return Ok(report);
        }

        let conversions: Vec<_> = self
            .settings
            .conversions
            .for_collection(&asset.collection_name)
            .into_iter()
            .filter(|c| !asset.has_conversion(&c.name))
            .collect();

        if asset.optimized_at.is_some() && conversions.is_empty() {
            return Ok(report);
        }

        let disk = self.store.disks().get(&asset.disk)?;
        let original_path = self.store.namer().original_path(&asset);
        let working = self.temp_path("mediahub-original-")?;
        copy_to_local(disk.as_ref(), &original_path, &working)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::FileDoesNotExist(_) => AppError::FileDoesNotExist(format!(
                    "Original [{}] missing on disk [{}]",
                    original_path, asset.disk
                )),
                other => other,
            })?;

        if asset.optimized_at.is_none() {
            asset = self
                .optimize_original(&asset, disk.as_ref(), &original_path, &working)
                .await?;
            report.optimized = true;
        }

        if conversions.is_empty() {
            return Ok(report);
        }

        let conversions_disk = self.store.disks().get(&asset.conversions_disk)?;
        for conversion in conversions {
            // Each rendition starts from its own copy of the local original.
            let copy = self.temp_path("mediahub-conversion-")?;
            fs::copy(&working, &copy).await?;
            let source = Bytes::from(fs::read(&copy).await?);

            let manipulator = self.manipulator;
            let mime_type = asset.mime_type.clone();
            let conv = conversion.clone();
            let rendition = tokio::task::spawn_blocking(move || {
                manipulator.render_conversion(&source, &mime_type, &conv)
            })
            .await
            .map_err(|e| AppError::Internal(format!("Conversion task failed: {}", e)))??;

            let file_name = self
                .store
                .namer()
                .conversion_file_name(&asset.file_name, &conversion.name);
            let path = self.store.namer().conversion_path(&asset, &conversion.name);
            let size_bytes = rendition.bytes.len();
            conversions_disk.write_bytes(&path, rendition.bytes).await?;

            asset = self
                .store
                .repository()
                .add_conversion(asset.id, &conversion.name, &file_name)
                .await?;

            tracing::debug!(
                conversion = %conversion.name,
                path = %path,
                size_bytes,
                mime_type = %rendition.mime_type,
                "Conversion stored"
            );
            report.conversions_written.push(conversion.name);
        }

        Ok(report)
    }

    async fn optimize_original(
        &self,
        asset: &Asset,
        disk: &dyn Disk,
        original_path: &str,
        working: &Path,
    ) -> Result<Asset, AppError> {
        let input = Bytes::from(fs::read(working).await?);
        let input_len = input.len();
        let manipulator = self.manipulator;
        let mime_type = asset.mime_type.clone();
        let max_dimensions = self.settings.original_max_dimensions(&asset.collection_name);

        let rendition = tokio::task::spawn_blocking(move || {
            manipulator.optimize_original(input, &mime_type, max_dimensions)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Optimization task failed: {}", e)))??;

        let size = rendition.bytes.len();
        if size != input_len || rendition.mime_type != asset.mime_type {
            fs::write(working, &rendition.bytes).await?;
            disk.write_bytes(original_path, rendition.bytes).await?;
        }

        tracing::info!(
            path = %original_path,
            original_bytes = input_len,
            size_bytes = size,
            "Original optimized"
        );

        self.store
            .repository()
            .mark_optimized(asset.id, &rendition.mime_type, size as i64)
            .await
    }

    fn temp_path(&self, prefix: &str) -> Result<TempPath, AppError> {
        new_temp_path(self.settings.temp_dir.as_deref(), prefix)
    }
}

/// Holds the per-asset mutex; drops the map entry once nobody else wants it.
struct AssetLease<'a> {
    locks: &'a Mutex<LockMap>,
    asset_id: Uuid,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> AssetLease<'a> {
    fn acquire(locks: &'a Mutex<LockMap>, asset_id: Uuid) -> Self {
        let mutex = lock_map(locks).entry(asset_id).or_default().clone();
        Self {
            locks,
            asset_id,
            mutex,
        }
    }
}

impl Drop for AssetLease<'_> {
    fn drop(&mut self) {
        let mut map = lock_map(self.locks);
        // One reference in the map, one here: no other run is waiting.
        if Arc::strong_count(&self.mutex) == 2 {
            map.remove(&self.asset_id);
        }
    }
}

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_entry_is_removed_after_last_holder() {
        let locks = Mutex::new(LockMap::new());
        let id = Uuid::new_v4();

        let first = AssetLease::acquire(&locks, id);
        let second = AssetLease::acquire(&locks, id);
        assert!(Arc::ptr_eq(&first.mutex, &second.mutex));

        drop(first);
        assert!(lock_map(&locks).contains_key(&id));
        drop(second);
        assert!(lock_map(&locks).is_empty());
    }

    #[test]
    fn original_policy_respects_collection_switch() {
        let config = MediaHubConfig {
            image_conversions: ConversionsConfig::from_json(
                r#"{"*": {}, "logos": {"original": false}}"#,
            )
            .unwrap(),
            ..Default::default()
        };
        let settings = DerivationSettings::from_config(&config).unwrap();

        assert_eq!(
            settings.original_max_dimensions("avatars"),
            config.original_image_manipulations.max_dimensions
        );
        assert_eq!(settings.original_max_dimensions("logos"), None);
    }

    #[test]
    fn invalid_quality_is_rejected() {
        let config = MediaHubConfig {
            optimize_quality: "ultra".into(),
            ..Default::default()
        };
        assert!(DerivationSettings::from_config(&config).is_err());
    }
}
