//! Ingestion of new media: normalize, dedup, validate, store, schedule derivation

use crate::hasher::ContentHasher;
use crate::mime::detect_file;
use crate::source::{MediaSource, NormalizedSource, SourceNormalizer};
use crate::validator::FileValidator;
use mediahub_core::models::{Asset, NewAsset};
use mediahub_core::naming::{format_file_name, sanitize_file_name, split_name_and_extension};
use mediahub_core::{
    AppError, DerivationDispatcher, DerivationJob, ErrorMetadata, LogLevel, MediaHubConfig,
};
use mediahub_db::MediaStore;
use mediahub_storage::copy_into;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;

/// Per-call ingestion options
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Disk for the original; the configured default when `None`
    pub disk: Option<String>,
    /// Disk for conversions; the configured default when `None`
    pub conversions_disk: Option<String>,
    /// Remove the caller's local source file once ingestion is over, whatever the outcome
    pub delete_source: bool,
}

/// Result of a successful ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct Ingested {
    pub asset: Asset,
    /// The content was already managed; no bytes were stored
    pub was_existing: bool,
}

#[derive(Debug)]
pub struct BatchFailure {
    /// Position of the failed source in the batch
    pub index: usize,
    pub error: AppError,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub ingested: Vec<Ingested>,
    pub failures: Vec<BatchFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Front door of the media library
pub struct IngestionPipeline {
    store: MediaStore,
    normalizer: SourceNormalizer,
    validator: FileValidator,
    dispatcher: Arc<dyn DerivationDispatcher>,
    default_disk: String,
    default_conversions_disk: String,
    job_queue: String,
}

impl IngestionPipeline {
    pub fn new(
        config: &MediaHubConfig,
        store: MediaStore,
        dispatcher: Arc<dyn DerivationDispatcher>,
    ) -> Self {
        let normalizer = SourceNormalizer::new(store.disks().clone(), config.temp_dir.clone());
        Self {
            store,
            normalizer,
            validator: FileValidator::from_config(config),
            dispatcher,
            default_disk: config.disk_name.clone(),
            default_conversions_disk: config.conversions_disk_name.clone(),
            job_queue: config.job_queue.clone(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: SourceNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub fn validator(&self) -> &FileValidator {
        &self.validator
    }

    /// Ingest one source into `collection_name`.
    ///
    /// Content already in the library is not stored twice: the existing asset is
    /// touched and returned with `was_existing` set.
    #[tracing::instrument(skip(self, source, options), fields(collection = %collection_name))]
    pub async fn ingest(
        &self,
        source: MediaSource,
        collection_name: &str,
        options: &IngestOptions,
    ) -> Result<Ingested, AppError> {
        let caller_file = source.local_path().map(Path::to_path_buf);

        let result = self.ingest_inner(source, collection_name, options).await;

        if options.delete_source {
            if let Some(path) = caller_file {
                self.remove_caller_file(&path, result.as_ref().ok()).await;
            }
        }

        match &result {
            Ok(ingested) => tracing::info!(
                asset_id = %ingested.asset.id,
                was_existing = ingested.was_existing,
                "Media ingested"
            ),
            Err(e) => match e.log_level() {
                LogLevel::Debug => tracing::debug!(error = %e, "Media ingestion rejected"),
                LogLevel::Warn => tracing::warn!(error = %e, "Media ingestion failed"),
                LogLevel::Error => tracing::error!(
                    error = %e.detailed_message(),
                    error_code = e.error_code(),
                    "Media ingestion failed"
                ),
            },
        }

        result
    }

    /// Ingest every source, collecting failures instead of stopping at the first one.
    pub async fn ingest_batch(
        &self,
        sources: Vec<MediaSource>,
        collection_name: &str,
        options: &IngestOptions,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for (index, source) in sources.into_iter().enumerate() {
            match self.ingest(source, collection_name, options).await {
                Ok(ingested) => outcome.ingested.push(ingested),
                Err(error) => outcome.failures.push(BatchFailure { index, error }),
            }
        }

        outcome
    }

    async fn ingest_inner(
        &self,
        source: MediaSource,
        collection_name: &str,
        options: &IngestOptions,
    ) -> Result<Ingested, AppError> {
        let start = Instant::now();

        let normalized = self.normalizer.normalize(source).await?;

        let content_hash = ContentHasher::hash_file(normalized.path())
            .await
            .map_err(|e| AppError::Source(format!("Failed to read source: {}", e)))?;

        if let Some(existing) = self.store.find_by_hash(&content_hash).await? {
            return self.reuse_existing(existing).await;
        }

        let new_asset = self
            .describe(&normalized, collection_name, options, content_hash)
            .await?;

        self.validator.validate_named(
            &new_asset.file_name,
            new_asset.size as u64,
            &new_asset.mime_type,
        )?;

        let disk = self.store.disks().get(&new_asset.disk)?;
        self.store.disks().get(&new_asset.conversions_disk)?;

        let asset = self.store.create(new_asset).await?;
        let original_dir = self.store.namer().original_dir(asset.id);
        let original_path = self.store.namer().original_path(&asset);

        let stored = async {
            disk.make_dir(&original_dir).await?;
            copy_into(disk.as_ref(), normalized.path(), &original_path, false).await
        }
        .await;

        let size_bytes = match stored {
            Ok(size) => size,
            Err(e) => {
                tracing::error!(
                    asset_id = %asset.id,
                    path = %original_path,
                    error = %e,
                    "Failed to store original, removing record"
                );
                if let Err(cleanup) = self.store.repository().delete(asset.id).await {
                    tracing::error!(asset_id = %asset.id, error = %cleanup, "Failed to remove record");
                }
                return Err(e.into());
            }
        };

        tracing::debug!(
            asset_id = %asset.id,
            disk = %asset.disk,
            key = %original_path,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Original stored"
        );

        self.enqueue(&asset).await;

        Ok(Ingested {
            asset,
            was_existing: false,
        })
    }

    async fn reuse_existing(&self, existing: Asset) -> Result<Ingested, AppError> {
        let asset = self.store.repository().touch(existing.id).await?;
        tracing::debug!(asset_id = %asset.id, "Content already stored, reusing asset");

        if asset.optimized_at.is_none() {
            self.enqueue(&asset).await;
        }

        Ok(Ingested {
            asset,
            was_existing: true,
        })
    }

    /// Resolve final name, mime type, size and disks for a first-seen file.
    async fn describe(
        &self,
        normalized: &NormalizedSource,
        collection_name: &str,
        options: &IngestOptions,
        content_hash: String,
    ) -> Result<NewAsset, AppError> {
        let sanitized = sanitize_file_name(normalized.display_name());
        let (stem, name_extension) = split_name_and_extension(&sanitized);

        let detected = detect_file(normalized.path(), normalized.display_name())
            .await
            .map_err(|e| AppError::Source(format!("Failed to read source: {}", e)))?;
        let extension = detected.extension.clone().unwrap_or(name_extension);

        let size = fs::metadata(normalized.path())
            .await
            .map_err(|e| AppError::Source(format!("Failed to read source: {}", e)))?
            .len();

        Ok(NewAsset {
            collection_name: collection_name.to_string(),
            disk: options
                .disk
                .clone()
                .unwrap_or_else(|| self.default_disk.clone()),
            conversions_disk: options
                .conversions_disk
                .clone()
                .unwrap_or_else(|| self.default_conversions_disk.clone()),
            file_name: format_file_name(&stem, &extension),
            size: size as i64,
            mime_type: detected.mime_type,
            content_hash,
        })
    }

    async fn enqueue(&self, asset: &Asset) {
        let job = DerivationJob::new(asset.id, self.job_queue.clone());
        if let Err(e) = self.dispatcher.dispatch(job).await {
            tracing::warn!(
                asset_id = %asset.id,
                error = %e,
                "Failed to enqueue derivation; a later upload of the same content retries"
            );
        }
    }

    /// Delete the caller's source file, unless it is the stored original itself.
    async fn remove_caller_file(&self, path: &Path, ingested: Option<&Ingested>) {
        if let Some(ingested) = ingested {
            if self.is_stored_original(path, &ingested.asset).await {
                return;
            }
        }

        match fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Source file deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to delete source file"
            ),
        }
    }

    async fn is_stored_original(&self, path: &Path, asset: &Asset) -> bool {
        let Ok(disk) = self.store.disks().get(&asset.disk) else {
            return false;
        };
        let Some(stored) = disk.local_path(&self.store.namer().original_path(asset)) else {
            return false;
        };
        match (fs::canonicalize(path).await, fs::canonicalize(&stored).await) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
