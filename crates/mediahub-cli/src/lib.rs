//! Wiring shared by the `mediahub` binary: repository selection, the derivation
//! queue and the ingestion pipeline built from one [`MediaHubConfig`].

use anyhow::{bail, Context, Result};
use mediahub_core::models::Asset;
use mediahub_core::{MediaHubConfig, PathNamer};
use mediahub_db::{
    connect, AssetRepository, InMemoryAssetRepository, MediaStore, PgAssetRepository,
};
use mediahub_processing::{DerivationEngine, IngestionPipeline};
use mediahub_storage::DiskManager;
use mediahub_worker::{DerivationQueue, JobHandler, QueueConfig};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Every component of a running media library.
pub struct MediaHub {
    pub config: MediaHubConfig,
    pub store: MediaStore,
    pub engine: Arc<DerivationEngine>,
    pub queue: Arc<DerivationQueue>,
    pub pipeline: IngestionPipeline,
    // Keeps the queue's weak handler reference alive.
    _handler: Arc<dyn JobHandler>,
}

impl MediaHub {
    /// Build the library. Records go to PostgreSQL when a database URL is configured,
    /// to process memory otherwise.
    pub async fn build(config: MediaHubConfig) -> Result<Self> {
        let repository: Arc<dyn AssetRepository> = match &config.database_url {
            Some(url) => {
                let pool = connect(url, config.db_max_connections).await?;
                Arc::new(PgAssetRepository::new(pool))
            }
            None => {
                tracing::warn!("MEDIAHUB_DATABASE_URL not set, records are kept in memory");
                Arc::new(InMemoryAssetRepository::new())
            }
        };
        Self::with_repository(config, repository).await
    }

    pub async fn with_repository(
        config: MediaHubConfig,
        repository: Arc<dyn AssetRepository>,
    ) -> Result<Self> {
        let disks = DiskManager::from_config(&config)
            .await
            .context("Failed to initialize disks")?;
        let store = MediaStore::new(repository, disks, PathNamer::new(&config.path_prefix))
            .with_thumbnail_conversion(config.thumbnail_conversion_name.clone());

        let engine = Arc::new(DerivationEngine::from_config(store.clone(), &config)?);
        let handler: Arc<dyn JobHandler> = engine.clone();
        let queue = Arc::new(DerivationQueue::new(
            QueueConfig::from_config(&config),
            Arc::downgrade(&handler),
        ));
        let pipeline = IngestionPipeline::new(&config, store.clone(), queue.clone());

        Ok(Self {
            config,
            store,
            engine,
            queue,
            pipeline,
            _handler: handler,
        })
    }
}

/// Parse `key=value` arguments into custom data. Values that are valid JSON keep
/// their type; anything else is stored as a string.
pub fn parse_data_pairs(pairs: &[String]) -> Result<Map<String, JsonValue>> {
    let mut data = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected key=value, got '{}'", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty key in '{}'", pair);
        }
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| JsonValue::String(value.to_string()));
        data.insert(key.to_string(), value);
    }
    Ok(data)
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn print_asset_table(collection_name: &str, assets: &[Asset]) {
    println!("\n=== Collection: {} ===\n", collection_name);

    if assets.is_empty() {
        println!("No media found.\n");
        return;
    }

    println!(
        "{:<36} {:<30} {:<20} {:>12} {:<10} {:>20}",
        "ID", "File Name", "Mime Type", "Size (KB)", "State", "Created At"
    );
    println!("{}", "-".repeat(133));

    for asset in assets {
        println!(
            "{:<36} {:<30} {:<20} {:>12.1} {:<10} {:>20}",
            asset.id,
            truncate_string(&asset.file_name, 30),
            truncate_string(&asset.mime_type, 20),
            asset.size as f64 / 1000.0,
            format!("{:?}", asset.state()).to_lowercase(),
            asset.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\nTotal: {} items\n", assets.len());
}
