//! End-to-end: ingestion dispatches to the queue, the worker pool derives.
//!
//! Run with: `cargo test -p mediahub-worker --test queue_test`

use image::codecs::jpeg::JpegEncoder;
use image::{GenericImageView, Rgb, RgbImage};
use mediahub_core::{ConversionsConfig, DiskConfig, MediaHubConfig, PathNamer};
use mediahub_db::{InMemoryAssetRepository, MediaStore};
use mediahub_processing::{DerivationEngine, IngestOptions, IngestionPipeline, MediaSource};
use mediahub_storage::{Disk, DiskManager};
use mediahub_worker::{DerivationQueue, JobHandler, QueueConfig};
use std::sync::Arc;

fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, 90)
        .encode_image(&img)
        .unwrap();
    buffer
}

#[tokio::test]
async fn test_ingested_images_are_derived_by_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("tmp")).unwrap();
    let config = MediaHubConfig {
        disks: vec![DiskConfig::local(
            "public",
            dir.path().join("public").to_string_lossy(),
        )],
        image_conversions: ConversionsConfig::from_json(
            r#"{"*": {"thumb": {"fit": "crop", "width": 32, "height": 32}}}"#,
        )
        .unwrap(),
        temp_dir: Some(dir.path().join("tmp")),
        ..Default::default()
    };

    let disks = DiskManager::from_config(&config).await.unwrap();
    let store = MediaStore::new(
        Arc::new(InMemoryAssetRepository::new()),
        disks,
        PathNamer::new(&config.path_prefix),
    );

    let engine: Arc<dyn JobHandler> =
        Arc::new(DerivationEngine::from_config(store.clone(), &config).unwrap());
    let queue = Arc::new(DerivationQueue::new(
        QueueConfig::from_config(&config),
        Arc::downgrade(&engine),
    ));
    let pipeline = IngestionPipeline::new(&config, store.clone(), queue.clone());

    let mut ids = Vec::new();
    for (i, (w, h)) in [(120, 80), (64, 200), (300, 300)].into_iter().enumerate() {
        let path = dir.path().join(format!("photo-{i}.jpg"));
        std::fs::write(&path, gradient_jpeg(w, h)).unwrap();
        let ingested = pipeline
            .ingest(MediaSource::LocalPath(path), "gallery", &IngestOptions::default())
            .await
            .unwrap();
        ids.push(ingested.asset.id);
    }

    queue.wait_idle().await;

    let disk = store.disks().get("public").unwrap();
    for id in ids {
        let asset = store.get(id).await.unwrap();
        assert!(asset.optimized_at.is_some());
        let thumb_name = asset.conversions.get("thumb").unwrap();
        let thumb = disk
            .read_bytes(&format!("media/{}/conversions/{}", id, thumb_name))
            .await
            .unwrap();
        assert_eq!(image::load_from_memory(&thumb).unwrap().dimensions(), (32, 32));
    }

    queue.shutdown().await;
}
