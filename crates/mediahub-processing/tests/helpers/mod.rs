//! Test helpers: a media library on local disks under a temp dir, with an in-memory
//! repository and a dispatcher that records jobs instead of running them.
//!
//! Run with: `cargo test -p mediahub-processing`

#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use mediahub_core::{
    AppError, ConversionsConfig, DerivationDispatcher, DerivationJob, DiskConfig, MediaHubConfig,
    PathNamer,
};
use mediahub_db::{InMemoryAssetRepository, MediaStore};
use mediahub_processing::{DerivationEngine, IngestionPipeline};
use mediahub_storage::DiskManager;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Dispatcher that remembers every accepted job.
#[derive(Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<DerivationJob>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn jobs(&self) -> Vec<DerivationJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DerivationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, job: DerivationJob) -> Result<(), AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("queue unavailable".into()));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

pub struct TestLibrary {
    pub dir: TempDir,
    pub config: MediaHubConfig,
    pub store: MediaStore,
    pub repository: InMemoryAssetRepository,
    pub pipeline: IngestionPipeline,
    pub engine: DerivationEngine,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl TestLibrary {
    /// Directory holding the caller-side files of a test.
    pub fn inbox(&self) -> PathBuf {
        self.dir.path().join("inbox")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    /// Write `data` into the inbox and return its path.
    pub fn inbox_file(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.inbox().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    /// Number of files left in the temp dir.
    pub fn temp_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir()).unwrap().count()
    }
}

pub fn thumb_conversions() -> ConversionsConfig {
    ConversionsConfig::from_json(
        r#"{"*": {"thumb": {"fit": "max", "width": 100, "height": 100}}}"#,
    )
    .unwrap()
}

/// Library with a `public` disk and an `archive` disk, `thumb` conversion for every
/// collection.
pub async fn setup_library() -> TestLibrary {
    setup_library_with(|_| {}).await
}

pub async fn setup_library_with<F>(customize: F) -> TestLibrary
where
    F: FnOnce(&mut MediaHubConfig),
{
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("inbox")).unwrap();
    std::fs::create_dir_all(dir.path().join("tmp")).unwrap();

    let root = |name: &str| dir.path().join(name).to_string_lossy().into_owned();
    let mut config = MediaHubConfig {
        disks: vec![
            DiskConfig::local("public", root("public")),
            DiskConfig::local("archive", root("archive")),
        ],
        image_conversions: thumb_conversions(),
        temp_dir: Some(dir.path().join("tmp")),
        ..Default::default()
    };
    customize(&mut config);
    config.validate().unwrap();

    let disks = DiskManager::from_config(&config).await.unwrap();
    let repository = InMemoryAssetRepository::new();
    let store = MediaStore::new(
        Arc::new(repository.clone()),
        disks,
        PathNamer::new(&config.path_prefix),
    )
    .with_thumbnail_conversion(Some("thumb".into()));

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let pipeline = IngestionPipeline::new(&config, store.clone(), dispatcher.clone());
    let engine = DerivationEngine::from_config(store.clone(), &config).unwrap();

    TestLibrary {
        dir,
        config,
        store,
        repository,
        pipeline,
        engine,
        dispatcher,
    }
}
