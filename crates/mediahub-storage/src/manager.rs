use crate::factory::create_disk;
use crate::{Disk, StorageError, StorageResult};
use mediahub_core::MediaHubConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of configured disks, resolved by name
#[derive(Clone, Default)]
pub struct DiskManager {
    disks: HashMap<String, Arc<dyn Disk>>,
}

impl DiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every disk listed in the configuration.
    pub async fn from_config(config: &MediaHubConfig) -> StorageResult<Self> {
        let mut manager = Self::new();
        for disk_config in &config.disks {
            let disk = create_disk(disk_config).await?;
            tracing::info!(
                disk = %disk_config.name,
                driver = %disk_config.driver,
                "Disk configured"
            );
            manager.insert(disk);
        }
        Ok(manager)
    }

    pub fn with_disk(mut self, disk: Arc<dyn Disk>) -> Self {
        self.insert(disk);
        self
    }

    pub fn insert(&mut self, disk: Arc<dyn Disk>) {
        self.disks.insert(disk.name().to_string(), disk);
    }

    pub fn get(&self, name: &str) -> StorageResult<Arc<dyn Disk>> {
        self.disks
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::DiskNotConfigured(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.disks.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.disks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use mediahub_core::DiskConfig;

    #[tokio::test]
    async fn resolves_configured_disks_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = MediaHubConfig {
            disks: vec![
                DiskConfig::local("public", dir.path().join("public").to_string_lossy()),
                DiskConfig::local("private", dir.path().join("private").to_string_lossy()),
            ],
            ..Default::default()
        };

        let manager = DiskManager::from_config(&config).await.unwrap();
        assert_eq!(manager.names(), vec!["private", "public"]);
        assert_eq!(manager.get("private").unwrap().name(), "private");
        assert!(matches!(
            manager.get("cdn"),
            Err(StorageError::DiskNotConfigured(name)) if name == "cdn"
        ));
    }
}
