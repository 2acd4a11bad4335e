//! Final audio artifact stores.

use crate::audio::AssembledAudio;
use crate::error::{PodgenError, Result};
use crate::store::ArtifactStore;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Writes `podcasts/<id>/output/podcast_<id>_<timestamp>.<ext>` under a base directory.
///
/// The reference handed back is the path relative to the base directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    base_path: PathBuf,
}

impl FsArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute location of a reference returned by `store`.
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.base_path.join(reference)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, podcast_id: &str, audio: &AssembledAudio) -> Result<String> {
        let dir = format!("podcasts/{podcast_id}/output");
        let file_name = format!(
            "podcast_{}_{}.{}",
            podcast_id,
            Utc::now().format("%Y%m%d_%H%M%S"),
            audio.extension()
        );
        let reference = format!("{dir}/{file_name}");

        let storage_err = |e: std::io::Error| PodgenError::Storage {
            message: format!("Failed to write {}: {}", reference, e),
        };
        tokio::fs::create_dir_all(self.base_path.join(&dir))
            .await
            .map_err(storage_err)?;
        tokio::fs::write(self.resolve(&reference), &audio.data)
            .await
            .map_err(storage_err)?;

        tracing::info!(podcast_id, reference = %reference, bytes = audio.size(), "Stored podcast audio");
        Ok(reference)
    }
}

/// Keeps artifacts in memory, keyed by reference.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, AssembledAudio>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &str) -> Option<AssembledAudio> {
        self.artifacts.lock().get(reference).cloned()
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.lock().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(&self, podcast_id: &str, audio: &AssembledAudio) -> Result<String> {
        let mut artifacts = self.artifacts.lock();
        let reference = format!(
            "memory://podcasts/{}/output/{}.{}",
            podcast_id,
            artifacts.len(),
            audio.extension()
        );
        artifacts.insert(reference.clone(), audio.clone());
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn audio() -> AssembledAudio {
        AssembledAudio {
            data: vec![1, 2, 3, 4],
            sample_rate: 44_100,
            channels: 1,
            frames: 2,
            segment_count: 1,
        }
    }

    #[tokio::test]
    async fn fs_store_writes_under_podcast_output_dir() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let reference = store.store("12", &audio()).await.unwrap();
        assert!(reference.starts_with("podcasts/12/output/podcast_12_"));
        assert!(reference.ends_with(".wav"));
        assert_eq!(std::fs::read(store.resolve(&reference)).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn memory_store_keeps_each_artifact() {
        let store = MemoryArtifactStore::new();
        let first = store.store("1", &audio()).await.unwrap();
        let second = store.store("1", &audio()).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&first), Some(audio()));
    }
}
