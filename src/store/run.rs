//! Run snapshot stores.

use crate::error::{PodgenError, Result};
use crate::status::GenerationRun;
use crate::store::RunStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// In-process store; state is lost with the process.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, GenerationRun>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryRunStore {
    fn load_run(&self, podcast_id: &str) -> Result<Option<GenerationRun>> {
        Ok(self.runs.lock().get(podcast_id).cloned())
    }

    fn save_run(&self, run: &GenerationRun) -> Result<()> {
        self.runs
            .lock()
            .insert(run.podcast_id.clone(), run.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per podcast under `dir`.
///
/// Saves go to a temporary sibling first and are renamed into place, so a reader
/// sees either the previous snapshot or the new one.
#[derive(Debug, Clone)]
pub struct JsonRunStore {
    dir: PathBuf,
}

impl JsonRunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, podcast_id: &str) -> PathBuf {
        self.dir.join(format!("{podcast_id}.json"))
    }
}

impl RunStore for JsonRunStore {
    fn load_run(&self, podcast_id: &str) -> Result<Option<GenerationRun>> {
        let path = self.path_for(podcast_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PodgenError::Persistence {
                    message: format!("Failed to read {}: {}", path.display(), e),
                });
            }
        };
        let run = serde_json::from_str(&content).map_err(|e| PodgenError::Persistence {
            message: format!("Corrupt run file {}: {}", path.display(), e),
        })?;
        Ok(Some(run))
    }

    fn save_run(&self, run: &GenerationRun) -> Result<()> {
        let persist_err = |e: std::io::Error| PodgenError::Persistence {
            message: format!("Failed to save run for podcast {}: {}", run.podcast_id, e),
        };

        std::fs::create_dir_all(&self.dir).map_err(persist_err)?;
        let path = self.path_for(&run.podcast_id);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", run.podcast_id, run.run_id));
        let json = serde_json::to_string_pretty(run)?;
        std::fs::write(&tmp, json).map_err(persist_err)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                tracing::debug!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
            return Err(persist_err(e));
        }
        Ok(())
    }
}
