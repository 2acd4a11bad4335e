//! Podcast script model and where scripts are kept.

use crate::error::{PodgenError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A speaker and the voice they are synthesized with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Persistent voice, ready for synthesis.
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Preview that still has to be turned into a persistent voice.
    #[serde(default)]
    pub voice_preview_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub participant_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodcastScript {
    pub participants: Vec<Participant>,
    pub lines: Vec<ScriptLine>,
}

impl PodcastScript {
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }
}

#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn load_script(&self, podcast_id: &str) -> Result<PodcastScript>;
    async fn save_script(&self, podcast_id: &str, script: &PodcastScript) -> Result<()>;
}

/// Scripts at `<base>/podcasts/<id>/script.json`.
#[derive(Debug, Clone)]
pub struct JsonScriptStore {
    base_path: PathBuf,
}

impl JsonScriptStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn script_path(&self, podcast_id: &str) -> PathBuf {
        self.base_path
            .join("podcasts")
            .join(podcast_id)
            .join("script.json")
    }
}

#[async_trait]
impl ScriptStore for JsonScriptStore {
    async fn load_script(&self, podcast_id: &str) -> Result<PodcastScript> {
        let path = self.script_path(podcast_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PodgenError::NotFound {
                    podcast_id: podcast_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| PodgenError::Storage {
            message: format!("Invalid script {}: {}", path.display(), e),
        })
    }

    async fn save_script(&self, podcast_id: &str, script: &PodcastScript) -> Result<()> {
        let path = self.script_path(podcast_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_string_pretty(script)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryScriptStore {
    scripts: Mutex<HashMap<String, PodcastScript>>,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, podcast_id: &str, script: PodcastScript) {
        self.scripts.lock().insert(podcast_id.to_string(), script);
    }

    pub fn get(&self, podcast_id: &str) -> Option<PodcastScript> {
        self.scripts.lock().get(podcast_id).cloned()
    }
}

#[async_trait]
impl ScriptStore for MemoryScriptStore {
    async fn load_script(&self, podcast_id: &str) -> Result<PodcastScript> {
        self.get(podcast_id).ok_or_else(|| PodgenError::NotFound {
            podcast_id: podcast_id.to_string(),
        })
    }

    async fn save_script(&self, podcast_id: &str, script: &PodcastScript) -> Result<()> {
        self.insert(podcast_id, script.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn script() -> PodcastScript {
        PodcastScript {
            participants: vec![Participant {
                id: "host".to_string(),
                name: "Ada".to_string(),
                voice_id: Some("v1".to_string()),
                voice_preview_id: None,
            }],
            lines: vec![ScriptLine {
                participant_id: "host".to_string(),
                content: "Welcome to the show.".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn json_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonScriptStore::new(dir.path());
        store.save_script("5", &script()).await.unwrap();
        assert!(store.script_path("5").exists());
        assert_eq!(store.load_script("5").await.unwrap(), script());
    }

    #[tokio::test]
    async fn missing_script_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = JsonScriptStore::new(dir.path());
        let err = store.load_script("nope").await.unwrap_err();
        assert!(matches!(err, PodgenError::NotFound { .. }));
    }

    #[test]
    fn participant_voice_fields_are_optional() {
        let participant: Participant =
            serde_json::from_str(r#"{"id":"g","name":"Guest"}"#).unwrap();
        assert_eq!(participant.voice_id, None);
        assert_eq!(participant.voice_preview_id, None);
    }

    #[test]
    fn participant_lookup() {
        let script = script();
        assert_eq!(script.participant("host").map(|p| p.name.as_str()), Some("Ada"));
        assert!(script.participant("guest").is_none());
    }
}
