use crate::audio::OutputFormat;
use crate::defaults;
use crate::error::{PodgenError, Result};
use crate::orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub orchestrator: OrchestratorSection,
    pub assembly: AssemblyConfig,
    pub storage: StorageConfig,
    pub synthesis: SynthesisConfig,
    pub daemon: DaemonConfig,
    pub logging: LoggingConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorSection {
    pub max_concurrent_runs: usize,
    /// Runs allowed to wait for a worker before `start` fails with Busy.
    pub max_queued_runs: Option<usize>,
}

/// Output audio configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblyConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Where scripts, run snapshots and output audio live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub base_path: PathBuf,
    /// Run snapshot directory; `<base_path>/runs` when unset.
    pub state_dir: Option<PathBuf>,
}

/// External speech and voice commands
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub command: String,
    pub args: Vec<String>,
    pub codec: String,
    /// Command creating a voice from a preview; previews are used as-is when unset.
    pub voice_command: Option<String>,
    pub voice_args: Vec<String>,
    pub context_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_concurrent_runs: defaults::MAX_CONCURRENT_RUNS,
            max_queued_runs: None,
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::OUTPUT_SAMPLE_RATE,
            channels: defaults::OUTPUT_CHANNELS,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: dirs::data_dir()
                .map(|dir| dir.join("podgen"))
                .unwrap_or_else(|| PathBuf::from("podgen-data")),
            state_dir: None,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            command: "espeak-ng".to_string(),
            args: vec![
                "--stdin".to_string(),
                "--stdout".to_string(),
                "-v".to_string(),
                "{voice}".to_string(),
            ],
            codec: defaults::SPEECH_CODEC.to_string(),
            voice_command: None,
            voice_args: Vec::new(),
            context_requests: defaults::PROSODY_CONTEXT_REQUESTS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is unreadable or contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(PodgenError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(PodgenError::ConfigParse {
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - PODGEN_BASE_PATH → storage.base_path
    /// - PODGEN_MAX_CONCURRENT_RUNS → orchestrator.max_concurrent_runs
    /// - PODGEN_LOG_LEVEL → logging.level
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(base_path) = std::env::var("PODGEN_BASE_PATH")
            && !base_path.is_empty()
        {
            self.storage.base_path = PathBuf::from(base_path);
        }

        if let Ok(runs) = std::env::var("PODGEN_MAX_CONCURRENT_RUNS")
            && !runs.is_empty()
        {
            self.orchestrator.max_concurrent_runs =
                runs.parse().map_err(|e| PodgenError::ConfigInvalidValue {
                    key: "PODGEN_MAX_CONCURRENT_RUNS".to_string(),
                    message: format!("{runs:?}: {e}"),
                })?;
        }

        if let Ok(level) = std::env::var("PODGEN_LOG_LEVEL")
            && !level.is_empty()
        {
            self.logging.level = level;
        }

        Ok(self)
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| PodgenError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };
        if self.orchestrator.max_concurrent_runs == 0 {
            return Err(invalid(
                "orchestrator.max_concurrent_runs",
                "must be at least 1",
            ));
        }
        if !(8_000..=192_000).contains(&self.assembly.sample_rate) {
            return Err(invalid(
                "assembly.sample_rate",
                "must be between 8000 and 192000",
            ));
        }
        if !(1..=8).contains(&self.assembly.channels) {
            return Err(invalid("assembly.channels", "must be between 1 and 8"));
        }
        if self.synthesis.command.trim().is_empty() {
            return Err(invalid("synthesis.command", "must not be empty"));
        }
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent_runs: self.orchestrator.max_concurrent_runs,
            max_queued_runs: self.orchestrator.max_queued_runs,
            output: OutputFormat {
                sample_rate: self.assembly.sample_rate,
                channels: self.assembly.channels,
            },
        }
    }

    /// Directory holding run snapshots.
    pub fn state_dir(&self) -> PathBuf {
        self.storage
            .state_dir
            .clone()
            .unwrap_or_else(|| self.storage.base_path.join("runs"))
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/podgen/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("podgen")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_podgen_env() {
        remove_env("PODGEN_BASE_PATH");
        remove_env("PODGEN_MAX_CONCURRENT_RUNS");
        remove_env("PODGEN_LOG_LEVEL");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.orchestrator.max_concurrent_runs, 5);
        assert_eq!(config.orchestrator.max_queued_runs, None);
        assert_eq!(config.assembly.sample_rate, 44_100);
        assert_eq!(config.assembly.channels, 1);
        assert_eq!(config.synthesis.codec, "wav");
        assert_eq!(config.synthesis.context_requests, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [orchestrator]
            max_concurrent_runs = 2
            max_queued_runs = 10

            [assembly]
            sample_rate = 48000
            channels = 2

            [storage]
            base_path = "/srv/podgen"

            [synthesis]
            command = "my-tts"
            args = ["--voice", "{voice}"]
            codec = "mp3"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_runs, 2);
        assert_eq!(config.orchestrator.max_queued_runs, Some(10));
        assert_eq!(config.assembly.sample_rate, 48_000);
        assert_eq!(config.storage.base_path, PathBuf::from("/srv/podgen"));
        assert_eq!(config.state_dir(), PathBuf::from("/srv/podgen/runs"));
        assert_eq!(config.synthesis.command, "my-tts");
        assert_eq!(config.synthesis.codec, "mp3");

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.output.channels, 2);
        assert_eq!(orchestrator.max_queued_runs, Some(10));
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[logging]\nlevel = \"debug\"\n")
            .unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.assembly, AssemblyConfig::default());
        assert_eq!(config.synthesis, SynthesisConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_BASE_PATH", "/data/pods");
        set_env("PODGEN_MAX_CONCURRENT_RUNS", "9");
        set_env("PODGEN_LOG_LEVEL", "trace");
        let config = Config::default().with_env_overrides().unwrap();

        assert_eq!(config.storage.base_path, PathBuf::from("/data/pods"));
        assert_eq!(config.orchestrator.max_concurrent_runs, 9);
        assert_eq!(config.logging.level, "trace");

        clear_podgen_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_LOG_LEVEL", "");
        let config = Config::default().with_env_overrides().unwrap();
        assert_eq!(config.logging.level, "info");

        clear_podgen_env();
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_podgen_env();

        set_env("PODGEN_MAX_CONCURRENT_RUNS", "many");
        let err = Config::default().with_env_overrides().unwrap_err();
        assert!(matches!(err, PodgenError::ConfigInvalidValue { .. }));

        clear_podgen_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[assembly\nsample_rate = ").unwrap();

        assert!(Config::load(temp_file.path()).is_err());
        let err = Config::load_or_default(temp_file.path()).unwrap_err();
        assert!(matches!(err, PodgenError::ConfigParse { .. }));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_podgen_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.orchestrator.max_concurrent_runs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assembly.sample_rate = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assembly.channels = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("podgen"));
        assert!(path_str.ends_with("config.toml"));
    }
}
