use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use which::which;

use crate::{MurmurError, Result};

/// Which audio device backs the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// External recorder/player commands
    #[default]
    Command,
    /// In-process synthesized clips, for headless runs
    Memory,
}

impl FromStr for AudioBackend {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "command" => Ok(AudioBackend::Command),
            "memory" => Ok(AudioBackend::Memory),
            other => Err(MurmurError::ConfigError {
                message: format!("Unknown audio backend: {}. Must be one of: command, memory", other),
            }),
        }
    }
}

impl fmt::Display for AudioBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioBackend::Command => f.write_str("command"),
            AudioBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Directory holding the key-value files and recorded clips
    pub data_dir: PathBuf,

    /// Key the murmur collection is stored under
    pub storage_key: String,

    /// Default editor command
    pub editor_command: Option<String>,

    /// Audio device used for recording and playback
    pub audio_backend: AudioBackend,

    /// Command that writes raw audio to stdout until killed
    pub record_command: String,

    /// Command that plays a clip file; the path is appended
    pub play_command: String,

    /// Extension given to clip files written by the command backend
    pub clip_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".murmur"));

        Config {
            data_dir,
            storage_key: "ideas".to_string(),
            editor_command: None,
            audio_backend: AudioBackend::Command,
            record_command: "arecord -q -f cd -t raw".to_string(),
            play_command: "aplay -q -f cd -t raw".to_string(),
            clip_extension: "pcm".to_string(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "murmur")
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from(".murmur/config.json"))
    }

    /// Loads the configuration from `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| MurmurError::ConfigError {
            message: format!("Invalid config file {}: {}", path.display(), e),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|_| MurmurError::DirectoryError {
                    path: parent.to_path_buf(),
                })?;
            }
        }

        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    /// Applies a `key=value` assignment to the matching field.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| MurmurError::ConfigError {
                message: format!("Expected key=value, got: {}", assignment),
            })?;
        let value = value.trim();

        match key.trim() {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "storage_key" => {
                if value.is_empty() {
                    return Err(MurmurError::ConfigError {
                        message: "storage_key cannot be empty".to_string(),
                    });
                }
                self.storage_key = value.to_string();
            }
            "editor_command" => {
                self.editor_command = (!value.is_empty()).then(|| value.to_string());
            }
            "audio_backend" => self.audio_backend = value.parse()?,
            "record_command" => self.record_command = value.to_string(),
            "play_command" => self.play_command = value.to_string(),
            "clip_extension" => self.clip_extension = value.trim_start_matches('.').to_string(),
            other => {
                return Err(MurmurError::ConfigError {
                    message: format!("Unknown configuration key: {}", other),
                })
            }
        }

        Ok(())
    }

    /// Directory recorded clips are written to.
    pub fn clips_dir(&self) -> PathBuf {
        self.data_dir.join("clips")
    }

    // This method provides smart fallbacks when no editor is configured
    pub fn get_editor_command(&self) -> String {
        // First try the configured editor
        if let Some(editor) = &self.editor_command {
            return editor.clone();
        }

        // Then try environment variable
        if let Ok(editor) = std::env::var("EDITOR") {
            return editor;
        }

        // Fall back to platform defaults
        if cfg!(windows) {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "open -t".to_string()
        } else {
            for editor in &["nano", "vim", "vi", "emacs"] {
                if which(editor).is_ok() {
                    return editor.to_string();
                }
            }
            "nano".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_key, "ideas");
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.set("audio_backend=memory").unwrap();
        config.set("data_dir=/tmp/murmur-data").unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.audio_backend, AudioBackend::Memory);
        assert_eq!(loaded.data_dir, PathBuf::from("/tmp/murmur-data"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"storage_key":"murmurs"}"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.storage_key, "murmurs");
        assert_eq!(loaded.clip_extension, "pcm");
    }

    #[test]
    fn rejects_unknown_keys_and_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("colour=blue"),
            Err(MurmurError::ConfigError { .. })
        ));
        assert!(config.set("audio_backend=tape").is_err());
        assert!(config.set("no-equals-sign").is_err());
        assert!(config.set("storage_key=").is_err());
    }

    #[test]
    fn editor_command_prefers_configured_value() {
        let mut config = Config::default();
        config.set("editor_command=hx --vsplit").unwrap();
        assert_eq!(config.get_editor_command(), "hx --vsplit");
    }
}
