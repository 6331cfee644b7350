use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metronome::{TapTempoSettings, TimeSignature};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "cuebeat.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub metronome: MetronomeSettings,
    pub audio: AudioSettings,
    pub tap_tempo: TapTempoSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeSettings {
    pub bpm: f64,
    pub signature: TimeSignature,
    pub muted: bool,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            bpm: 100.0,
            signature: TimeSignature::EightBeat,
            muted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output device name; the host default when unset.
    pub output_device: Option<String>,
    /// Master click volume, 0.0 to 1.0.
    pub volume: f32,
    /// Run silently without opening a device.
    pub enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            output_device: None,
            volume: 1.0,
            enabled: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `explicit` if given (it must exist), else [`DEFAULT_CONFIG_FILE`]
    /// if present, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            log::info!("Loading {}", fallback.display());
            Self::load(fallback)
        } else {
            Ok(Self::default())
        }
    }
}
