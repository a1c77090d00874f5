//! Configuration structures for the dictation pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub recognizer: RecognizerConfig,
    pub auth: AuthConfig,
    pub ui: UiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            recognizer: RecognizerConfig::default(),
            auth: AuthConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject values the pipeline cannot operate with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audio.buffer_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.buffer_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.recognizer.threads == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recognizer.threads".to_string(),
                value: "0".to_string(),
            });
        }
        if self.recognizer.partial_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recognizer.partial_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Audio engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred capture sample rate (Hz); the device may impose another
    pub sample_rate: u32,
    /// Preferred number of capture channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Tap buffer size in frames
    pub buffer_size: u32,
    /// Audio device name (None = default device)
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            buffer_size: 1024,
            device: None,
        }
    }
}

/// Speech recognizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Model size identifier, used by the model downloader
    pub model_size: ModelSize,
    /// Recognition locale (language code)
    pub locale: String,
    /// Number of threads for inference
    pub threads: u32,
    /// Minimum delay between partial hypothesis updates (ms)
    pub partial_interval_ms: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/ggml-base.en.bin"),
            model_size: ModelSize::Base,
            locale: "en".to_string(),
            threads: 4,
            partial_interval_ms: 500,
        }
    }
}

/// Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelSize::Tiny => write!(f, "tiny"),
            ModelSize::Base => write!(f, "base"),
            ModelSize::Small => write!(f, "small"),
            ModelSize::Medium => write!(f, "medium"),
            ModelSize::Large => write!(f, "large"),
        }
    }
}

/// Speech recognition authorization configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Recorded user consent for speech recognition.
    /// None means the user has never been asked.
    pub consent: Option<bool>,
}

/// Terminal surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Prompt shown when a recording session starts
    pub listening_prompt: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            listening_prompt: "Say something, I'm listening!".to_string(),
        }
    }
}
