//! Custom error types for the dictation pipeline

use thiserror::Error;

/// Main error type for the dictation pipeline
#[derive(Error, Debug)]
pub enum DictateError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Audio engine errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio input device available")]
    NoInputDevice,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device configuration: {0}")]
    DeviceConfig(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("A tap is already installed on bus {0}")]
    TapInstalled(u32),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Stream playback error: {0}")]
    StreamPlay(String),
}

/// Speech recognition errors
#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("Recognizer is not available")]
    Unavailable,

    #[error("Recognition request was already consumed by another task")]
    RequestConsumed,

    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },
}

pub type Result<T> = std::result::Result<T, DictateError>;
