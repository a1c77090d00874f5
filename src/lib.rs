//! Push-to-Talk Dictation
//!
//! A terminal dictation tool that captures microphone audio and streams
//! it through a speech recognizer, displaying the live transcription as
//! it grows.
//!
//! # Architecture
//!
//! The system is organized into the following modules:
//!
//! - `controller`: Event loop owning the UI state and session lifecycle
//! - `audio`: Microphone capture behind the `AudioCapture` contract
//! - `speech`: Streaming recognition (request, task, recognizer, backend)
//! - `auth`: Speech recognition authorization
//! - `ui`: Terminal rendering and input
//! - `config`: Configuration structures
//! - `error`: Error types
//!
//! Everything that happens off the controller thread (authorization
//! callbacks, availability changes, recognition results, captured
//! audio) is marshaled back through the controller's event mailbox.
//!
//! # Example
//!
//! ```no_run
//! use dictate::{AudioConfig, AudioEngine};
//!
//! // Inspect the capture devices the engine can use
//! let engine = AudioEngine::new(AudioConfig::default());
//! for name in engine.list_devices().unwrap() {
//!     println!("{}", name);
//! }
//! ```

pub mod audio;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod speech;
pub mod ui;

// Re-exports for convenience
pub use audio::{AudioCapture, AudioEngine, InputNode, TapCallback, TapFormat};
pub use auth::{
    AuthorizationCallback, AuthorizationProvider, AuthorizationStatus, ConsentAuthorization,
};
pub use config::{AudioConfig, AuthConfig, Config, RecognizerConfig, UiConfig};
pub use controller::{ButtonLabel, ControllerEvent, DictationController, MicButton};
pub use error::{AudioError, ConfigError, DictateError, RecognitionError, Result};
pub use speech::{
    AvailabilityObserver, RecognitionRequest, RecognitionResult, RecognitionTask, RequestChunk,
    RequestSource, ResultHandler, SpeechRecognizer, StreamingRecognizer, TranscribeBackend,
};
#[cfg(feature = "whisper")]
pub use speech::whisper::WhisperBackend;
pub use ui::{ConsoleSurface, UiSurface};
