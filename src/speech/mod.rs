//! Streaming speech recognition.
//!
//! A recognition session is a pair of handles: a [`RecognitionRequest`]
//! that audio buffers are appended to, and a [`RecognitionTask`] that
//! controls the worker consuming them. Results flow back through a
//! handler callback which may run on any thread; the controller marshals
//! them onto its own event loop.
//!
//! The handler receives zero or more partial results (`is_final ==
//! false`) followed by exactly one terminal delivery: either a final
//! result or an error, never both. A cancelled task delivers nothing
//! further.

pub mod backend;
pub mod request;
pub mod session;
pub mod task;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use backend::{TranscribeBackend, TRANSCRIBE_SAMPLE_RATE};
pub use request::{RecognitionRequest, RequestChunk, RequestSource};
pub use session::StreamingRecognizer;
pub use task::RecognitionTask;

use crate::error::RecognitionError;

/// One transcription hypothesis delivered to the result handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Best transcription of everything heard so far
    pub text: String,
    /// True for the terminal result of a session
    pub is_final: bool,
}

impl RecognitionResult {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Callback receiving recognition results and errors. At least one of
/// the two arguments is always present.
pub type ResultHandler = Box<dyn FnMut(Option<RecognitionResult>, Option<RecognitionError>) + Send>;

/// Callback observing recognizer availability changes. May run on any
/// thread.
pub type AvailabilityObserver = Box<dyn Fn(bool) + Send>;

/// Speech recognizer contract consumed by the controller.
pub trait SpeechRecognizer {
    /// Locale the recognizer transcribes in.
    fn locale(&self) -> &str;

    /// Whether the recognizer can currently accept new tasks.
    fn is_available(&self) -> bool;

    /// Register an observer notified whenever availability flips.
    fn set_availability_observer(&self, observer: AvailabilityObserver);

    /// Start a recognition task consuming `request`'s audio and
    /// reporting through `handler`. The task keeps running until the
    /// request signals end of audio, an error occurs, or the task is
    /// cancelled.
    fn start_task(
        &self,
        request: &RecognitionRequest,
        handler: ResultHandler,
    ) -> Result<RecognitionTask, RecognitionError>;
}
