//! Transcription backend contract

use crate::error::RecognitionError;

/// Sample rate every backend receives audio at (Hz, mono f32).
pub const TRANSCRIBE_SAMPLE_RATE: u32 = 16_000;

/// Batch transcription engine behind the streaming recognizer.
///
/// The recognizer hands a backend the complete session audio heard so
/// far, resampled to [`TRANSCRIBE_SAMPLE_RATE`] mono, and uses the
/// returned text as the current best hypothesis. Implementations must
/// be safe to call from the recognizer's worker thread.
pub trait TranscribeBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Transcribe `samples` from the beginning. An empty slice yields
    /// an empty transcription.
    fn transcribe(&self, samples: &[f32]) -> Result<String, RecognitionError>;
}
