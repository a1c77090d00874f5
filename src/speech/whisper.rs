//! Whisper-based transcription backend

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::RecognizerConfig;
use crate::error::RecognitionError;
use crate::speech::backend::{TranscribeBackend, TRANSCRIBE_SAMPLE_RATE};

/// whisper.cpp rejects inputs shorter than one second; shorter sessions
/// are zero-padded up to this many samples.
const MIN_WHISPER_SAMPLES: usize = TRANSCRIBE_SAMPLE_RATE as usize + TRANSCRIBE_SAMPLE_RATE as usize / 10;

/// [`TranscribeBackend`] running a local Whisper model.
pub struct WhisperBackend {
    ctx: WhisperContext,
    locale: String,
    threads: i32,
}

impl WhisperBackend {
    pub fn new(config: &RecognizerConfig) -> Result<Self, RecognitionError> {
        let model_path = &config.model_path;

        if !model_path.exists() {
            return Err(RecognitionError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        info!("Loading Whisper model from: {}", model_path.display());

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(
            model_path.to_str().unwrap_or_default(),
            ctx_params,
        )
        .map_err(|e| RecognitionError::ModelLoad(e.to_string()))?;

        info!("Whisper model loaded successfully");

        Ok(Self {
            ctx,
            locale: config.locale.clone(),
            threads: config.threads as i32,
        })
    }
}

impl TranscribeBackend for WhisperBackend {
    fn name(&self) -> &str {
        "whisper"
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String, RecognitionError> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        debug!(
            "Transcribing {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f32 / TRANSCRIBE_SAMPLE_RATE as f32
        );

        let mut padded;
        let samples = if samples.len() < MIN_WHISPER_SAMPLES {
            padded = samples.to_vec();
            padded.resize(MIN_WHISPER_SAMPLES, 0.0);
            &padded[..]
        } else {
            samples
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(Some(&self.locale));
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_single_segment(false);
        params.set_no_context(true);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| RecognitionError::Transcription(e.to_string()))?;

        state
            .full(params, samples)
            .map_err(|e| RecognitionError::Transcription(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| RecognitionError::Transcription(e.to_string()))?;

        let mut text = String::new();
        for i in 0..num_segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| RecognitionError::Transcription(e.to_string()))?;
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment);
        }

        debug!("Transcription complete: {} chars", text.len());
        Ok(text)
    }
}

// Safety: WhisperContext is thread-safe for inference
unsafe impl Send for WhisperBackend {}
unsafe impl Sync for WhisperBackend {}
