//! Streaming recognizer driving a transcription backend.
//!
//! Each task runs on its own worker thread. The worker drains the
//! request's audio feed, resamples it to the backend rate, and
//! periodically re-transcribes everything heard so far to produce
//! growing partial hypotheses. When the request signals end of audio
//! the worker decodes one final time and delivers the terminal result.

use rubato::{FftFixedIn, Resampler};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::audio::TapFormat;
use crate::config::RecognizerConfig;
use crate::error::RecognitionError;
use crate::speech::backend::{TranscribeBackend, TRANSCRIBE_SAMPLE_RATE};
use crate::speech::request::{RecognitionRequest, RequestChunk, RequestSource};
use crate::speech::task::RecognitionTask;
use crate::speech::{AvailabilityObserver, RecognitionResult, ResultHandler, SpeechRecognizer};

/// How often the worker polls the audio feed.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Partial decodes wait until at least this much audio has accumulated.
const MIN_PARTIAL_SAMPLES: usize = TRANSCRIBE_SAMPLE_RATE as usize / 5;

/// Input frames fed to the resampler per process call.
const RESAMPLE_CHUNK: usize = 1024;

/// [`SpeechRecognizer`] implementation backed by a [`TranscribeBackend`].
pub struct StreamingRecognizer {
    locale: String,
    partial_interval: Duration,
    backend: Arc<dyn TranscribeBackend>,
    available: Arc<AtomicBool>,
    observer: Arc<Mutex<Option<AvailabilityObserver>>>,
}

impl StreamingRecognizer {
    pub fn new(config: RecognizerConfig, backend: Arc<dyn TranscribeBackend>) -> Self {
        info!(
            "Streaming recognizer ready (backend: {}, locale: {})",
            backend.name(),
            config.locale
        );
        Self {
            locale: config.locale,
            partial_interval: Duration::from_millis(config.partial_interval_ms),
            backend,
            available: Arc::new(AtomicBool::new(true)),
            observer: Arc::new(Mutex::new(None)),
        }
    }

    /// Flip recognizer availability, notifying the registered observer
    /// on a change. Runs the observer on the caller's thread.
    pub fn set_available(&self, available: bool) {
        if self.available.swap(available, Ordering::Relaxed) == available {
            return;
        }
        info!("Recognizer availability changed: {}", available);
        if let Some(observer) = &*self.observer.lock() {
            observer(available);
        }
    }
}

impl SpeechRecognizer for StreamingRecognizer {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn set_availability_observer(&self, observer: AvailabilityObserver) {
        *self.observer.lock() = Some(observer);
    }

    fn start_task(
        &self,
        request: &RecognitionRequest,
        handler: ResultHandler,
    ) -> Result<RecognitionTask, RecognitionError> {
        if !self.is_available() {
            return Err(RecognitionError::Unavailable);
        }
        let source = request
            .take_source()
            .ok_or(RecognitionError::RequestConsumed)?;

        let worker = SessionWorker {
            backend: Arc::clone(&self.backend),
            source,
            format: request.format(),
            report_partials: request.report_partials(),
            partial_interval: self.partial_interval,
            handler,
        };
        debug!(
            "Starting recognition task (locale: {}, source rate: {} Hz)",
            self.locale,
            worker.format.sample_rate
        );
        Ok(RecognitionTask::spawn(move |cancelled| worker.run(cancelled)))
    }
}

struct SessionWorker {
    backend: Arc<dyn TranscribeBackend>,
    source: RequestSource,
    format: TapFormat,
    report_partials: bool,
    partial_interval: Duration,
    handler: ResultHandler,
}

impl SessionWorker {
    fn run(mut self, cancelled: Arc<AtomicBool>) {
        let mut resampler =
            match StreamResampler::new(self.format.sample_rate, TRANSCRIBE_SAMPLE_RATE) {
                Ok(resampler) => resampler,
                Err(e) => {
                    self.fail(&cancelled, e);
                    return;
                }
            };

        // Session audio accumulated at the backend rate. Partial decodes
        // always re-transcribe from the start, so hypotheses only grow.
        let mut audio: Vec<f32> = Vec::new();
        let mut fresh_audio = false;
        let mut last_decode = Instant::now();
        let mut last_text = String::new();

        loop {
            if cancelled.load(Ordering::Relaxed) {
                debug!("Recognition worker exiting: cancelled");
                return;
            }

            match self.source.recv_timeout(POLL_INTERVAL) {
                Some(RequestChunk::Audio(chunk)) => {
                    if let Err(e) = resampler.push(&chunk, &mut audio) {
                        self.fail(&cancelled, e);
                        return;
                    }
                    fresh_audio = true;
                }
                Some(RequestChunk::End) => break,
                None => {}
            }

            if self.report_partials
                && fresh_audio
                && audio.len() >= MIN_PARTIAL_SAMPLES
                && last_decode.elapsed() >= self.partial_interval
            {
                match self.backend.transcribe(&audio) {
                    Ok(text) => {
                        let text = text.trim().to_string();
                        if !text.is_empty() && text != last_text {
                            if cancelled.load(Ordering::Relaxed) {
                                return;
                            }
                            (self.handler)(Some(RecognitionResult::partial(text.clone())), None);
                            last_text = text;
                        }
                    }
                    Err(e) => {
                        self.fail(&cancelled, e);
                        return;
                    }
                }
                fresh_audio = false;
                last_decode = Instant::now();
            }
        }

        if let Err(e) = resampler.finish(&mut audio) {
            self.fail(&cancelled, e);
            return;
        }
        if cancelled.load(Ordering::Relaxed) {
            debug!("Recognition worker exiting: cancelled");
            return;
        }
        debug!(
            "Recognition session audio complete: {} samples at {} Hz",
            audio.len(),
            TRANSCRIBE_SAMPLE_RATE
        );

        if audio.is_empty() {
            (self.handler)(Some(RecognitionResult::final_result(last_text)), None);
            return;
        }
        match self.backend.transcribe(&audio) {
            Ok(text) => {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                let text = text.trim().to_string();
                (self.handler)(Some(RecognitionResult::final_result(text)), None);
            }
            Err(e) => self.fail(&cancelled, e),
        }
    }

    fn fail(&mut self, cancelled: &AtomicBool, error: RecognitionError) {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }
        warn!("Recognition failed: {}", error);
        (self.handler)(None, Some(error));
    }
}

/// Incremental resampler from the capture rate to the backend rate.
///
/// Feeds fixed-size chunks to rubato and carries the remainder between
/// pushes. `finish` zero-pads the tail chunk and trims the output back
/// to the span the real samples cover.
struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    carry: Vec<f32>,
    ratio: f64,
}

impl StreamResampler {
    fn new(source_rate: u32, target_rate: u32) -> Result<Self, RecognitionError> {
        if source_rate == target_rate {
            return Ok(Self {
                inner: None,
                carry: Vec::new(),
                ratio: 1.0,
            });
        }
        let inner = FftFixedIn::<f32>::new(
            source_rate as usize,
            target_rate as usize,
            RESAMPLE_CHUNK,
            1,
            1,
        )
        .map_err(|e| RecognitionError::Resample(e.to_string()))?;
        Ok(Self {
            inner: Some(inner),
            carry: Vec::with_capacity(RESAMPLE_CHUNK),
            ratio: target_rate as f64 / source_rate as f64,
        })
    }

    fn push(&mut self, mut input: &[f32], out: &mut Vec<f32>) -> Result<(), RecognitionError> {
        let resampler = match self.inner.as_mut() {
            Some(resampler) => resampler,
            None => {
                out.extend_from_slice(input);
                return Ok(());
            }
        };

        while !input.is_empty() {
            let take = (RESAMPLE_CHUNK - self.carry.len()).min(input.len());
            self.carry.extend_from_slice(&input[..take]);
            input = &input[take..];

            if self.carry.len() == RESAMPLE_CHUNK {
                let frames = resampler
                    .process(&[&self.carry[..]], None)
                    .map_err(|e| RecognitionError::Resample(e.to_string()))?;
                out.extend_from_slice(&frames[0]);
                self.carry.clear();
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<f32>) -> Result<(), RecognitionError> {
        let resampler = match self.inner.as_mut() {
            Some(resampler) => resampler,
            None => return Ok(()),
        };
        if self.carry.is_empty() {
            return Ok(());
        }

        let valid = self.carry.len();
        self.carry.resize(RESAMPLE_CHUNK, 0.0);
        let frames = resampler
            .process(&[&self.carry[..]], None)
            .map_err(|e| RecognitionError::Resample(e.to_string()))?;
        let keep = ((valid as f64) * self.ratio).round() as usize;
        let produced = &frames[0];
        out.extend_from_slice(&produced[..keep.min(produced.len())]);
        self.carry.clear();
        Ok(())
    }
}
