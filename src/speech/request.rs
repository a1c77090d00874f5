//! Buffered recognition request

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::audio::TapFormat;

enum Feed {
    Audio(Vec<f32>),
    End,
}

/// Audio feed handle for one recognition session.
///
/// Clones share the same underlying feed, so a clone can live inside a
/// tap callback while the original stays with the controller. Audio
/// appended after [`RecognitionRequest::end_audio`] is dropped.
pub struct RecognitionRequest {
    format: TapFormat,
    report_partials: bool,
    sender: Sender<Feed>,
    ended: Arc<AtomicBool>,
    source: Arc<Mutex<Option<Receiver<Feed>>>>,
}

impl RecognitionRequest {
    pub fn new(format: TapFormat, report_partials: bool) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            format,
            report_partials,
            sender,
            ended: Arc::new(AtomicBool::new(false)),
            source: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    /// Format of the audio this request carries.
    pub fn format(&self) -> TapFormat {
        self.format
    }

    /// Whether the consuming task should report partial hypotheses.
    pub fn report_partials(&self) -> bool {
        self.report_partials
    }

    /// Queue captured samples for the consuming task. Called from the
    /// capture thread; never blocks.
    pub fn append(&self, samples: &[f32]) {
        if self.ended.load(Ordering::Relaxed) {
            debug!("Ignoring {} samples appended after end of audio", samples.len());
            return;
        }
        if self.sender.send(Feed::Audio(samples.to_vec())).is_err() {
            debug!("Recognition task gone; dropping {} samples", samples.len());
        }
    }

    /// Mark the end of the audio stream. Idempotent; the first call wins
    /// and later appends are dropped.
    pub fn end_audio(&self) {
        if self.ended.swap(true, Ordering::Relaxed) {
            return;
        }
        let _ = self.sender.send(Feed::End);
        debug!("Recognition request marked ended");
    }

    /// Whether end of audio has been signalled.
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Relaxed)
    }

    /// Take the consuming end of the feed. Only the first caller gets
    /// it; a recognition task claims it when the session starts.
    pub fn take_source(&self) -> Option<RequestSource> {
        self.source
            .lock()
            .take()
            .map(|receiver| RequestSource { receiver })
    }
}

impl Clone for RecognitionRequest {
    fn clone(&self) -> Self {
        Self {
            format: self.format,
            report_partials: self.report_partials,
            sender: self.sender.clone(),
            ended: Arc::clone(&self.ended),
            source: Arc::clone(&self.source),
        }
    }
}

/// One item pulled from a request's audio feed.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestChunk {
    Audio(Vec<f32>),
    End,
}

/// Consuming end of a request's audio feed, held by the recognition
/// task. A dropped request without an explicit end marker reads as end
/// of audio.
pub struct RequestSource {
    receiver: Receiver<Feed>,
}

impl RequestSource {
    /// Wait up to `timeout` for the next chunk. `None` means no chunk
    /// arrived yet.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RequestChunk> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Feed::Audio(samples)) => Some(RequestChunk::Audio(samples)),
            Ok(Feed::End) => Some(RequestChunk::End),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(RequestChunk::End),
        }
    }

    /// Non-blocking variant of [`RequestSource::recv_timeout`].
    pub fn try_recv(&self) -> Option<RequestChunk> {
        match self.receiver.try_recv() {
            Ok(Feed::Audio(samples)) => Some(RequestChunk::Audio(samples)),
            Ok(Feed::End) => Some(RequestChunk::End),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(RequestChunk::End),
        }
    }
}
