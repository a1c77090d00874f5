//! Recognition task handle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Handle to a running recognition task.
///
/// Dropping the handle detaches the worker; it keeps running until its
/// request ends. Cancelling stops the worker at the next opportunity
/// and suppresses every further handler delivery, including the
/// terminal one.
pub struct RecognitionTask {
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RecognitionTask {
    /// Spawn a worker thread for this task. The worker receives the
    /// shared cancellation flag and must poll it.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let worker = thread::spawn(move || work(flag));
        Self {
            cancelled,
            worker: Some(worker),
        }
    }

    /// Wrap an externally managed cancellation flag. For recognizer
    /// implementations that run their own delivery threads.
    pub fn with_cancellation(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            worker: None,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::Relaxed) {
            debug!("Recognition task cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Whether the worker has exited. Externally managed tasks report
    /// true.
    pub fn is_finished(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |worker| worker.is_finished())
    }
}
