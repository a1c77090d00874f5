//! Integration tests for the dictation controller.
//!
//! The controller is driven directly through its event handler with
//! fake collaborators standing in for the audio engine, recognizer and
//! terminal surface. Recognition deliveries go through the mailbox the
//! way real worker threads post them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dictate::{
    AudioCapture, AudioError, AuthorizationCallback, AuthorizationProvider, AuthorizationStatus,
    AvailabilityObserver, ButtonLabel, Config, ControllerEvent, DictationController, InputNode,
    MicButton, RecognitionError, RecognitionRequest, RecognitionResult, RecognitionTask,
    RequestChunk, RequestSource, ResultHandler, SpeechRecognizer, TapCallback, TapFormat,
    UiSurface,
};

#[derive(Default)]
struct CaptureState {
    running: bool,
    configure_calls: u32,
    prepare_calls: u32,
    start_calls: u32,
    stop_calls: u32,
    remove_calls: u32,
    tap: Option<TapCallback>,
    fail_input_node: bool,
    fail_start: bool,
}

/// Audio engine double. Cloned handles share state, so tests keep one
/// while the controller owns another.
#[derive(Clone)]
struct FakeCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl FakeCapture {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    /// Simulate the capture thread delivering a buffer to the tap.
    fn emit(&self, samples: &[f32]) {
        let tap = {
            let state = self.state.lock().unwrap();
            if !state.running {
                return;
            }
            state.tap.clone()
        };
        if let Some(tap) = tap {
            tap(samples);
        }
    }

    fn snapshot(&self) -> (u32, u32, u32, u32, u32) {
        let state = self.state.lock().unwrap();
        (
            state.configure_calls,
            state.prepare_calls,
            state.start_calls,
            state.stop_calls,
            state.remove_calls,
        )
    }

    fn has_tap(&self) -> bool {
        self.state.lock().unwrap().tap.is_some()
    }

    fn fail_input_node(&self) {
        self.state.lock().unwrap().fail_input_node = true;
    }

    fn fail_start(&self) {
        self.state.lock().unwrap().fail_start = true;
    }
}

impl AudioCapture for FakeCapture {
    fn configure_session(&mut self) -> Result<(), AudioError> {
        self.state.lock().unwrap().configure_calls += 1;
        Ok(())
    }

    fn input_node(&mut self) -> Result<InputNode, AudioError> {
        let state = self.state.lock().unwrap();
        if state.fail_input_node {
            return Err(AudioError::NoInputDevice);
        }
        Ok(InputNode::new("fake mic", TapFormat::mono(16000)))
    }

    fn install_tap(
        &mut self,
        bus: u32,
        _buffer_size: u32,
        _format: TapFormat,
        tap: TapCallback,
    ) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        if state.tap.is_some() {
            return Err(AudioError::TapInstalled(bus));
        }
        state.tap = Some(tap);
        Ok(())
    }

    fn remove_tap(&mut self, _bus: u32) {
        let mut state = self.state.lock().unwrap();
        state.tap = None;
        state.remove_calls += 1;
    }

    fn prepare(&mut self) -> Result<(), AudioError> {
        self.state.lock().unwrap().prepare_calls += 1;
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state.start_calls += 1;
        if state.fail_start {
            return Err(AudioError::StreamPlay("fake stream refused".to_string()));
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.running = false;
    }

    fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }
}

#[derive(Default)]
struct RecognizerState {
    handlers: Vec<ResultHandler>,
    sources: Vec<RequestSource>,
    cancel_flags: Vec<Arc<AtomicBool>>,
    observer: Option<AvailabilityObserver>,
}

/// Recognizer double. Tasks never run threads; the test script plays
/// the worker by invoking the stored handler.
#[derive(Clone)]
struct ScriptedRecognizer {
    state: Arc<Mutex<RecognizerState>>,
}

impl ScriptedRecognizer {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RecognizerState::default())),
        }
    }

    fn starts(&self) -> usize {
        self.state.lock().unwrap().handlers.len()
    }

    /// Play a delivery from the most recent task's worker.
    fn deliver(&self, result: Option<RecognitionResult>, error: Option<RecognitionError>) {
        let mut state = self.state.lock().unwrap();
        let handler = state
            .handlers
            .last_mut()
            .expect("no recognition task started");
        handler(result, error);
    }

    fn task_cancelled(&self, index: usize) -> bool {
        self.state.lock().unwrap().cancel_flags[index].load(Ordering::Relaxed)
    }

    fn drain_audio(&self, index: usize) -> Vec<RequestChunk> {
        let state = self.state.lock().unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = state.sources[index].try_recv() {
            let is_end = chunk == RequestChunk::End;
            chunks.push(chunk);
            if is_end {
                break;
            }
        }
        chunks
    }

    fn fire_availability(&self, available: bool) {
        let state = self.state.lock().unwrap();
        let observer = state
            .observer
            .as_ref()
            .expect("no availability observer registered");
        observer(available);
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn locale(&self) -> &str {
        "en-US"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn set_availability_observer(&self, observer: AvailabilityObserver) {
        self.state.lock().unwrap().observer = Some(observer);
    }

    fn start_task(
        &self,
        request: &RecognitionRequest,
        handler: ResultHandler,
    ) -> Result<RecognitionTask, RecognitionError> {
        let source = request
            .take_source()
            .ok_or(RecognitionError::RequestConsumed)?;
        let flag = Arc::new(AtomicBool::new(false));

        let mut state = self.state.lock().unwrap();
        state.sources.push(source);
        state.handlers.push(handler);
        state.cancel_flags.push(Arc::clone(&flag));
        Ok(RecognitionTask::with_cancellation(flag))
    }
}

#[derive(Default)]
struct SurfaceLog {
    transcripts: Vec<String>,
    controls: Vec<(bool, ButtonLabel)>,
}

#[derive(Clone, Default)]
struct CapturingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl CapturingSurface {
    fn transcripts(&self) -> Vec<String> {
        self.log.lock().unwrap().transcripts.clone()
    }

    fn last_control(&self) -> Option<(bool, ButtonLabel)> {
        self.log.lock().unwrap().controls.last().copied()
    }
}

impl UiSurface for CapturingSurface {
    fn transcript_changed(&mut self, text: &str) {
        self.log.lock().unwrap().transcripts.push(text.to_string());
    }

    fn control_changed(&mut self, button: &MicButton) {
        self.log
            .lock()
            .unwrap()
            .controls
            .push((button.is_enabled(), button.label()));
    }
}

/// Authorization provider answering synchronously on the caller's
/// thread; the delivery still has to pass through the mailbox.
struct InstantAuth {
    status: AuthorizationStatus,
}

impl AuthorizationProvider for InstantAuth {
    fn request_authorization(&self, callback: AuthorizationCallback) {
        callback(self.status);
    }
}

struct Harness {
    controller: DictationController,
    capture: FakeCapture,
    recognizer: ScriptedRecognizer,
    surface: CapturingSurface,
}

fn harness() -> Harness {
    let capture = FakeCapture::new();
    let recognizer = ScriptedRecognizer::new();
    let surface = CapturingSurface::default();
    let controller = DictationController::new(
        Box::new(capture.clone()),
        Box::new(recognizer.clone()),
        Box::new(surface.clone()),
        &Config::default(),
    );
    Harness {
        controller,
        capture,
        recognizer,
        surface,
    }
}

fn authorized_harness() -> Harness {
    let mut h = harness();
    h.controller
        .handle(ControllerEvent::Authorization(AuthorizationStatus::Authorized));
    h
}

#[test]
fn test_toggle_disabled_until_authorized() {
    let mut h = harness();
    assert!(!h.controller.button().is_enabled());

    h.controller.handle(ControllerEvent::Toggle);
    assert_eq!(h.recognizer.starts(), 0, "toggle before authorization must be ignored");

    for status in [
        AuthorizationStatus::Denied,
        AuthorizationStatus::Restricted,
        AuthorizationStatus::NotDetermined,
    ] {
        h.controller.handle(ControllerEvent::Authorization(status));
        assert!(
            !h.controller.button().is_enabled(),
            "toggle must stay disabled for {:?}",
            status
        );
        h.controller.handle(ControllerEvent::Toggle);
        assert_eq!(h.recognizer.starts(), 0);
    }

    h.controller
        .handle(ControllerEvent::Authorization(AuthorizationStatus::Authorized));
    assert!(h.controller.button().is_enabled());
    assert_eq!(h.controller.button().label(), ButtonLabel::Start);
}

#[test]
fn test_bootstrap_marshals_authorization_through_mailbox() {
    let mut h = harness();
    let auth = InstantAuth {
        status: AuthorizationStatus::Authorized,
    };
    h.controller.bootstrap(&auth);

    // The callback already fired but only queued an event
    assert!(!h.controller.button().is_enabled());
    assert!(h.controller.pump() >= 1);
    assert!(h.controller.button().is_enabled());
}

#[test]
fn test_start_recording_opens_full_session() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);

    let (configures, prepares, starts, _stops, _removes) = h.capture.snapshot();
    assert_eq!(configures, 1);
    assert_eq!(prepares, 1);
    assert_eq!(starts, 1);
    assert!(h.capture.has_tap());
    assert_eq!(h.recognizer.starts(), 1);

    assert!(h.controller.has_active_session());
    assert!(h.controller.button().is_enabled());
    assert_eq!(h.controller.button().label(), ButtonLabel::Stop);
    assert_eq!(h.controller.transcript(), "Say something, I'm listening!");
    assert_eq!(h.surface.last_control(), Some((true, ButtonLabel::Stop)));
}

#[test]
fn test_tap_forwards_captured_audio_to_request() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);

    h.capture.emit(&[0.1, 0.2, 0.3]);
    h.capture.emit(&[0.4]);

    let chunks = h.recognizer.drain_audio(0);
    assert_eq!(
        chunks,
        vec![
            RequestChunk::Audio(vec![0.1, 0.2, 0.3]),
            RequestChunk::Audio(vec![0.4]),
        ]
    );
}

#[test]
fn test_manual_stop_then_terminal_result() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);
    h.capture.emit(&[0.5, 0.6]);

    // Manual stop: engine halts, end of audio is signalled, the toggle
    // is held disabled until the terminal delivery
    h.controller.handle(ControllerEvent::Toggle);
    assert!(!h.capture.is_running());
    assert!(!h.controller.button().is_enabled());
    assert_eq!(h.controller.button().label(), ButtonLabel::Start);
    assert!(h.controller.has_active_session());

    // Buffers captured before the stop precede the end marker
    let chunks = h.recognizer.drain_audio(0);
    assert_eq!(chunks.first(), Some(&RequestChunk::Audio(vec![0.5, 0.6])));
    assert_eq!(chunks.last(), Some(&RequestChunk::End));

    // The engine is stopped, so nothing reaches the tap any more
    h.capture.emit(&[0.9]);
    assert!(h.recognizer.drain_audio(0).is_empty());

    // Terminal result completes the teardown and re-enables the toggle
    h.recognizer
        .deliver(Some(RecognitionResult::final_result("hello world")), None);
    h.controller.pump();

    assert!(h.controller.button().is_enabled());
    assert_eq!(h.controller.button().label(), ButtonLabel::Start);
    assert!(!h.controller.has_active_session());
    assert!(!h.capture.has_tap());
    assert_eq!(h.controller.transcript(), "hello world");
}

#[test]
fn test_partials_overwrite_instead_of_appending() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);

    h.recognizer
        .deliver(Some(RecognitionResult::partial("the")), None);
    h.controller.pump();
    h.recognizer
        .deliver(Some(RecognitionResult::partial("the quick")), None);
    h.controller.pump();
    h.recognizer
        .deliver(Some(RecognitionResult::final_result("the quick fox")), None);
    h.controller.pump();

    assert_eq!(
        h.surface.transcripts(),
        vec![
            "Say something, I'm listening!".to_string(),
            "the".to_string(),
            "the quick".to_string(),
            "the quick fox".to_string(),
        ]
    );
    assert_eq!(h.controller.transcript(), "the quick fox");
}

#[test]
fn test_automatic_end_keeps_stop_label() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);
    assert_eq!(h.controller.button().label(), ButtonLabel::Stop);

    // Final result without a manual stop, as when recognition ends the
    // session on its own
    h.recognizer
        .deliver(Some(RecognitionResult::final_result("done talking")), None);
    h.controller.pump();

    assert!(h.controller.button().is_enabled());
    assert!(!h.controller.has_active_session());
    assert!(!h.capture.has_tap());
    let (_, _, _, stops, removes) = h.capture.snapshot();
    assert!(stops >= 1);
    assert_eq!(removes, 1);

    // The label was not reset; only the manual stop path does that
    assert_eq!(h.controller.button().label(), ButtonLabel::Stop);
    assert_eq!(h.controller.transcript(), "done talking");
}

#[test]
fn test_error_tears_down_and_preserves_transcript() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);

    h.recognizer
        .deliver(Some(RecognitionResult::partial("first words")), None);
    h.controller.pump();
    h.recognizer.deliver(
        None,
        Some(RecognitionError::Transcription("decode failed".to_string())),
    );
    h.controller.pump();

    assert!(h.controller.button().is_enabled());
    assert!(!h.controller.has_active_session());
    assert!(!h.capture.has_tap());
    // An error delivery carries no result, so the last text stays up
    assert_eq!(h.controller.transcript(), "first words");
}

#[test]
fn test_restart_cancels_the_previous_task() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);
    h.controller.handle(ControllerEvent::Toggle);
    assert!(!h.controller.button().is_enabled());

    // Availability flips the toggle back on while the old task is
    // still draining
    h.controller
        .handle(ControllerEvent::AvailabilityChanged(true));
    assert!(h.controller.button().is_enabled());

    h.controller.handle(ControllerEvent::Toggle);
    assert_eq!(h.recognizer.starts(), 2);
    assert!(
        h.recognizer.task_cancelled(0),
        "starting a new session must cancel the previous task"
    );
    assert!(!h.recognizer.task_cancelled(1));
}

#[test]
fn test_availability_loss_disables_toggle_while_idle() {
    let mut h = authorized_harness();
    assert!(h.controller.button().is_enabled());

    h.controller
        .handle(ControllerEvent::AvailabilityChanged(false));
    assert!(!h.controller.button().is_enabled());

    h.controller.handle(ControllerEvent::Toggle);
    assert_eq!(h.recognizer.starts(), 0, "no session while unavailable");
    let (configures, _, starts, _, _) = h.capture.snapshot();
    assert_eq!(configures, 0);
    assert_eq!(starts, 0);

    h.controller
        .handle(ControllerEvent::AvailabilityChanged(true));
    assert!(h.controller.button().is_enabled());
}

#[test]
fn test_availability_observer_routes_through_mailbox() {
    let mut h = harness();
    h.controller.bootstrap(&InstantAuth {
        status: AuthorizationStatus::Authorized,
    });
    h.controller.pump();
    assert!(h.controller.button().is_enabled());

    h.recognizer.fire_availability(false);
    // Observer ran on the recognizer's thread; state is untouched
    // until the event is pumped
    assert!(h.controller.button().is_enabled());
    h.controller.pump();
    assert!(!h.controller.button().is_enabled());
}

#[test]
fn test_missing_input_keeps_session_closed() {
    let mut h = authorized_harness();
    h.capture.fail_input_node();

    h.controller.handle(ControllerEvent::Toggle);

    assert_eq!(h.recognizer.starts(), 0);
    assert!(!h.controller.has_active_session());
    assert!(!h.capture.is_running());
    assert!(h.controller.button().is_enabled());
    assert_eq!(h.controller.button().label(), ButtonLabel::Start);
}

#[test]
fn test_engine_start_failure_is_logged_not_fatal() {
    let mut h = authorized_harness();
    h.capture.fail_start();

    h.controller.handle(ControllerEvent::Toggle);

    // The session opens anyway; the task just hears no audio
    assert_eq!(h.recognizer.starts(), 1);
    assert!(h.controller.has_active_session());
    assert!(!h.capture.is_running());
    assert_eq!(h.controller.button().label(), ButtonLabel::Stop);
    assert_eq!(h.controller.transcript(), "Say something, I'm listening!");
}

#[test]
fn test_quit_tears_down_live_session() {
    let mut h = authorized_harness();
    h.controller.handle(ControllerEvent::Toggle);
    assert!(h.capture.is_running());

    h.controller.handle(ControllerEvent::Quit);

    assert!(!h.capture.is_running());
    assert!(!h.capture.has_tap());
    assert!(!h.controller.has_active_session());
    assert!(h.recognizer.task_cancelled(0));
}
