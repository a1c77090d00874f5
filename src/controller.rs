//! Dictation session controller.
//!
//! The controller owns the UI state (record toggle plus transcript) and
//! the three collaborators behind it: authorization, audio capture and
//! speech recognition. All state changes happen on the thread running
//! [`DictationController::run`]; callbacks from other threads post
//! [`ControllerEvent`]s into the controller's mailbox instead of
//! touching state directly.
//!
//! A recording session ends in one of two ways. A manual toggle stops
//! the engine, signals end of audio and disables the toggle until the
//! recognition task delivers its terminal result. An automatic end (a
//! final result or a task error) tears the session down and re-enables
//! the toggle; only the manual path resets the toggle label.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioCapture, TapCallback};
use crate::auth::{AuthorizationProvider, AuthorizationStatus};
use crate::config::Config;
use crate::error::{RecognitionError, Result};
use crate::speech::{
    RecognitionRequest, RecognitionResult, RecognitionTask, ResultHandler, SpeechRecognizer,
};
use crate::ui::UiSurface;

/// Bus the controller installs its tap on.
const INPUT_BUS: u32 = 0;

/// Label shown on the record toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLabel {
    Start,
    Stop,
}

impl ButtonLabel {
    pub fn text(self) -> &'static str {
        match self {
            ButtonLabel::Start => "Start Recording",
            ButtonLabel::Stop => "Stop Recording",
        }
    }
}

/// View state of the record toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicButton {
    enabled: bool,
    label: ButtonLabel,
}

impl Default for MicButton {
    fn default() -> Self {
        // Disabled until authorization arrives
        Self {
            enabled: false,
            label: ButtonLabel::Start,
        }
    }
}

impl MicButton {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn label(&self) -> ButtonLabel {
        self.label
    }
}

/// Events processed by the controller's event loop.
#[derive(Debug)]
pub enum ControllerEvent {
    /// Authorization status arrived from the provider.
    Authorization(AuthorizationStatus),
    /// The user pressed the record toggle.
    Toggle,
    /// The recognition task delivered a result or error.
    Recognition {
        result: Option<RecognitionResult>,
        error: Option<RecognitionError>,
    },
    /// Recognizer availability flipped.
    AvailabilityChanged(bool),
    /// Shut down the event loop.
    Quit,
}

/// Owner of the dictation UI state and session lifecycle.
pub struct DictationController {
    audio: Box<dyn AudioCapture>,
    recognizer: Box<dyn SpeechRecognizer>,
    surface: Box<dyn UiSurface>,
    button: MicButton,
    transcript: String,
    request: Option<RecognitionRequest>,
    task: Option<RecognitionTask>,
    events_tx: Sender<ControllerEvent>,
    events_rx: Receiver<ControllerEvent>,
    tap_buffer_size: u32,
    listening_prompt: String,
}

impl DictationController {
    pub fn new(
        audio: Box<dyn AudioCapture>,
        recognizer: Box<dyn SpeechRecognizer>,
        surface: Box<dyn UiSurface>,
        config: &Config,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            audio,
            recognizer,
            surface,
            button: MicButton::default(),
            transcript: String::new(),
            request: None,
            task: None,
            events_tx,
            events_rx,
            tap_buffer_size: config.audio.buffer_size,
            listening_prompt: config.ui.listening_prompt.clone(),
        }
    }

    /// Sender half of the controller's mailbox. Cloneable; input
    /// sources and shutdown handlers post events through it.
    pub fn sender(&self) -> Sender<ControllerEvent> {
        self.events_tx.clone()
    }

    pub fn button(&self) -> &MicButton {
        &self.button
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Whether a recognition session holds live handles.
    pub fn has_active_session(&self) -> bool {
        self.request.is_some() || self.task.is_some()
    }

    /// Wire up availability and authorization callbacks and render the
    /// initial state. Both callbacks post into the mailbox, so their
    /// threads never touch controller state.
    pub fn bootstrap(&mut self, auth: &dyn AuthorizationProvider) {
        self.push_control();

        let events = self.events_tx.clone();
        self.recognizer
            .set_availability_observer(Box::new(move |available| {
                let _ = events.send(ControllerEvent::AvailabilityChanged(available));
            }));

        let events = self.events_tx.clone();
        auth.request_authorization(Box::new(move |status| {
            let _ = events.send(ControllerEvent::Authorization(status));
        }));
    }

    /// Block on the mailbox until [`ControllerEvent::Quit`] arrives or
    /// every sender is gone.
    pub fn run(&mut self) {
        loop {
            let event = match self.events_rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            let quit = matches!(event, ControllerEvent::Quit);
            self.handle(event);
            if quit {
                break;
            }
        }
    }

    /// Drain and handle every queued event without blocking. Returns
    /// the number of events handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.events_rx.try_recv() {
                Ok(event) => event,
                Err(_) => break,
            };
            self.handle(event);
            handled += 1;
        }
        handled
    }

    /// Apply one event to the controller state.
    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Authorization(status) => self.handle_authorization(status),
            ControllerEvent::Toggle => self.handle_toggle(),
            ControllerEvent::Recognition { result, error } => {
                self.handle_recognition(result, error)
            }
            ControllerEvent::AvailabilityChanged(available) => self.handle_availability(available),
            ControllerEvent::Quit => self.handle_quit(),
        }
    }

    fn handle_authorization(&mut self, status: AuthorizationStatus) {
        let enabled = match status {
            AuthorizationStatus::Authorized => {
                info!("Speech recognition authorized");
                true
            }
            AuthorizationStatus::Denied => {
                warn!("User denied access to speech recognition");
                false
            }
            AuthorizationStatus::Restricted => {
                warn!("Speech recognition restricted on this device");
                false
            }
            AuthorizationStatus::NotDetermined => {
                warn!("Speech recognition not yet authorized");
                false
            }
        };
        self.button.enabled = enabled;
        self.push_control();
    }

    fn handle_toggle(&mut self) {
        if !self.button.enabled {
            debug!("Toggle ignored: control disabled");
            return;
        }
        if self.audio.is_running() {
            self.stop_recording();
        } else {
            match self.start_recording() {
                Ok(()) => {
                    self.button.label = ButtonLabel::Stop;
                    self.push_control();
                }
                Err(e) => error!("Failed to start recording: {}", e),
            }
        }
    }

    fn handle_recognition(
        &mut self,
        result: Option<RecognitionResult>,
        error: Option<RecognitionError>,
    ) {
        let mut finished = false;
        if let Some(result) = result {
            finished = result.is_final;
            if finished {
                info!("Final transcription: {}", result.text);
            }
            self.set_transcript(&result.text);
        }
        if let Some(error) = &error {
            warn!("Recognition task failed: {}", error);
            finished = true;
        }
        if finished {
            self.finish_session();
        }
    }

    fn handle_availability(&mut self, available: bool) {
        if available {
            info!("Speech recognizer became available");
        } else {
            warn!("Speech recognizer became unavailable");
        }
        self.button.enabled = available;
        self.push_control();
    }

    fn handle_quit(&mut self) {
        info!("Shutting down");
        if self.audio.is_running() {
            self.audio.stop();
        }
        if let Some(request) = &self.request {
            request.end_audio();
        }
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        self.audio.remove_tap(INPUT_BUS);
        self.request = None;
    }

    /// Start a recording session: resolve the input, start a recognition
    /// task fed by a tap on the input bus, then start the engine.
    fn start_recording(&mut self) -> Result<()> {
        // A task may still be draining a previous session. Cancel it and
        // clear its tap so the bus is free for the new one.
        if let Some(task) = self.task.take() {
            task.cancel();
            self.audio.remove_tap(INPUT_BUS);
        }
        self.request = None;

        if let Err(e) = self.audio.configure_session() {
            warn!("Audio session configuration failed: {}", e);
        }

        let node = self.audio.input_node()?;
        let format = node.output_format();
        debug!(
            "Recording from '{}' at {} Hz",
            node.name(),
            format.sample_rate
        );

        let request = RecognitionRequest::new(format, true);
        let events = self.events_tx.clone();
        let handler: ResultHandler = Box::new(move |result, error| {
            let _ = events.send(ControllerEvent::Recognition { result, error });
        });
        let task = self.recognizer.start_task(&request, handler)?;

        let tap_feed = request.clone();
        let tap: TapCallback = Arc::new(move |samples| tap_feed.append(samples));
        if let Err(e) = self
            .audio
            .install_tap(INPUT_BUS, self.tap_buffer_size, format, tap)
        {
            task.cancel();
            return Err(e.into());
        }

        if let Err(e) = self.audio.prepare() {
            warn!("Audio engine prepare failed: {}", e);
        }
        // A start failure is logged and the session proceeds; the task
        // will simply hear no audio until the user stops it.
        if let Err(e) = self.audio.start() {
            error!("Audio engine failed to start: {}", e);
        }

        self.request = Some(request);
        self.task = Some(task);

        let prompt = self.listening_prompt.clone();
        self.set_transcript(&prompt);
        Ok(())
    }

    /// Manual stop: halt capture, signal end of audio and hold the
    /// toggle disabled until the task's terminal delivery.
    fn stop_recording(&mut self) {
        info!("Stopping recording");
        self.audio.stop();
        if let Some(request) = &self.request {
            request.end_audio();
        }
        self.button.enabled = false;
        self.button.label = ButtonLabel::Start;
        self.push_control();
    }

    /// Terminal delivery teardown: stop capture, remove the tap, drop
    /// the session handles and re-enable the toggle. The toggle label
    /// is reset by the manual stop path, not here.
    fn finish_session(&mut self) {
        self.audio.stop();
        self.audio.remove_tap(INPUT_BUS);
        self.request = None;
        self.task = None;
        self.button.enabled = true;
        self.push_control();
        debug!("Recognition session finished");
    }

    fn set_transcript(&mut self, text: &str) {
        self.transcript.clear();
        self.transcript.push_str(text);
        self.surface.transcript_changed(&self.transcript);
    }

    fn push_control(&mut self) {
        self.surface.control_changed(&self.button);
    }
}
