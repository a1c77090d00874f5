//! Audio capture behind the [`AudioCapture`] contract.
//!
//! The controller only ever talks to [`AudioCapture`]; the cpal-backed
//! [`AudioEngine`] is the production implementation. A tap installed on
//! the engine's input bus receives mono `f32` buffers on the capture
//! thread, so tap callbacks must stay cheap and must not block.

pub mod engine;

pub use engine::AudioEngine;

use std::sync::Arc;

use crate::error::AudioError;

/// Sample rate and channel layout of buffers delivered to a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl TapFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

/// Description of the engine's input, resolved from the capture device.
#[derive(Debug, Clone)]
pub struct InputNode {
    name: String,
    format: TapFormat,
}

impl InputNode {
    pub fn new(name: impl Into<String>, format: TapFormat) -> Self {
        Self {
            name: name.into(),
            format,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native format of buffers the input produces. Taps installed on
    /// this node receive audio at this sample rate, downmixed to mono.
    pub fn output_format(&self) -> TapFormat {
        self.format
    }
}

/// Callback invoked with captured mono samples while a tap is installed.
/// Runs on the capture thread.
pub type TapCallback = Arc<dyn Fn(&[f32]) + Send + Sync>;

/// Microphone capture contract consumed by the controller.
pub trait AudioCapture {
    /// Put the capture backend into a state suitable for recording.
    /// Resolves the device and its stream configuration.
    fn configure_session(&mut self) -> Result<(), AudioError>;

    /// Resolve the capture input. Fails with [`AudioError::NoInputDevice`]
    /// when the machine has no usable input.
    fn input_node(&mut self) -> Result<InputNode, AudioError>;

    /// Install a tap on `bus` delivering buffers of roughly `buffer_size`
    /// frames in `format`. Only one tap per bus.
    fn install_tap(
        &mut self,
        bus: u32,
        buffer_size: u32,
        format: TapFormat,
        tap: TapCallback,
    ) -> Result<(), AudioError>;

    /// Remove the tap from `bus`. Safe to call when no tap is installed.
    fn remove_tap(&mut self, bus: u32);

    /// Allocate capture resources ahead of [`AudioCapture::start`].
    fn prepare(&mut self) -> Result<(), AudioError>;

    /// Start delivering audio to the installed tap.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop capture. The tap stays installed until removed explicitly.
    fn stop(&mut self);

    /// Whether the engine is currently capturing.
    fn is_running(&self) -> bool;
}

/// Average interleaved frames down to a single channel. A trailing
/// partial frame is dropped.
pub fn downmix_into(input: &[f32], channels: usize, out: &mut Vec<f32>) {
    out.clear();
    if channels <= 1 {
        out.extend_from_slice(input);
        return;
    }
    out.reserve(input.len() / channels);
    for frame in input.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() / channels as f32);
    }
}
