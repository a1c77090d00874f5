//! cpal-backed audio engine

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::audio::{downmix_into, AudioCapture, InputNode, TapCallback, TapFormat};
use crate::config::AudioConfig;
use crate::error::AudioError;

#[derive(Clone)]
struct InstalledTap {
    bus: u32,
    buffer_size: u32,
    callback: TapCallback,
    /// Cleared on removal so a live stream stops delivering immediately.
    active: Arc<AtomicBool>,
}

/// Microphone capture engine built on cpal.
///
/// Holds at most one tap and one input stream. The stream exists from
/// [`AudioCapture::prepare`] (or `start`) until `stop` or `remove_tap`;
/// buffers flow to the tap only while the engine is running.
pub struct AudioEngine {
    config: AudioConfig,
    host: Host,
    device: Option<Device>,
    stream: Option<Stream>,
    tap: Option<InstalledTap>,
    is_running: Arc<AtomicBool>,
    capture_format: Option<TapFormat>,
}

impl AudioEngine {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            host: cpal::default_host(),
            device: None,
            stream: None,
            tap: None,
            is_running: Arc::new(AtomicBool::new(false)),
            capture_format: None,
        }
    }

    /// List available audio input devices
    pub fn list_devices(&self) -> Result<Vec<String>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn find_device_by_name(&self, name: &str) -> Result<Device, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        for device in devices {
            if let Ok(device_name) = device.name() {
                if device_name.contains(name) {
                    return Ok(device);
                }
            }
        }

        Err(AudioError::DeviceNotFound(name.to_string()))
    }

    fn build_stream(&mut self) -> Result<(), AudioError> {
        let tap = match &self.tap {
            Some(tap) => tap.clone(),
            None => return Ok(()),
        };
        let capture = self
            .capture_format
            .ok_or_else(|| AudioError::DeviceConfig("Capture format not resolved".to_string()))?;
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| AudioError::DeviceConfig("Device not initialized".to_string()))?;

        let stream_config = StreamConfig {
            channels: capture.channels,
            sample_rate: SampleRate(capture.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(tap.buffer_size),
        };

        let is_running = self.is_running.clone();
        let active = tap.active.clone();
        let callback = tap.callback.clone();
        let channels = capture.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) || !active.load(Ordering::Relaxed) {
                        return;
                    }
                    downmix_into(data, channels, &mut scratch);
                    callback(&scratch);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }
}

impl AudioCapture for AudioEngine {
    fn configure_session(&mut self) -> Result<(), AudioError> {
        let device = if let Some(ref device_name) = self.config.device {
            self.find_device_by_name(device_name)?
        } else {
            self.host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice)?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let supported_configs = device
            .supported_input_configs()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        // Find the best f32 configuration, preferring a matching channel count
        let mut best_config = None;
        for cfg in supported_configs {
            if cfg.sample_format() != SampleFormat::F32 {
                continue;
            }
            debug!(
                "Supported config: channels={}, sample_rate={:?}-{:?}",
                cfg.channels(),
                cfg.min_sample_rate(),
                cfg.max_sample_rate()
            );

            if cfg.channels() == self.config.channels {
                let target_rate = SampleRate(self.config.sample_rate);
                if cfg.min_sample_rate() <= target_rate && target_rate <= cfg.max_sample_rate() {
                    best_config = Some(cfg.with_sample_rate(target_rate));
                } else {
                    best_config = Some(cfg.with_max_sample_rate());
                }
                break;
            }
            if best_config.is_none() {
                best_config = Some(cfg.with_max_sample_rate());
            }
        }

        let supported_config = best_config.ok_or_else(|| {
            AudioError::UnsupportedFormat("no f32 input configuration found".to_string())
        })?;

        self.capture_format = Some(TapFormat {
            sample_rate: supported_config.sample_rate().0,
            channels: supported_config.channels(),
        });
        info!(
            "Audio config: {} channels @ {} Hz (preferred: {} Hz)",
            supported_config.channels(),
            supported_config.sample_rate().0,
            self.config.sample_rate
        );

        self.device = Some(device);
        Ok(())
    }

    fn input_node(&mut self) -> Result<InputNode, AudioError> {
        if self.device.is_none() {
            self.configure_session()?;
        }
        let device = self.device.as_ref().ok_or(AudioError::NoInputDevice)?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let capture = self
            .capture_format
            .ok_or_else(|| AudioError::DeviceConfig("Capture format not resolved".to_string()))?;

        // Taps always see mono buffers at the device rate
        Ok(InputNode::new(name, TapFormat::mono(capture.sample_rate)))
    }

    fn install_tap(
        &mut self,
        bus: u32,
        buffer_size: u32,
        format: TapFormat,
        tap: TapCallback,
    ) -> Result<(), AudioError> {
        if let Some(existing) = &self.tap {
            return Err(AudioError::TapInstalled(existing.bus));
        }
        if let Some(capture) = self.capture_format {
            if format.sample_rate != capture.sample_rate {
                debug!(
                    "Tap format {} Hz differs from capture rate {} Hz",
                    format.sample_rate, capture.sample_rate
                );
            }
        }
        self.tap = Some(InstalledTap {
            bus,
            buffer_size,
            callback: tap,
            active: Arc::new(AtomicBool::new(true)),
        });
        debug!("Tap installed on bus {} ({} frames)", bus, buffer_size);
        Ok(())
    }

    fn remove_tap(&mut self, bus: u32) {
        if let Some(tap) = &self.tap {
            if tap.bus == bus {
                tap.active.store(false, Ordering::Relaxed);
                self.tap = None;
                self.stream = None;
                debug!("Tap removed from bus {}", bus);
            }
        }
    }

    fn prepare(&mut self) -> Result<(), AudioError> {
        if self.tap.is_none() {
            debug!("Prepare called with no tap installed");
            return Ok(());
        }
        if self.device.is_none() {
            self.configure_session()?;
        }
        self.build_stream()
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_none() && self.tap.is_some() {
            self.prepare()?;
        }
        if let Some(stream) = &self.stream {
            stream
                .play()
                .map_err(|e| AudioError::StreamPlay(e.to_string()))?;
        }
        self.is_running.store(true, Ordering::Relaxed);
        info!("Audio engine started");
        Ok(())
    }

    fn stop(&mut self) {
        if self.is_running.swap(false, Ordering::Relaxed) {
            info!("Audio engine stopped");
        }
        self.stream = None;
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
