//! Microphone frame source
//!
//! The capture loop reads fixed-size frames of mono 16-bit PCM through the
//! [`AudioFrameSource`] contract. [`CpalFrameSource`] is the hardware
//! implementation; tests substitute scripted sources.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Samples read per capture tick
pub const FRAME_SAMPLES: usize = 2048;

/// Contract over a microphone device
///
/// Opening the device is the implementor's constructor; dropping it releases
/// the handle. Fixed format: mono, 16-bit signed PCM at the configured rate.
pub trait AudioFrameSource {
    /// Begin or resume capturing; idempotent
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses to start.
    fn start(&mut self) -> Result<()>;

    /// Pause capturing; idempotent
    fn stop(&mut self);

    /// Non-blocking read of up to `out.len()` samples
    ///
    /// Returns the number of samples read, which may be zero when no audio
    /// has arrived since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has failed.
    fn read(&mut self, out: &mut [i16]) -> Result<usize>;
}

/// Captures mono 16-bit PCM from a cpal input device
///
/// The input callback converts f32 samples and appends them to a shared
/// ring; `read` drains it without blocking.
pub struct CpalFrameSource {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<VecDeque<i16>>>,
    stream: Option<Stream>,
}

impl CpalFrameSource {
    /// Open an input device by name, or the default device
    ///
    /// # Errors
    ///
    /// Returns an error if no matching device exists or it cannot capture
    /// mono audio at `sample_rate`.
    pub fn open(device_name: Option<&str>, sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| Error::Audio(e.to_string()))?
                .find(|d| d.name().is_ok_and(|n| n == name))
                .ok_or_else(|| Error::Audio(format!("input device not found: {name}")))?,
            None => host
                .default_input_device()
                .ok_or_else(|| Error::Audio("no input device available".to_string()))?,
        };

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            "audio input opened"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            stream: None,
        })
    }
}

impl AudioFrameSource for CpalFrameSource {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        #[allow(clippy::cast_possible_truncation)]
                        buf.extend(
                            data.iter()
                                .map(|s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16),
                        );
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let mut buf = self
            .buffer
            .lock()
            .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;
        let n = out.len().min(buf.len());
        for (slot, sample) in out.iter_mut().zip(buf.drain(..n)) {
            *slot = sample;
        }
        Ok(n)
    }
}
