//! Prompt playback
//!
//! [`PlaybackQueue`] is the FIFO of files an external caller asks the dialog
//! to play; the capture loop drains it between capture segments.
//! [`PromptPlayer`] is the synchronous playback seam, with a cpal-backed
//! implementation for real output.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// FIFO of files queued for playback by the capture loop
///
/// Cloning shares the underlying queue; the producer is the external caller,
/// the consumer is the capture thread.
#[derive(Clone, Default)]
pub struct PlaybackQueue {
    inner: Arc<Mutex<VecDeque<PathBuf>>>,
}

impl PlaybackQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a file for playback
    pub fn push(&self, path: PathBuf) {
        if let Ok(mut queue) = self.inner.lock() {
            queue.push_back(path);
        }
    }

    /// Dequeue the next file, if any
    #[must_use]
    pub fn pop(&self) -> Option<PathBuf> {
        self.inner.lock().ok().and_then(|mut queue| queue.pop_front())
    }

    /// Number of queued files
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronous prompt playback
///
/// `play` returns once the file has been played to completion. The capture
/// loop pauses recording around every call.
pub trait PromptPlayer: Send {
    /// Play a WAV file to completion
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the output device
    /// fails.
    fn play(&mut self, path: &Path) -> Result<()>;
}

/// Plays WAV prompts on the default output device
pub struct CpalPromptPlayer;

impl PromptPlayer for CpalPromptPlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / 32768.0))
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
        };

        tracing::debug!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate = spec.sample_rate,
            "playing prompt"
        );

        play_samples(samples, spec.sample_rate, spec.channels)
    }
}

/// Play interleaved f32 samples to completion on the default output device
fn play_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for slot in out.iter_mut() {
                        *slot = samples.get(pos).copied().unwrap_or(0.0);
                        pos += 1;
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Wait for the callback to consume everything, with a margin so a
    // stalled device can't hang the capture thread.
    let expected = Duration::from_secs_f64(
        f64::from(u32::try_from(total).unwrap_or(u32::MAX))
            / f64::from(sample_rate)
            / f64::from(channels),
    );
    let deadline = Instant::now() + expected + Duration::from_millis(250);

    while position.load(Ordering::Relaxed) < total && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    Ok(())
}
