//! Streaming uplink
//!
//! Owns the encode/queue/session lifecycle independent of the capture
//! thread's cadence. Producers enqueue work on an ordered op channel; a
//! dedicated worker task ([`worker`]) owns the single live session and
//! performs every session-touching call, so delivery is strictly FIFO and
//! single-writer. Audio is FLAC-encoded ([`flac`]) or passed through as raw
//! PCM records, per configuration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::audio::load_silence;
use crate::config::{UplinkCodec, UplinkSettings};
use crate::Result;

pub mod flac;
pub mod session;
mod worker;

pub use flac::FlacEncoder;
pub use session::{SessionEvents, SessionFactory, SpeechSession};

/// One queued write: an owned byte buffer plus its conversion flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Bytes to deliver
    pub data: Vec<u8>,

    /// Swap each 16-bit sample before delivery (raw PCM to a big-endian
    /// backend); always false for encoded bytes
    pub swap_bytes: bool,
}

/// Ops processed by the delivery worker, in order
#[derive(Debug)]
pub(crate) enum UplinkOp {
    Connect,
    Deliver(WriteRecord),
    Close,
    SessionClosed,
}

/// Producer handle for the streaming uplink
///
/// Every method is non-blocking and safe to call from the capture thread;
/// the work happens on the delivery worker.
pub struct StreamingUplink {
    tx: UnboundedSender<UplinkOp>,
    live: Arc<AtomicBool>,
    encoder: Option<Arc<Mutex<FlacEncoder>>>,
    silence: Vec<i16>,
    swap_raw: bool,
    worker: JoinHandle<()>,
}

impl StreamingUplink {
    /// Spawn the delivery worker and return the producer handle
    ///
    /// Must be called within a tokio runtime. The silence template is loaded
    /// here, once.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured silence WAV cannot be read.
    pub fn spawn(
        settings: &UplinkSettings,
        sample_rate: u32,
        factory: Arc<dyn SessionFactory>,
    ) -> Result<Self> {
        let silence = load_silence(settings.silence_wav.as_deref(), sample_rate)?;

        let encoder = match settings.codec {
            UplinkCodec::Flac => Some(Arc::new(Mutex::new(FlacEncoder::new(sample_rate, 1)))),
            UplinkCodec::Pcm => None,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicBool::new(false));

        let state = worker::WorkerState {
            factory,
            encoder: encoder.clone(),
            live: Arc::clone(&live),
            events_tx: tx.downgrade(),
        };
        let worker = tokio::spawn(worker::run(rx, state));

        Ok(Self {
            tx,
            live,
            encoder,
            silence,
            swap_raw: settings.byte_order == crate::config::ByteOrder::Big,
            worker,
        })
    }

    /// Request a new session
    ///
    /// Always issues a request; must not be called while a session is live
    /// (the worker discards such a request with a warning).
    pub fn connect(&self) {
        self.live.store(true, Ordering::SeqCst);
        self.send_op(UplinkOp::Connect);
    }

    /// Request a session only if none is live or being established
    pub fn reconnect_if_needed(&self) {
        if self
            .live
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.send_op(UplinkOp::Connect);
        }
    }

    /// Queue one frame of command audio; no-op on empty input
    pub fn send_voice(&self, frame: &[i16]) {
        if frame.is_empty() {
            return;
        }
        if self.encoder.is_some() {
            self.encode_and_queue(frame);
        } else {
            self.send_op(UplinkOp::Deliver(WriteRecord {
                data: pcm_bytes(frame),
                swap_bytes: self.swap_raw,
            }));
        }
    }

    /// Queue one second of pre-loaded silence
    ///
    /// Used as the idle keep-alive and as the end-of-utterance trailer.
    pub fn send_silence(&self) {
        if self.encoder.is_some() {
            self.encode_and_queue(&self.silence);
        } else {
            self.send_op(UplinkOp::Deliver(WriteRecord {
                data: pcm_bytes(&self.silence),
                swap_bytes: self.swap_raw,
            }));
        }
    }

    /// Close the live session and reset the encoder for the next stream
    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.send_op(UplinkOp::Close);
    }

    /// Whether a session is live or being established
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Drop the producer side and wait for the worker to drain and exit
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.worker.await;
    }

    /// Encode samples and queue the resulting chunks in order
    fn encode_and_queue(&self, samples: &[i16]) {
        let Some(encoder) = &self.encoder else {
            return;
        };
        let chunks = {
            let Ok(mut enc) = encoder.lock() else {
                tracing::warn!("encoder lock poisoned, dropping audio");
                return;
            };
            match enc.encode(samples) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::warn!(error = %e, "flac encode failed, dropping audio");
                    return;
                }
            }
        };
        for data in chunks {
            self.send_op(UplinkOp::Deliver(WriteRecord {
                data,
                swap_bytes: false,
            }));
        }
    }

    fn send_op(&self, op: UplinkOp) {
        if self.tx.send(op).is_err() {
            tracing::debug!("uplink worker gone, dropping op");
        }
    }
}

/// Serialize samples as little-endian PCM bytes
fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_bytes_are_little_endian() {
        let bytes = pcm_bytes(&[0x0102, -2]);
        assert_eq!(bytes, vec![0x02, 0x01, 0xfe, 0xff]);
    }
}
