//! Delivery worker
//!
//! The single task that owns the live session. Producers (the capture
//! thread, the encoder path, transport event handles) only enqueue ops; the
//! worker drains them in order, so session calls are serialized and records
//! are delivered strictly FIFO.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};

use super::UplinkOp;
use super::flac::FlacEncoder;
use super::session::{SessionEvents, SessionFactory, SpeechSession};

/// State shared between the producer facade and the worker
pub(crate) struct WorkerState {
    pub factory: Arc<dyn SessionFactory>,
    pub encoder: Option<Arc<Mutex<FlacEncoder>>>,
    pub live: Arc<AtomicBool>,
    pub events_tx: WeakUnboundedSender<UplinkOp>,
}

pub(crate) async fn run(mut rx: UnboundedReceiver<UplinkOp>, state: WorkerState) {
    let mut session: Option<Box<dyn SpeechSession>> = None;

    while let Some(op) = rx.recv().await {
        match op {
            UplinkOp::Connect => {
                if session.is_some() {
                    tracing::warn!("connect requested while a session is live, ignoring");
                    continue;
                }
                let events = SessionEvents::new(state.events_tx.clone());
                match state.factory.connect(events).await {
                    Ok(new_session) => {
                        session = Some(new_session);
                        state.live.store(true, Ordering::SeqCst);
                        arm_encoder(&state);
                        tracing::info!("speech session established");
                    }
                    Err(e) => {
                        state.live.store(false, Ordering::SeqCst);
                        tracing::error!(error = %e, "session connect failed");
                    }
                }
            }
            UplinkOp::Deliver(record) => {
                let Some(live_session) = session.as_mut() else {
                    tracing::debug!(bytes = record.data.len(), "no session, dropping record");
                    continue;
                };
                let bytes = if record.swap_bytes {
                    swap_sample_bytes(record.data)
                } else {
                    record.data
                };
                if let Err(e) = live_session.send_audio(bytes).await {
                    tracing::warn!(error = %e, "session write failed");
                }
            }
            UplinkOp::Close => {
                if let Some(mut old) = session.take() {
                    if let Err(e) = old.close().await {
                        tracing::warn!(error = %e, "session close failed");
                    }
                    tracing::debug!("speech session closed");
                }
                state.live.store(false, Ordering::SeqCst);
                reset_encoder(&state);
            }
            UplinkOp::SessionClosed => {
                if session.take().is_some() {
                    tracing::info!("backend closed the session");
                }
                state.live.store(false, Ordering::SeqCst);
            }
        }
    }

    // Producer side gone: tear down any live session before exiting.
    if let Some(mut old) = session.take() {
        let _ = old.close().await;
    }
    tracing::debug!("uplink worker exited");
}

/// Arm the encoder for a fresh stream after a session is established
fn arm_encoder(state: &WorkerState) {
    let Some(encoder) = &state.encoder else {
        return;
    };
    let Ok(mut enc) = encoder.lock() else {
        tracing::error!("encoder lock poisoned");
        return;
    };
    if let Err(e) = enc.init() {
        tracing::error!(error = %e, "failed to arm encoder");
        return;
    }
    if let Err(e) = enc.begin_stream() {
        tracing::error!(error = %e, "failed to prime encoder stream");
    }
}

/// Discard encoder state so the next session starts with fresh header capture
fn reset_encoder(state: &WorkerState) {
    if let Some(encoder) = &state.encoder {
        if let Ok(mut enc) = encoder.lock() {
            enc.reset();
        }
    }
}

/// Swap the bytes of each 16-bit sample in place
fn swap_sample_bytes(mut data: Vec<u8>) -> Vec<u8> {
    for pair in data.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
    data
}
