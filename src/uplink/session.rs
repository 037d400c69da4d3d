//! Remote speech session capability
//!
//! The uplink reaches its backend only through these traits; the concrete
//! transport (websocket, gRPC, vendor SDK) is supplied by the host
//! application. All session calls happen on the uplink's delivery worker,
//! which owns the live session exclusively.

use async_trait::async_trait;
use tokio::sync::mpsc::WeakUnboundedSender;

use crate::Result;

use super::UplinkOp;

/// A live connection to a remote speech backend
#[async_trait]
pub trait SpeechSession: Send {
    /// Deliver one ordered chunk of audio bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the transport write fails.
    async fn send_audio(&mut self, bytes: Vec<u8>) -> Result<()>;

    /// Close the session (backend-specific teardown)
    ///
    /// # Errors
    ///
    /// Returns an error if teardown fails; the session is considered gone
    /// either way.
    async fn close(&mut self) -> Result<()>;
}

/// Creates sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Establish a new session
    ///
    /// The transport keeps `events` and uses it to report lifecycle events
    /// back to the uplink.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn connect(&self, events: SessionEvents) -> Result<Box<dyn SpeechSession>>;
}

/// Handle a transport uses to report session lifecycle events
///
/// Holds only a weak reference to the uplink, so a transport outliving the
/// uplink reports into the void rather than keeping the worker alive.
#[derive(Clone)]
pub struct SessionEvents {
    tx: WeakUnboundedSender<UplinkOp>,
}

impl SessionEvents {
    pub(crate) fn new(tx: WeakUnboundedSender<UplinkOp>) -> Self {
        Self { tx }
    }

    /// Report that the backend closed the session
    ///
    /// The uplink drops its session handle; a later `reconnect_if_needed`
    /// establishes a fresh one.
    pub fn closed(&self) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(UplinkOp::SessionClosed);
        }
    }
}
