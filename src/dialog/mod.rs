//! Keyword-gated dialog engine
//!
//! Wires a frame source, a recognizer, a prompt player, and a command
//! backend into the capture loop, and runs that loop on its own OS thread.
//! The returned [`DialogHandle`] queues prompts and shuts the loop down;
//! recognized command text arrives on the returned channel.

mod capture;
mod state;

pub use state::DialogState;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::asr::Recognizer;
use crate::audio::{AudioFrameSource, PlaybackQueue, PromptPlayer};
use crate::config::DialogConfig;
use crate::dispatch::CommandDispatcher;
use crate::uplink::StreamingUplink;
use crate::{Error, Result};

use capture::{CaptureLoop, CommandBackend};

/// Builds the frame source on the capture thread
///
/// Capture backends are usually not `Send`, so the source is constructed
/// after the thread starts rather than handed across.
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn AudioFrameSource>> + Send>;

/// Voice-activated dialog front end
///
/// Defaults to the local command processor; call
/// [`with_uplink`](Self::with_uplink) to stream command audio to a remote
/// speech service instead.
pub struct DialogEngine {
    config: DialogConfig,
    source: SourceFactory,
    recognizer: Box<dyn Recognizer>,
    player: Box<dyn PromptPlayer>,
    uplink: Option<StreamingUplink>,
}

impl DialogEngine {
    #[must_use]
    pub fn new(
        config: DialogConfig,
        source: SourceFactory,
        recognizer: Box<dyn Recognizer>,
        player: Box<dyn PromptPlayer>,
    ) -> Self {
        Self {
            config,
            source,
            recognizer,
            player,
            uplink: None,
        }
    }

    /// Stream command audio to a remote speech service
    #[must_use]
    pub fn with_uplink(mut self, uplink: StreamingUplink) -> Self {
        self.uplink = Some(uplink);
        self
    }

    /// Start the capture thread
    ///
    /// Returns the control handle plus the stream of recognized command
    /// text. In remote mode the channel stays silent; replies arrive over
    /// the speech session instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn start(self) -> Result<(DialogHandle, UnboundedReceiver<String>)> {
        self.config.validate()?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let playback = PlaybackQueue::default();

        let backend = match self.uplink {
            Some(uplink) => CommandBackend::Remote(uplink),
            None => CommandBackend::Local(CommandDispatcher::new(&self.config)),
        };

        let config = self.config;
        let build_source = self.source;
        let recognizer = self.recognizer;
        let player = self.player;
        let stop_flag = Arc::clone(&stop);
        let queue = playback.clone();

        let thread = std::thread::spawn(move || {
            let source = build_source()?;
            CaptureLoop::new(
                config, source, recognizer, player, backend, commands_tx, stop_flag, queue,
            )
            .run()
        });

        Ok((
            DialogHandle {
                stop,
                playback,
                thread,
            },
            commands_rx,
        ))
    }
}

/// Control handle for a running dialog loop
pub struct DialogHandle {
    stop: Arc<AtomicBool>,
    playback: PlaybackQueue,
    thread: JoinHandle<Result<()>>,
}

impl DialogHandle {
    /// Queue a prompt to play at the next quiet tick
    pub fn play(&self, path: impl Into<PathBuf>) {
        self.playback.push(path.into());
    }

    /// Whether the capture thread is still running
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Raise the stop flag and wait for the capture thread to wind down
    ///
    /// # Errors
    ///
    /// Returns the loop's terminal error if capture aborted early.
    pub fn stop(self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        self.thread
            .join()
            .map_err(|_| Error::Audio("capture thread panicked".to_string()))?
    }
}
