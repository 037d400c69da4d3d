//! Keyword-gated capture loop
//!
//! One OS thread owns the microphone, the recognizer, and the dialog state
//! machine. Each tick it drains at most one queued prompt, reads one frame,
//! feeds the recognizer, and advances the state. Command audio goes to the
//! configured backend: streamed to a remote speech session, or recorded to
//! a WAV file and handed to the local command processor.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;

use crate::asr::Recognizer;
use crate::audio::{AudioFrameSource, FRAME_SAMPLES, PlaybackQueue, PromptPlayer, WavWriter};
use crate::config::DialogConfig;
use crate::dialog::DialogState;
use crate::dispatch::CommandDispatcher;
use crate::uplink::StreamingUplink;
use crate::{Error, Result};

/// Silent ticks that make up one keep-alive cycle while waiting for a command
const WAIT_TICKS_PER_CYCLE: u32 = 100;

/// Keep-alive cycles without a command before the dialog goes back to sleep
const IDLE_CYCLE_LIMIT: u32 = 20;

/// Consecutive capture read failures tolerated before the loop aborts
const READ_RETRY_LIMIT: u32 = 3;

/// Where command audio goes once the keyword has been accepted
pub(crate) enum CommandBackend {
    /// Stream frames to a remote speech session as they arrive
    Remote(StreamingUplink),

    /// Record to a WAV file and hand it to the local command processor
    Local(CommandDispatcher),
}

pub(crate) struct CaptureLoop {
    config: DialogConfig,
    source: Box<dyn AudioFrameSource>,
    recognizer: Box<dyn Recognizer>,
    player: Box<dyn PromptPlayer>,
    backend: CommandBackend,
    commands: UnboundedSender<String>,
    stop: Arc<AtomicBool>,
    playback: PlaybackQueue,
    state: DialogState,
    writer: Option<WavWriter>,
    wait_ticks: u32,
    idle_cycles: u32,
    read_failures: u32,
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: DialogConfig,
        source: Box<dyn AudioFrameSource>,
        recognizer: Box<dyn Recognizer>,
        player: Box<dyn PromptPlayer>,
        backend: CommandBackend,
        commands: UnboundedSender<String>,
        stop: Arc<AtomicBool>,
        playback: PlaybackQueue,
    ) -> Self {
        Self {
            config,
            source,
            recognizer,
            player,
            backend,
            commands,
            stop,
            playback,
            state: DialogState::Ready,
            writer: None,
            wait_ticks: 0,
            idle_cycles: 0,
            read_failures: 0,
        }
    }

    /// Run until the stop flag is raised or capture fails for good
    ///
    /// # Errors
    ///
    /// Returns an error if the capture source cannot be started, if reads
    /// keep failing past the retry limit, or if the recognizer cannot open
    /// an utterance.
    pub(crate) fn run(mut self) -> Result<()> {
        self.source.start()?;
        self.recognizer.start_utterance()?;
        tracing::info!(keyword = %self.config.keyword, "listening for keyword");

        let result = self.drive();
        self.wind_down();
        result
    }

    fn drive(&mut self) -> Result<()> {
        let mut frame = vec![0_i16; FRAME_SAMPLES];
        loop {
            if self.stop.load(Ordering::SeqCst) {
                self.state = DialogState::Stop;
            }
            if self.state == DialogState::Stop {
                return Ok(());
            }
            self.tick(&mut frame)?;
            std::thread::sleep(self.config.tick_interval);
        }
    }

    fn tick(&mut self, frame: &mut [i16]) -> Result<()> {
        if self.state != DialogState::Command {
            if let Some(path) = self.playback.pop() {
                self.play_prompt(&path)?;
            }
        }

        let n = match self.source.read(frame) {
            Ok(n) => {
                self.read_failures = 0;
                n
            }
            Err(e) => {
                self.read_failures += 1;
                if self.read_failures > READ_RETRY_LIMIT {
                    tracing::error!(error = %e, "giving up after repeated capture failures");
                    return Err(e);
                }
                tracing::warn!(error = %e, attempt = self.read_failures, "capture read failed");
                return Ok(());
            }
        };

        let samples = &frame[..n];
        if let Err(e) = self.recognizer.process_frame(samples) {
            tracing::warn!(error = %e, "recognizer rejected frame");
        }

        match self.state {
            DialogState::Ready => self.on_ready(),
            DialogState::Keyword => self.on_keyword()?,
            DialogState::WaitCommand => self.on_wait_command(samples)?,
            DialogState::Command => self.on_command(samples)?,
            DialogState::Stop => {}
        }
        Ok(())
    }

    fn on_ready(&mut self) {
        if self.recognizer.in_speech() {
            tracing::debug!("speech onset, checking for keyword");
            self.state = DialogState::Keyword;
        }
    }

    fn on_keyword(&mut self) -> Result<()> {
        if self.recognizer.in_speech() {
            return Ok(());
        }

        if let Err(e) = self.recognizer.end_utterance() {
            tracing::warn!(error = %e, "failed to close utterance");
        }

        let matched = self
            .recognizer
            .hypothesis()
            .is_some_and(|hyp| hyp == self.config.keyword);
        if matched {
            tracing::info!(keyword = %self.config.keyword, "keyword accepted");
            if let CommandBackend::Remote(uplink) = &self.backend {
                uplink.connect();
            }
            let prompt = self.config.prompts.please_say.clone();
            self.play_prompt(&prompt)?;
            self.wait_ticks = 0;
            self.idle_cycles = 0;
            self.state = DialogState::WaitCommand;
        } else {
            tracing::debug!("utterance was not the keyword");
            self.state = DialogState::Ready;
        }

        self.recognizer.start_utterance()
    }

    fn on_wait_command(&mut self, samples: &[i16]) -> Result<()> {
        if self.recognizer.in_speech() {
            tracing::debug!("command speech onset");
            match &self.backend {
                CommandBackend::Remote(uplink) => {
                    uplink.reconnect_if_needed();
                    uplink.send_voice(samples);
                }
                CommandBackend::Local(_) => {
                    self.open_recording();
                    self.write_recording(samples);
                }
            }
            self.state = DialogState::Command;
            return Ok(());
        }

        self.wait_ticks += 1;
        if self.wait_ticks < WAIT_TICKS_PER_CYCLE {
            return Ok(());
        }
        self.wait_ticks = 0;
        self.idle_cycles += 1;

        if let CommandBackend::Remote(uplink) = &self.backend {
            uplink.send_silence();
        }
        self.restart_utterance()?;

        if self.idle_cycles >= IDLE_CYCLE_LIMIT {
            tracing::info!("no command after keyword, going back to sleep");
            self.idle_cycles = 0;
            if let CommandBackend::Remote(uplink) = &self.backend {
                uplink.stop();
            }
            let prompt = self.config.prompts.goodbye.clone();
            self.play_prompt(&prompt)?;
            self.state = DialogState::Ready;
        }
        Ok(())
    }

    fn on_command(&mut self, samples: &[i16]) -> Result<()> {
        if self.recognizer.in_speech() {
            match &self.backend {
                CommandBackend::Remote(uplink) => uplink.send_voice(samples),
                CommandBackend::Local(_) => self.write_recording(samples),
            }
            return Ok(());
        }

        if let Err(e) = self.recognizer.end_utterance() {
            tracing::warn!(error = %e, "failed to close utterance");
        }

        match &self.backend {
            CommandBackend::Remote(uplink) => {
                uplink.send_voice(samples);
                uplink.send_silence();
            }
            CommandBackend::Local(_) => self.finish_recording(),
        }

        let prompt = self.config.prompts.processing.clone();
        self.play_prompt(&prompt)?;

        self.idle_cycles = 0;
        self.state = DialogState::WaitCommand;
        self.recognizer.start_utterance()
    }

    /// Stop capture while a prompt plays, then bring it back
    fn play_prompt(&mut self, path: &Path) -> Result<()> {
        self.source.stop();
        if let Err(e) = self.player.play(path) {
            tracing::warn!(error = %e, path = %path.display(), "prompt playback failed");
        }
        self.source.start()
    }

    fn restart_utterance(&mut self) -> Result<()> {
        if let Err(e) = self.recognizer.end_utterance() {
            tracing::warn!(error = %e, "failed to close utterance");
        }
        self.recognizer.start_utterance()
    }

    fn open_recording(&mut self) {
        match WavWriter::create(&self.config.recording_path, self.config.sample_rate) {
            Ok(writer) => self.writer = Some(writer),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %self.config.recording_path.display(),
                    "cannot open recording, command will be lost"
                );
                self.writer = None;
            }
        }
    }

    fn write_recording(&mut self, samples: &[i16]) {
        if let Some(writer) = &mut self.writer {
            if let Err(e) = writer.write(samples) {
                tracing::warn!(error = %e, "failed to append to recording");
            }
        }
    }

    /// Close the recording and hand it to the command processor
    fn finish_recording(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        let bytes = writer.data_bytes();
        if let Err(e) = writer.finalize() {
            tracing::warn!(error = %e, "failed to finalize recording");
            return;
        }
        tracing::debug!(bytes, path = %self.config.recording_path.display(), "command recorded");

        let CommandBackend::Local(dispatcher) = &self.backend else {
            return;
        };
        match dispatcher.run(&self.config.recording_path) {
            Ok(text) => {
                tracing::info!(command = %text, "command received");
                if self.commands.send(text).is_err() {
                    tracing::debug!("command receiver gone, dropping text");
                }
            }
            Err(Error::NoCommand) => {
                tracing::info!("no command recognized");
            }
            Err(e) => {
                tracing::warn!(error = %e, "command processor failed");
            }
        }
    }

    fn wind_down(&mut self) {
        tracing::info!("dialog loop stopping");
        self.source.stop();
        self.writer = None;
        if let CommandBackend::Remote(uplink) = &self.backend {
            if uplink.is_live() {
                uplink.stop();
            }
        }
    }
}
