//! Shared test doubles
//!
//! Fakes for the capture, recognition, playback, and session seams so the
//! dialog and uplink tests run without audio hardware or a speech backend.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use hark_dialog::uplink::{SessionEvents, SessionFactory, SpeechSession};
use hark_dialog::{AudioFrameSource, Error, PromptPlayer, Recognizer, Result};

/// One 20 ms tick of audio at 16 kHz
pub const TICK_SAMPLES: usize = 320;

/// Build a constant-valued tick frame
#[must_use]
pub fn frame(value: i16) -> Vec<i16> {
    vec![value; TICK_SAMPLES]
}

/// Frame source fed from a fixed script of frames
///
/// Reads hand out the scripted frames in order; once the script runs out
/// every read fails, which ends the capture loop after the retry limit.
pub struct ScriptedSource {
    frames: VecDeque<Vec<i16>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(frames: Vec<Vec<i16>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// A source that yields `count` silent tick frames
    #[must_use]
    pub fn silent(count: usize) -> Self {
        Self::new(vec![frame(0); count])
    }
}

impl AudioFrameSource for ScriptedSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn read(&mut self, out: &mut [i16]) -> Result<usize> {
        let Some(next) = self.frames.pop_front() else {
            return Err(Error::Audio("scripted frames exhausted".to_string()));
        };
        let n = next.len().min(out.len());
        out[..n].copy_from_slice(&next[..n]);
        Ok(n)
    }
}

/// Recognizer driven by a per-frame script instead of audio content
///
/// Each `process_frame` consumes one speech flag (sticking to `false` once
/// the script runs out); each `end_utterance` consumes one hypothesis.
pub struct ScriptedRecognizer {
    speech: VecDeque<bool>,
    hypotheses: VecDeque<Option<String>>,
    in_speech: bool,
    current: Option<String>,
}

impl ScriptedRecognizer {
    #[must_use]
    pub fn new(speech: Vec<bool>, hypotheses: Vec<Option<String>>) -> Self {
        Self {
            speech: speech.into(),
            hypotheses: hypotheses.into(),
            in_speech: false,
            current: None,
        }
    }
}

impl Recognizer for ScriptedRecognizer {
    fn start_utterance(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }

    fn end_utterance(&mut self) -> Result<()> {
        self.current = self.hypotheses.pop_front().flatten();
        Ok(())
    }

    fn process_frame(&mut self, _samples: &[i16]) -> Result<()> {
        self.in_speech = self.speech.pop_front().unwrap_or(false);
        Ok(())
    }

    fn in_speech(&self) -> bool {
        self.in_speech
    }

    fn hypothesis(&self) -> Option<String> {
        self.current.clone()
    }
}

/// Prompt player that records what it was asked to play
#[derive(Clone, Default)]
pub struct RecordingPlayer {
    played: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingPlayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe handle onto the list of played prompt paths
    #[must_use]
    pub fn played(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.played)
    }
}

impl PromptPlayer for RecordingPlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.played.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Observable state shared by [`MockSessionFactory`] and its sessions
#[derive(Default)]
pub struct SessionProbe {
    /// Audio chunks delivered, in order, across all sessions
    pub sent: Mutex<Vec<Vec<u8>>>,
    /// Sessions established
    pub connects: AtomicUsize,
    /// Sessions closed
    pub closes: AtomicUsize,
    /// Event handle passed to the most recent session
    pub events: Mutex<Option<SessionEvents>>,
}

impl SessionProbe {
    #[must_use]
    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Session factory producing in-memory sessions that record delivery
pub struct MockSessionFactory {
    probe: Arc<SessionProbe>,
}

impl MockSessionFactory {
    #[must_use]
    pub fn new() -> (Arc<Self>, Arc<SessionProbe>) {
        let probe = Arc::new(SessionProbe::default());
        let factory = Arc::new(Self {
            probe: Arc::clone(&probe),
        });
        (factory, probe)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn connect(&self, events: SessionEvents) -> Result<Box<dyn SpeechSession>> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        *self.probe.events.lock().unwrap() = Some(events);
        Ok(Box::new(MockSession {
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct MockSession {
    probe: Arc<SessionProbe>,
}

#[async_trait]
impl SpeechSession for MockSession {
    async fn send_audio(&mut self, bytes: Vec<u8>) -> Result<()> {
        self.probe.sent.lock().unwrap().push(bytes);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
