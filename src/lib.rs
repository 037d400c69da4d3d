//! Hark - keyword-gated voice dialog front end
//!
//! This library provides the pieces of a voice-activated command pipeline:
//! - Microphone capture and voice-activity segmentation
//! - Wake-keyword gating with prompt playback at dialog transitions
//! - Command capture to a local WAV recording plus an external processor,
//!   or streamed to a remote speech service as FLAC or raw PCM
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Capture thread                      │
//! │   FrameSource  │  Recognizer  │  Dialog states      │
//! └──────────┬─────────────────────────────┬────────────┘
//!            │ local fallback              │ remote
//! ┌──────────▼──────────────┐   ┌──────────▼────────────┐
//! │  WavWriter → script     │   │  StreamingUplink      │
//! │  (CommandDispatcher)    │   │  FLAC/PCM → Session   │
//! └─────────────────────────┘   └───────────────────────┘
//! ```

pub mod asr;
pub mod audio;
pub mod config;
pub mod dialog;
pub mod dispatch;
pub mod error;
pub mod uplink;

pub use asr::{EnergyRecognizer, Recognizer};
pub use audio::{AudioFrameSource, CpalFrameSource, CpalPromptPlayer, PromptPlayer};
pub use config::DialogConfig;
pub use dialog::{DialogEngine, DialogHandle, DialogState, SourceFactory};
pub use dispatch::CommandDispatcher;
pub use error::{Error, Result};
pub use uplink::{SessionEvents, SessionFactory, SpeechSession, StreamingUplink, WriteRecord};
