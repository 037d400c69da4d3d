//! Engine configuration
//!
//! A typed configuration struct with documented defaults. An optional TOML
//! file ([`file`]) overlays the defaults; callers (the CLI, embedding hosts)
//! override individual fields on top of that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

pub mod file;

/// Default wake keyword
pub const DEFAULT_KEYWORD: &str = "HUMIX";

/// Config file consulted when no explicit path is given
pub const DEFAULT_CONFIG_PATH: &str = "./hark.toml";

/// Default locale tag forwarded to the command script
pub const DEFAULT_LANG: &str = "zh-tw";

/// Default capture sample rate in Hz (16 kHz for speech)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Default pause between capture ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Byte order the remote backend expects for raw PCM records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Deliver samples as-is (little-endian PCM)
    #[default]
    Little,
    /// Byte-swap each sample before delivery
    Big,
}

/// Codec applied to audio on the uplink path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UplinkCodec {
    /// FLAC-encode frames before delivery
    #[default]
    Flac,
    /// Deliver raw 16-bit PCM records
    Pcm,
}

/// Uplink behavior that is configuration rather than wiring
#[derive(Debug, Clone, Default)]
pub struct UplinkSettings {
    /// Codec for outgoing audio
    pub codec: UplinkCodec,

    /// Byte order expected by the backend for raw PCM records
    pub byte_order: ByteOrder,

    /// Optional WAV file providing the keep-alive silence template;
    /// generated zeros are used when absent
    pub silence_wav: Option<PathBuf>,
}

/// Prompt files played at dialog transition points
#[derive(Debug, Clone)]
pub struct Prompts {
    /// Played when the keyword is accepted ("please say a command")
    pub please_say: PathBuf,

    /// Played once a command utterance has been captured
    pub processing: PathBuf,

    /// Played when the wait-for-command window times out
    pub goodbye: PathBuf,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            please_say: PathBuf::from("./voice/interlude/pleasesay1.wav"),
            processing: PathBuf::from("./voice/interlude/pleasesay2.wav"),
            goodbye: PathBuf::from("./voice/interlude/bye.wav"),
        }
    }
}

/// Dialog engine configuration
#[derive(Debug, Clone)]
pub struct DialogConfig {
    /// Input device name; `None` selects the default input device
    pub device: Option<String>,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Wake keyword the recognizer must produce to open a command window
    pub keyword: String,

    /// Locale tag forwarded to the command script
    pub lang: String,

    /// External post-processing script invoked on local fallback recordings
    pub command_processor: PathBuf,

    /// Prompt files
    pub prompts: Prompts,

    /// Local fallback recording path (WAV)
    pub recording_path: PathBuf,

    /// Intermediate encoded path handed to the command script
    pub encoded_path: PathBuf,

    /// Pause between capture ticks
    pub tick_interval: Duration,

    /// Extra options forwarded verbatim to the local ASR engine,
    /// rendered as `-key value` argument pairs
    pub asr_options: Vec<(String, String)>,

    /// Uplink settings (used only when an uplink is attached)
    pub uplink: UplinkSettings,
}

impl Default for DialogConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            keyword: DEFAULT_KEYWORD.to_string(),
            lang: DEFAULT_LANG.to_string(),
            command_processor: PathBuf::from("./processcmd.sh"),
            prompts: Prompts::default(),
            recording_path: tmp.join("hark-command.wav"),
            encoded_path: tmp.join("hark-command.flac"),
            tick_interval: DEFAULT_TICK_INTERVAL,
            asr_options: Vec::new(),
            uplink: UplinkSettings::default(),
        }
    }
}

impl DialogConfig {
    /// Build a configuration from defaults plus an optional TOML overlay file
    ///
    /// An explicitly named file must exist and parse. With no path, the
    /// default [`DEFAULT_CONFIG_PATH`] is consulted tolerantly.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or
    /// parsed, or if the resulting configuration fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        let overlay = match path {
            Some(path) => file::read_overlay(path)?,
            None => file::load_default(Path::new(DEFAULT_CONFIG_PATH)),
        };
        overlay.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Validate required fields
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the sample rate is zero or the keyword
    /// is empty.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample rate must be nonzero".to_string()));
        }
        if self.keyword.trim().is_empty() {
            return Err(Error::Config("keyword must not be empty".to_string()));
        }
        Ok(())
    }

    /// Render the pass-through ASR options as `-key value` argument pairs
    #[must_use]
    pub fn asr_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.asr_options.len() * 2);
        for (key, value) in &self.asr_options {
            args.push(format!("-{key}"));
            args.push(value.clone());
        }
        args
    }
}
