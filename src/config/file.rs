//! TOML configuration file loading
//!
//! All fields are optional; the file is a partial overlay on top of
//! defaults. An explicitly named file is loaded strictly; the default
//! `./hark.toml` is loaded tolerantly (absence and parse errors fall back
//! to defaults with a warning).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::Result;

use super::{ByteOrder, DialogConfig, UplinkCodec};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DialogConfigFile {
    /// Audio device and timing
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Keyword and locale
    #[serde(default)]
    pub dialog: DialogFileConfig,

    /// Script and scratch-file paths
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Prompt files
    #[serde(default)]
    pub prompts: PromptsFileConfig,

    /// Uplink settings
    #[serde(default)]
    pub uplink: UplinkFileConfig,

    /// Pass-through options for the local ASR engine
    #[serde(default)]
    pub asr: AsrFileConfig,
}

/// Audio device and timing configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Input device name
    pub device: Option<String>,

    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Pause between capture ticks, in milliseconds
    pub tick_interval_ms: Option<u64>,
}

/// Keyword and locale configuration
#[derive(Debug, Default, Deserialize)]
pub struct DialogFileConfig {
    /// Wake keyword
    pub keyword: Option<String>,

    /// Locale tag (e.g. "zh-tw", "en-us")
    pub lang: Option<String>,
}

/// Script and scratch-file paths
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    /// External command post-processing script
    pub command_processor: Option<PathBuf>,

    /// Local fallback recording path (WAV)
    pub recording: Option<PathBuf>,

    /// Intermediate encoded path handed to the command script
    pub encoded: Option<PathBuf>,
}

/// Prompt file paths
#[derive(Debug, Default, Deserialize)]
pub struct PromptsFileConfig {
    /// "Please say a command" prompt
    pub please_say: Option<PathBuf>,

    /// "Processing" prompt
    pub processing: Option<PathBuf>,

    /// Timeout "goodbye" prompt
    pub goodbye: Option<PathBuf>,
}

/// Uplink settings
#[derive(Debug, Default, Deserialize)]
pub struct UplinkFileConfig {
    /// Codec for outgoing audio ("flac" or "pcm")
    pub codec: Option<UplinkCodec>,

    /// Byte order for raw PCM records ("little" or "big")
    pub byte_order: Option<ByteOrder>,

    /// WAV file providing the keep-alive silence template
    pub silence_wav: Option<PathBuf>,
}

/// Pass-through options for the local ASR engine
#[derive(Debug, Default, Deserialize)]
pub struct AsrFileConfig {
    /// Each `key = "value"` entry becomes a `-key value` argument pair,
    /// in sorted key order
    pub options: Option<BTreeMap<String, String>>,
}

impl DialogConfigFile {
    /// Overlay the file's values onto `config`, leaving absent fields alone
    pub fn apply(self, config: &mut DialogConfig) {
        if let Some(device) = self.audio.device {
            config.device = Some(device);
        }
        if let Some(rate) = self.audio.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(ms) = self.audio.tick_interval_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(keyword) = self.dialog.keyword {
            config.keyword = keyword;
        }
        if let Some(lang) = self.dialog.lang {
            config.lang = lang;
        }
        if let Some(script) = self.paths.command_processor {
            config.command_processor = script;
        }
        if let Some(recording) = self.paths.recording {
            config.recording_path = recording;
        }
        if let Some(encoded) = self.paths.encoded {
            config.encoded_path = encoded;
        }
        if let Some(please_say) = self.prompts.please_say {
            config.prompts.please_say = please_say;
        }
        if let Some(processing) = self.prompts.processing {
            config.prompts.processing = processing;
        }
        if let Some(goodbye) = self.prompts.goodbye {
            config.prompts.goodbye = goodbye;
        }
        if let Some(codec) = self.uplink.codec {
            config.uplink.codec = codec;
        }
        if let Some(byte_order) = self.uplink.byte_order {
            config.uplink.byte_order = byte_order;
        }
        if let Some(silence) = self.uplink.silence_wav {
            config.uplink.silence_wav = Some(silence);
        }
        if let Some(options) = self.asr.options {
            config.asr_options = options.into_iter().collect();
        }
    }
}

/// Read an explicitly named overlay file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_overlay(path: &Path) -> Result<DialogConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

/// Load the overlay from the default path, tolerating absence and errors
///
/// Returns `DialogConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_default(path: &Path) -> DialogConfigFile {
    if !path.exists() {
        return DialogConfigFile::default();
    }

    match read_overlay(path) {
        Ok(overlay) => overlay,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            DialogConfigFile::default()
        }
    }
}
