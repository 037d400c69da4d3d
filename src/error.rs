//! Error types for the hark dialog engine

use thiserror::Error;

/// Result type alias for dialog-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the dialog engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Recognizer error
    #[error("recognizer error: {0}")]
    Recognizer(String),

    /// FLAC encoder error
    #[error("encoder error: {0}")]
    Encoder(String),

    /// Streaming uplink error
    #[error("uplink error: {0}")]
    Uplink(String),

    /// Command dispatcher error (spawn or pipe failure)
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// The command script ran but produced no recognized command
    #[error("no command recognized")]
    NoCommand,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV read/write error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
