//! Local speech recognition seam
//!
//! The capture loop talks to recognizers only through [`Recognizer`]:
//! utterance bracketing, per-frame feeding, a voice-activity flag, and a
//! hypothesis valid after the utterance ends. [`EnergyRecognizer`] is the
//! built-in implementation; a full decoder plugs in behind the same trait.

pub mod energy;

pub use energy::EnergyRecognizer;

use crate::Result;

/// Contract over the local ASR engine
pub trait Recognizer: Send {
    /// Begin a new utterance segment
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start a segment; the capture
    /// loop treats this as fatal.
    fn start_utterance(&mut self) -> Result<()>;

    /// End the current utterance segment, making the hypothesis available
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the segment end; the capture
    /// loop logs and continues.
    fn end_utterance(&mut self) -> Result<()>;

    /// Feed one frame of mono 16-bit samples
    ///
    /// # Errors
    ///
    /// Returns an error on an engine fault; the capture loop logs and
    /// continues.
    fn process_frame(&mut self, samples: &[i16]) -> Result<()>;

    /// Whether the engine currently considers the input to be speech
    fn in_speech(&self) -> bool;

    /// Recognized text for the last completed utterance
    ///
    /// Valid only after `end_utterance`.
    fn hypothesis(&self) -> Option<String>;
}
