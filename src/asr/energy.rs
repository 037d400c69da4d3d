//! Energy-gated voice activity and keyword stand-in
//!
//! An RMS energy gate with hang-over smoothing. Enough to drive the dialog
//! machine on clean close-mic audio and to run the engine without an
//! external decoder: the hypothesis reports the configured keyword whenever
//! the utterance contained a sustained voiced run.

use crate::Result;

use super::Recognizer;

/// RMS threshold above which a frame counts as voiced
pub const ENERGY_THRESHOLD: f32 = 0.03;

/// Consecutive voiced frames required to enter speech
const SPEECH_FRAMES: usize = 2;

/// Consecutive quiet frames required to leave speech (hang-over)
const HANGOVER_FRAMES: usize = 8;

/// Voiced frames an utterance needs before the keyword hypothesis is reported
const MIN_KEYWORD_FRAMES: usize = 5;

/// Energy-based [`Recognizer`] implementation
pub struct EnergyRecognizer {
    keyword: String,
    threshold: f32,
    in_speech: bool,
    voiced_run: usize,
    quiet_run: usize,
    voiced_in_utterance: usize,
    hypothesis: Option<String>,
}

impl EnergyRecognizer {
    /// Create a recognizer reporting `keyword` with the default threshold
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Self {
        Self::with_threshold(keyword, ENERGY_THRESHOLD)
    }

    /// Apply `-key value` style engine options, keeping the ones this
    /// recognizer understands
    ///
    /// Supported: `-threshold <rms>`. Unknown keys are logged and skipped so
    /// configurations written for a fuller decoder still load.
    #[must_use]
    pub fn with_options(mut self, args: &[String]) -> Self {
        for pair in args.chunks(2) {
            let [key, value] = pair else { continue };
            match key.as_str() {
                "-threshold" => match value.parse() {
                    Ok(threshold) => self.threshold = threshold,
                    Err(_) => {
                        tracing::warn!(value = %value, "ignoring unparsable threshold option");
                    }
                },
                other => {
                    tracing::debug!(option = other, "ignoring unsupported recognizer option");
                }
            }
        }
        self
    }

    /// Create a recognizer with an explicit RMS threshold
    #[must_use]
    pub fn with_threshold(keyword: impl Into<String>, threshold: f32) -> Self {
        Self {
            keyword: keyword.into(),
            threshold,
            in_speech: false,
            voiced_run: 0,
            quiet_run: 0,
            voiced_in_utterance: 0,
            hypothesis: None,
        }
    }
}

impl Recognizer for EnergyRecognizer {
    fn start_utterance(&mut self) -> Result<()> {
        self.in_speech = false;
        self.voiced_run = 0;
        self.quiet_run = 0;
        self.voiced_in_utterance = 0;
        self.hypothesis = None;
        Ok(())
    }

    fn end_utterance(&mut self) -> Result<()> {
        self.hypothesis = (self.voiced_in_utterance >= MIN_KEYWORD_FRAMES)
            .then(|| self.keyword.clone());
        self.in_speech = false;
        Ok(())
    }

    fn process_frame(&mut self, samples: &[i16]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let energy = rms(samples);
        if energy > self.threshold {
            self.voiced_run += 1;
            self.quiet_run = 0;
            if !self.in_speech && self.voiced_run >= SPEECH_FRAMES {
                self.in_speech = true;
                tracing::trace!(energy, "speech started");
            }
            if self.in_speech {
                self.voiced_in_utterance += 1;
            }
        } else {
            self.quiet_run += 1;
            self.voiced_run = 0;
            if self.in_speech && self.quiet_run >= HANGOVER_FRAMES {
                self.in_speech = false;
                tracing::trace!("speech ended");
            }
        }
        Ok(())
    }

    fn in_speech(&self) -> bool {
        self.in_speech
    }

    fn hypothesis(&self) -> Option<String> {
        self.hypothesis.clone()
    }
}

/// RMS energy of a frame, normalized to [0, 1]
fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum_squares / samples.len() as f32;
    mean.sqrt()
}
