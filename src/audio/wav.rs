//! WAV fallback recording and templates

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::Result;

/// Writes the local fallback recording (mono, 16-bit PCM)
///
/// The RIFF file-size and data-size header fields are backpatched when the
/// writer is finalized, so a finalized file is always self-consistent.
pub struct WavWriter {
    inner: hound::WavWriter<BufWriter<File>>,
    data_bytes: usize,
}

impl WavWriter {
    /// Create the recording file and write its header
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        Ok(Self {
            inner: hound::WavWriter::create(path, spec)?,
            data_bytes: 0,
        })
    }

    /// Append samples to the data chunk
    ///
    /// # Errors
    ///
    /// Returns an error on write failure.
    pub fn write(&mut self, samples: &[i16]) -> Result<()> {
        for &sample in samples {
            self.inner.write_sample(sample)?;
        }
        self.data_bytes += samples.len() * 2;
        Ok(())
    }

    /// Total data bytes written so far
    #[must_use]
    pub fn data_bytes(&self) -> usize {
        self.data_bytes
    }

    /// Close the file, backpatching the RIFF size fields
    ///
    /// # Errors
    ///
    /// Returns an error if flushing the header fails.
    pub fn finalize(self) -> Result<()> {
        self.inner.finalize()?;
        Ok(())
    }
}

/// Load the keep-alive silence template
///
/// Reads samples from `path` when given; otherwise generates one second of
/// zeros at `sample_rate`.
///
/// # Errors
///
/// Returns an error if the given file cannot be read as WAV.
pub fn load_silence(path: Option<&Path>, sample_rate: u32) -> Result<Vec<i16>> {
    match path {
        Some(path) => {
            let mut reader = hound::WavReader::open(path)?;
            let samples = reader
                .samples::<i16>()
                .collect::<std::result::Result<Vec<_>, _>>()?;
            tracing::debug!(
                path = %path.display(),
                samples = samples.len(),
                "loaded silence template"
            );
            Ok(samples)
        }
        None => Ok(vec![0; sample_rate as usize]),
    }
}

/// 44-byte WAV-style header primed into the FLAC stream before any audio
///
/// The data-size field carries the fixed value the historical wire format
/// expects rather than a real length; receivers treat the leading samples as
/// preamble, not audio.
#[must_use]
pub fn stream_header_template(sample_rate: u32) -> [u8; 44] {
    const DATA_SIZE: u32 = 0x6d60;

    let byte_rate = sample_rate * 2;
    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(DATA_SIZE + 36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM format tag
    header[22..24].copy_from_slice(&1u16.to_le_bytes()); // mono
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&2u16.to_le_bytes()); // block align
    header[34..36].copy_from_slice(&16u16.to_le_bytes()); // bits per sample
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&DATA_SIZE.to_le_bytes());
    header
}
