//! Streaming FLAC encoder with deferred header delivery
//!
//! Wraps block-level flacenc encoding in the state machine the uplink
//! needs: `init` arms the encoder and captures the container header into a
//! bounded buffer, `begin_stream` primes the stream with a synthetic
//! WAV-style preamble, and `encode` emits complete FLAC frames, flushing
//! the captured header exactly once, immediately before the first frame.
//! `finish` flushes any partial final block and disarms; `reset` discards
//! everything so a fresh session starts with fresh header capture.

use flacenc::component::BitRepr;
use flacenc::error::Verify;
use flacenc::source::Fill;

use crate::audio::stream_header_template;
use crate::{Error, Result};

/// Samples per encoded FLAC frame
const BLOCK_SAMPLES: usize = 1152;

/// Upper bound on captured container header bytes
const HEADER_MAX: usize = 4096;

/// Stateful PCM→FLAC encoder for one logical stream at a time
pub struct FlacEncoder {
    sample_rate: u32,
    channels: u16,
    config: flacenc::config::Encoder,
    stream: Option<flacenc::component::Stream>,
    header: Vec<u8>,
    header_sent: bool,
    pending: Vec<i32>,
    frame_number: usize,
}

impl FlacEncoder {
    /// Create an unarmed encoder for mono or multi-channel 16-bit input
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let mut config = flacenc::config::Encoder::default();
        config.block_size = BLOCK_SAMPLES;
        Self {
            sample_rate,
            channels,
            config,
            stream: None,
            header: Vec::new(),
            header_sent: false,
            pending: Vec::new(),
            frame_number: 0,
        }
    }

    /// Whether the encoder is armed for a stream
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.stream.is_some()
    }

    /// Arm the encoder: fix parameters and capture the container header
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoder` if the parameters are rejected or the
    /// captured header exceeds its bound.
    pub fn init(&mut self) -> Result<()> {
        self.reset();

        let stream = flacenc::component::Stream::new(
            self.sample_rate as usize,
            usize::from(self.channels),
            16,
        )
        .map_err(|_| Error::Encoder("invalid stream parameters".to_string()))?;

        let mut sink = flacenc::bitsink::ByteSink::new();
        stream
            .write(&mut sink)
            .map_err(|_| Error::Encoder("failed to serialize stream header".to_string()))?;

        let header = sink.as_slice();
        if header.len() > HEADER_MAX {
            return Err(Error::Encoder(format!(
                "container header too large: {} bytes",
                header.len()
            )));
        }
        self.header.extend_from_slice(header);
        self.stream = Some(stream);

        tracing::debug!(
            header_bytes = self.header.len(),
            sample_rate = self.sample_rate,
            "flac encoder armed"
        );
        Ok(())
    }

    /// Prime the stream with the synthetic WAV-style preamble
    ///
    /// The template bytes enter the encoder as samples; they ride out with
    /// the first full block of real audio.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoder` if the encoder is not armed.
    pub fn begin_stream(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::Encoder("begin_stream on unarmed encoder".to_string()));
        }
        let template = stream_header_template(self.sample_rate);
        self.pending.extend(
            template
                .chunks_exact(2)
                .map(|pair| i32::from(i16::from_le_bytes([pair[0], pair[1]]))),
        );
        Ok(())
    }

    /// Encode samples, returning the chunks to deliver in order
    ///
    /// The first chunk ever returned is the captured container header;
    /// afterwards each chunk is one FLAC frame. Samples short of a full
    /// block are held until one exists. On an unarmed encoder the samples
    /// are dropped with a debug log.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoder` if a block fails to encode.
    pub fn encode(&mut self, samples: &[i16]) -> Result<Vec<Vec<u8>>> {
        if self.stream.is_none() {
            tracing::debug!(samples = samples.len(), "encoder not armed, dropping audio");
            return Ok(Vec::new());
        }

        self.pending.extend(samples.iter().map(|&s| i32::from(s)));

        let mut out = Vec::new();
        while self.pending.len() >= BLOCK_SAMPLES * usize::from(self.channels) {
            let block: Vec<i32> = self
                .pending
                .drain(..BLOCK_SAMPLES * usize::from(self.channels))
                .collect();
            let frame = self.encode_block(&block, BLOCK_SAMPLES)?;
            self.push_with_header(&mut out, frame);
        }
        Ok(out)
    }

    /// Flush any partial final block and disarm
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoder` if the final block fails to encode.
    pub fn finish(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut out = Vec::new();
        if self.stream.is_some() && !self.pending.is_empty() {
            let block: Vec<i32> = self.pending.drain(..).collect();
            let block_size = block.len() / usize::from(self.channels);
            let frame = self.encode_block(&block, block_size)?;
            self.push_with_header(&mut out, frame);
        }
        self.reset();
        Ok(out)
    }

    /// Discard all stream state, returning to unarmed
    pub fn reset(&mut self) {
        self.stream = None;
        self.header.clear();
        self.header_sent = false;
        self.pending.clear();
        self.frame_number = 0;
    }

    fn push_with_header(&mut self, out: &mut Vec<Vec<u8>>, frame: Vec<u8>) {
        if !self.header_sent {
            out.push(std::mem::take(&mut self.header));
            self.header_sent = true;
        }
        out.push(frame);
    }

    fn encode_block(&mut self, block: &[i32], block_size: usize) -> Result<Vec<u8>> {
        let Some(stream) = self.stream.as_ref() else {
            return Err(Error::Encoder("encode on unarmed encoder".to_string()));
        };

        let verified = self
            .config
            .clone()
            .into_verified()
            .map_err(|_| Error::Encoder("invalid encoder configuration".to_string()))?;

        let mut framebuf =
            flacenc::source::FrameBuf::with_size(usize::from(self.channels), block_size)
                .map_err(|_| Error::Encoder("failed to allocate frame buffer".to_string()))?;
        framebuf
            .fill_interleaved(block)
            .map_err(|_| Error::Encoder("failed to fill frame buffer".to_string()))?;

        let frame = flacenc::encode_fixed_size_frame(
            &verified,
            &framebuf,
            self.frame_number,
            stream.stream_info(),
        )
        .map_err(|_| Error::Encoder("failed to encode frame".to_string()))?;

        let mut sink = flacenc::bitsink::ByteSink::new();
        frame
            .write(&mut sink)
            .map_err(|_| Error::Encoder("failed to serialize frame".to_string()))?;

        self.frame_number += 1;
        Ok(sink.as_slice().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<i16> {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| ((i % 200) as i16 - 100) * 50).collect()
    }

    fn armed_encoder() -> FlacEncoder {
        let mut enc = FlacEncoder::new(16_000, 1);
        enc.init().expect("init");
        enc.begin_stream().expect("begin_stream");
        enc
    }

    #[test]
    fn unarmed_encoder_drops_samples() {
        let mut enc = FlacEncoder::new(16_000, 1);
        let out = enc.encode(&ramp(4096)).expect("encode");
        assert!(out.is_empty());
        assert!(!enc.is_armed());
    }

    #[test]
    fn header_is_emitted_once_before_first_frame() {
        let mut enc = armed_encoder();

        // below one block (22 preamble samples are already pending)
        let out = enc.encode(&ramp(512)).expect("encode");
        assert!(out.is_empty(), "no output before a full block exists");

        // crosses the block boundary: header then first frame
        let out = enc.encode(&ramp(1024)).expect("encode");
        assert!(out.len() >= 2);
        assert_eq!(&out[0][..4], b"fLaC");

        // later output never repeats the header
        let out = enc.encode(&ramp(4096)).expect("encode");
        assert!(!out.is_empty());
        for chunk in &out {
            assert_ne!(&chunk[..4.min(chunk.len())], b"fLaC");
        }
    }

    #[test]
    fn finish_flushes_partial_block_and_disarms() {
        let mut enc = armed_encoder();
        let out = enc.encode(&ramp(2048)).expect("encode");
        assert!(!out.is_empty());

        let out = enc.encode(&ramp(100)).expect("encode");
        assert!(out.is_empty(), "partial block is held");

        let out = enc.finish().expect("finish");
        assert_eq!(out.len(), 1, "one final short frame");
        assert!(!enc.is_armed());
    }

    #[test]
    fn finish_without_audio_emits_nothing() {
        let mut enc = FlacEncoder::new(16_000, 1);
        enc.init().expect("init");
        let out = enc.finish().expect("finish");
        assert!(out.is_empty(), "no header without a first audio block");
    }

    #[test]
    fn rearming_restarts_header_capture() {
        let mut enc = armed_encoder();
        let out = enc.encode(&ramp(2048)).expect("encode");
        assert_eq!(&out[0][..4], b"fLaC");

        enc.reset();
        assert!(!enc.is_armed());

        enc.init().expect("re-init");
        enc.begin_stream().expect("begin_stream");
        let out = enc.encode(&ramp(2048)).expect("encode");
        assert_eq!(&out[0][..4], b"fLaC", "fresh stream re-sends its header");
    }

    #[test]
    fn begin_stream_requires_an_armed_encoder() {
        let mut enc = FlacEncoder::new(16_000, 1);
        assert!(enc.begin_stream().is_err());
    }
}
