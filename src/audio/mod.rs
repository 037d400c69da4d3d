//! Audio device I/O, prompt playback, and WAV plumbing

pub mod frame;
pub mod playback;
pub mod wav;

pub use frame::{AudioFrameSource, CpalFrameSource, FRAME_SAMPLES};
pub use playback::{CpalPromptPlayer, PlaybackQueue, PromptPlayer};
pub use wav::{WavWriter, load_silence, stream_header_template};
