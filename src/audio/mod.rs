//! # Audio Handling
//!
//! Raw PCM16 byte handling for a live interview connection: the windowing
//! accumulator that feeds the transcription pipeline, and WAV encoding for
//! the full-session recording artifact.

pub mod accumulator;
pub mod wav;

pub use accumulator::{AudioAccumulator, WindowConfig};
pub use wav::write_pcm16_wav;
