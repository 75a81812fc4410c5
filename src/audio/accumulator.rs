//! # Audio Accumulator
//!
//! Buffers raw PCM16 audio arriving over the WebSocket and slices it into
//! fixed-size overlapping windows for transcription.
//!
//! ## Windowing:
//! - A **window** is a fixed duration of audio (default 4.0 s) handed to the
//!   transcriber in one call.
//! - The **step** (default 3.5 s) is how far the buffer advances between
//!   windows. Advancing by step rather than by the full window leaves a
//!   0.5 s overlap in place for the next window, which is what lets the
//!   merge step stitch boundary words together.
//!
//! The accumulator is owned by its connection's actor and only ever touched
//! from that actor's context, so no interior locking is needed.

use serde::{Deserialize, Serialize};

/// Bytes per PCM16 mono sample.
const BYTES_PER_SAMPLE: usize = 2;

/// Windowing parameters for the streaming transcription pipeline.
///
/// ## Derived sizes (defaults, 16 kHz mono 16-bit):
/// - window: 4.0 s × 16000 Hz × 2 B = 128000 bytes
/// - step:   3.5 s × 16000 Hz × 2 B = 112000 bytes
/// - overlap: window − step = 16000 bytes (0.5 s)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Sample rate of the inbound audio (16000 for Whisper-style models)
    pub sample_rate: u32,

    /// Window duration in seconds
    pub window_secs: f64,

    /// Step duration in seconds; must be strictly smaller than the window
    pub step_secs: f64,

    /// Audio shorter than this many seconds is not worth transcribing and
    /// yields an empty transcription instead of an error
    pub min_transcribe_secs: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            window_secs: 4.0,
            step_secs: 3.5,
            min_transcribe_secs: 1.0,
        }
    }
}

impl WindowConfig {
    /// Size of one transcription window in bytes.
    pub fn window_bytes(&self) -> usize {
        (self.sample_rate as f64 * self.window_secs) as usize * BYTES_PER_SAMPLE
    }

    /// Buffer advance between consecutive windows in bytes.
    pub fn step_bytes(&self) -> usize {
        (self.sample_rate as f64 * self.step_secs) as usize * BYTES_PER_SAMPLE
    }

    /// Smallest byte count worth submitting for transcription.
    pub fn min_transcribe_bytes(&self) -> usize {
        (self.sample_rate as f64 * self.min_transcribe_secs) as usize * BYTES_PER_SAMPLE
    }
}

/// Per-connection audio buffer with a recording on/off gate.
///
/// Two buffers are kept: the windowing buffer, drained by step as windows
/// are emitted, and the full recording, which accumulates every byte of the
/// take untouched so the saved WAV covers the whole answer rather than the
/// undrained tail.
pub struct AudioAccumulator {
    config: WindowConfig,

    /// Windowing buffer, drained by `step_bytes` per emitted window
    buffer: Vec<u8>,

    /// Complete recording of the current take
    recording_buffer: Vec<u8>,

    /// Whether audio frames are currently accepted
    recording: bool,
}

impl AudioAccumulator {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            buffer: Vec::new(),
            recording_buffer: Vec::new(),
            recording: false,
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Begin a new take. Both buffers are reset so nothing from a previous
    /// turn can leak into this one.
    pub fn start_recording(&mut self) {
        self.recording = true;
        self.buffer.clear();
        self.recording_buffer.clear();
    }

    /// Append inbound audio bytes. Frames arriving while not recording are
    /// dropped, mirroring the wire protocol's rule for binary frames.
    pub fn append(&mut self, data: &[u8]) {
        if !self.recording {
            return;
        }
        self.buffer.extend_from_slice(data);
        self.recording_buffer.extend_from_slice(data);
    }

    /// Pop the next full window, if one is buffered.
    ///
    /// The returned slice is `window_bytes` long but the buffer advances by
    /// only `step_bytes`, leaving the overlap region in place for the next
    /// window.
    pub fn next_window(&mut self) -> Option<Vec<u8>> {
        let window_bytes = self.config.window_bytes();
        if self.buffer.len() < window_bytes {
            return None;
        }
        let window = self.buffer[..window_bytes].to_vec();
        self.buffer.drain(..self.config.step_bytes());
        Some(window)
    }

    /// End the take: stop accepting audio and hand back the undrained
    /// remainder (for final-window transcription) plus the full recording
    /// (for the WAV artifact). Both buffers are left empty for the next turn.
    pub fn stop_recording(&mut self) -> (Vec<u8>, Vec<u8>) {
        self.recording = false;
        let remainder = std::mem::take(&mut self.buffer);
        let recording = std::mem::take(&mut self.recording_buffer);
        (remainder, recording)
    }

    /// Bytes currently held in the windowing buffer.
    pub fn buffered_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Total bytes captured in the current take.
    pub fn recorded_bytes(&self) -> usize {
        self.recording_buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_acc() -> AudioAccumulator {
        AudioAccumulator::new(WindowConfig::default())
    }

    #[test]
    fn test_window_and_step_byte_arithmetic() {
        let config = WindowConfig::default();
        assert_eq!(config.window_bytes(), 128_000);
        assert_eq!(config.step_bytes(), 112_000);
        assert_eq!(config.min_transcribe_bytes(), 32_000);
    }

    #[test]
    fn test_not_recording_drops_audio() {
        let mut acc = default_acc();
        acc.append(&[0u8; 1024]);
        assert_eq!(acc.buffered_bytes(), 0);
        assert_eq!(acc.recorded_bytes(), 0);
    }

    #[test]
    fn test_no_window_until_full() {
        let mut acc = default_acc();
        acc.start_recording();
        acc.append(&vec![0u8; 127_999]);
        assert!(acc.next_window().is_none());
        acc.append(&[0u8; 1]);
        assert!(acc.next_window().is_some());
    }

    #[test]
    fn test_window_plus_step_emits_two_windows_and_retains_rest() {
        let config = WindowConfig::default();
        let appended = config.window_bytes() + config.step_bytes(); // 240000
        let mut acc = AudioAccumulator::new(config.clone());
        acc.start_recording();
        acc.append(&vec![0u8; appended]);

        let mut windows = Vec::new();
        while let Some(w) = acc.next_window() {
            assert_eq!(w.len(), config.window_bytes());
            windows.push(w);
        }

        assert_eq!(windows.len(), 2);
        assert_eq!(acc.buffered_bytes(), appended - 2 * config.step_bytes());
    }

    #[test]
    fn test_step_advance_preserves_overlap() {
        let config = WindowConfig::default();
        let mut acc = AudioAccumulator::new(config.clone());
        acc.start_recording();

        // Distinct byte per position (mod 251) so overlap content is checkable.
        let data: Vec<u8> = (0..config.window_bytes() * 2)
            .map(|i| (i % 251) as u8)
            .collect();
        acc.append(&data);

        let first = acc.next_window().unwrap();
        let second = acc.next_window().unwrap();

        let overlap = config.window_bytes() - config.step_bytes();
        // Tail of the first window equals the head of the second.
        assert_eq!(first[config.step_bytes()..], second[..overlap]);
    }

    #[test]
    fn test_stop_returns_remainder_and_full_recording() {
        let config = WindowConfig::default();
        let total = config.window_bytes() + 5_000;
        let mut acc = AudioAccumulator::new(config.clone());
        acc.start_recording();
        acc.append(&vec![7u8; total]);

        assert!(acc.next_window().is_some());

        let (remainder, recording) = acc.stop_recording();
        assert_eq!(remainder.len(), total - config.step_bytes());
        assert_eq!(recording.len(), total);
        assert!(!acc.is_recording());
        assert_eq!(acc.buffered_bytes(), 0);
        assert_eq!(acc.recorded_bytes(), 0);
    }

    #[test]
    fn test_start_recording_resets_state() {
        let mut acc = default_acc();
        acc.start_recording();
        acc.append(&[1u8; 100]);
        acc.start_recording();
        assert_eq!(acc.buffered_bytes(), 0);
        assert_eq!(acc.recorded_bytes(), 0);
    }
}
