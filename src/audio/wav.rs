//! # WAV Encoding
//!
//! Writes the full-session PCM16 recording to a mono 16 kHz WAV file so the
//! raw take survives as an artifact alongside the transcript.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;

/// Encode raw little-endian PCM16 bytes as a mono WAV file.
///
/// The byte count must be even; a trailing half-sample means the stream was
/// corrupted somewhere upstream and is rejected rather than truncated
/// silently.
pub fn write_pcm16_wav(path: &Path, pcm: &[u8], sample_rate: u32) -> Result<()> {
    if pcm.len() % 2 != 0 {
        anyhow::bail!("PCM data length must be even for 16-bit samples");
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create WAV file at {}", path.display()))?;

    let mut cursor = Cursor::new(pcm);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        writer.write_sample(sample)?;
    }

    writer.finalize().context("failed to finalize WAV file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");

        let samples: Vec<i16> = (0..1600).map(|i| (i % 100) as i16 * 50).collect();
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        write_pcm16_wav(&path, &pcm, 16000).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_rejects_odd_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        assert!(write_pcm16_wav(&path, &[0u8; 3], 16000).is_err());
    }
}
