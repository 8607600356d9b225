//! WAV container parsing.
//!
//! Only the canonical RIFF/WAVE chunk order is accepted: a `fmt ` chunk
//! immediately followed by a `data` chunk, PCM only (`audioFormat == 1`).
//! Any deviation is a `MalformedHeader`. Data larger than
//! [`super::WAV_MAX_DATA_SIZE`] bytes is rejected as probably-bogus
//! (`TooLarge`).

use std::fs::File;
use std::io::Read;

use crate::common::AudioFormat;
use crate::container::{read_whole_file, Container, InMemorySource, WAV_MAX_DATA_SIZE};
use crate::decoder::Stage;
use crate::error::ContainerError;

pub struct WavContainer {
    source: std::sync::Arc<InMemorySource>,
    header_end: u64,
    format: AudioFormat,
}

impl WavContainer {
    pub fn open(mut file: File) -> Result<Self, ContainerError> {
        let bytes = read_whole_file(&mut file)?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let (format, header_end) = parse_header(&bytes)?;
        Ok(Self {
            source: std::sync::Arc::new(InMemorySource::new(bytes)),
            header_end,
            format,
        })
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes
        .get(at..at + 4)
        .map(|s| u32::from_le_bytes(s.try_into().unwrap()))
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes
        .get(at..at + 2)
        .map(|s| u16::from_le_bytes(s.try_into().unwrap()))
}

/// Returns `(format, header_end_byte_offset)`.
fn parse_header(bytes: &[u8]) -> Result<(AudioFormat, u64), ContainerError> {
    let malformed = |msg: &str| ContainerError::MalformedHeader(msg.to_string());

    if bytes.len() < 44 {
        return Err(malformed("file too small for a RIFF/WAVE header"));
    }
    if &bytes[0..4] != b"RIFF" {
        return Err(malformed("missing RIFF chunk id"));
    }
    if &bytes[8..12] != b"WAVE" {
        return Err(malformed("missing WAVE format id"));
    }
    if &bytes[12..16] != b"fmt " {
        return Err(malformed("expected 'fmt ' chunk immediately after WAVE id"));
    }

    let fmt_size = read_u32(bytes, 16).ok_or_else(|| malformed("truncated fmt chunk size"))? as usize;
    if fmt_size < 16 {
        return Err(malformed("fmt chunk smaller than 16 bytes"));
    }

    let fmt_start = 20;
    let audio_format =
        read_u16(bytes, fmt_start).ok_or_else(|| malformed("truncated audioFormat field"))?;
    if audio_format != 1 {
        return Err(malformed("only PCM (audioFormat == 1) WAV files are supported"));
    }
    let channels = read_u16(bytes, fmt_start + 2).ok_or_else(|| malformed("truncated channels"))?;
    let sample_rate =
        read_u32(bytes, fmt_start + 4).ok_or_else(|| malformed("truncated sampleRate"))?;
    let bits_per_sample =
        read_u16(bytes, fmt_start + 14).ok_or_else(|| malformed("truncated bitsPerSample"))?;

    if channels == 0 {
        return Err(malformed("channel count is zero"));
    }
    if sample_rate == 0 {
        return Err(malformed("sample rate is zero"));
    }
    if bits_per_sample != 8 && bits_per_sample != 16 && bits_per_sample != 32 {
        return Err(malformed("bitsPerSample must be 8, 16 or 32"));
    }

    let data_chunk_start = 20 + fmt_size;
    if bytes.len() < data_chunk_start + 8 {
        return Err(malformed("truncated data chunk header"));
    }
    if &bytes[data_chunk_start..data_chunk_start + 4] != b"data" {
        return Err(malformed(
            "expected 'data' chunk immediately after fmt chunk",
        ));
    }
    let data_size = read_u32(bytes, data_chunk_start + 4)
        .ok_or_else(|| malformed("truncated data chunk size"))? as u64;

    if data_size > WAV_MAX_DATA_SIZE {
        return Err(ContainerError::TooLarge {
            actual: data_size,
            limit: WAV_MAX_DATA_SIZE,
        });
    }

    let header_end = (data_chunk_start + 8) as u64;
    let available = (bytes.len() as u64).saturating_sub(header_end);
    let data_size = data_size.min(available);

    Ok((
        AudioFormat {
            channels,
            sample_rate,
            bits_per_sample,
            data_size,
        },
        header_end,
    ))
}

impl Container for WavContainer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn trunc_at(&mut self, byte_position: u64) {
        self.format.data_size = self.format.data_size.min(byte_position);
    }

    fn make_decoder(&self) -> Result<Box<dyn Stage>, ContainerError> {
        Ok(Box::new(crate::decoder::base::pcm::PcmBaseDecoder::new(
            self.source.clone(),
            self.header_end,
            self.format,
        )))
    }

    fn try_clone(&self) -> Result<Box<dyn Container>, ContainerError> {
        // The in-memory buffer is immutable and reference counted; cloning
        // the container is just cloning the Arc and the parsed header.
        Ok(Box::new(WavContainer {
            source: self.source.clone(),
            header_end: self.header_end,
            format: self.format,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav(channels: u16, sample_rate: u32, bits: u16, data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        let byte_rate = sample_rate * channels as u32 * (bits as u32 / 8);
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        let block_align = channels * (bits / 8);
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn parses_canonical_header() {
        let data = vec![0u8; 176_400];
        let bytes = make_wav(2, 44_100, 16, &data);
        let container = WavContainer::from_bytes(bytes).unwrap();
        let fmt = container.format();
        assert_eq!(fmt.channels, 2);
        assert_eq!(fmt.sample_rate, 44_100);
        assert_eq!(fmt.bits_per_sample, 16);
        assert_eq!(fmt.data_size, 176_400);
        approx::assert_relative_eq!(fmt.duration_secs(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_pcm_format() {
        let mut bytes = make_wav(2, 44_100, 16, &[0; 4]);
        bytes[20] = 3; // audioFormat = 3 (IEEE float)
        bytes[21] = 0;
        assert!(matches!(
            WavContainer::from_bytes(bytes),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_chunk_out_of_order() {
        let mut bytes = make_wav(1, 8_000, 8, &[0; 4]);
        bytes[12..16].copy_from_slice(b"JUNK");
        assert!(matches!(
            WavContainer::from_bytes(bytes),
            Err(ContainerError::MalformedHeader(_))
        ));
    }

    #[test]
    fn rejects_oversized_data() {
        let mut bytes = make_wav(1, 44_100, 16, &[]);
        // lie about the data chunk size without actually providing the bytes
        let data_chunk_start = 20 + 16;
        bytes[data_chunk_start + 4..data_chunk_start + 8]
            .copy_from_slice(&(WAV_MAX_DATA_SIZE + 1).to_le_bytes()[..4]);
        assert!(matches!(
            WavContainer::from_bytes(bytes),
            Err(ContainerError::TooLarge { .. })
        ));
    }
}
