#![allow(dead_code)]
//! Synthetic WAV fixture generation shared by the integration tests.
//!
//! Lives under a subdirectory so cargo doesn't treat this file as its own
//! standalone test binary.

use std::f64::consts::PI;
use std::path::PathBuf;

pub const CHANNELS: u16 = 2;
pub const SAMPLE_RATE: u32 = 44_100;
pub const BITS_PER_SAMPLE: u16 = 16;
pub const DURATION_SECONDS: f64 = 1.0;
pub const FREQUENCY_HZ: f64 = 440.0;
pub const AMPLITUDE: i16 = 10_000;

/// Total PCM byte length of the canonical fixture: 1s @ 44.1kHz, 16-bit
/// stereo. `44100 * 2 channels * 2 bytes = 176400`.
pub const EXPECTED_DATA_SIZE: u64 = 176_400;

/// Builds one second of a 440Hz sine wave, interleaved stereo, 16-bit PCM.
pub fn sine_pcm_bytes() -> Vec<u8> {
    let frame_count = (SAMPLE_RATE as f64 * DURATION_SECONDS) as usize;
    let mut pcm = Vec::with_capacity(frame_count * CHANNELS as usize * 2);
    for n in 0..frame_count {
        let t = n as f64 / SAMPLE_RATE as f64;
        let sample = (AMPLITUDE as f64 * (2.0 * PI * FREQUENCY_HZ * t).sin()).round() as i16;
        for _ in 0..CHANNELS {
            pcm.extend_from_slice(&sample.to_le_bytes());
        }
    }
    pcm
}

fn wav_bytes_from_pcm(channels: u16, sample_rate: u32, bits: u16, pcm: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + pcm.len() as u32).to_le_bytes());
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
    bytes.extend_from_slice(&(pcm.len() as u32).to_le_bytes());
    bytes.extend_from_slice(pcm);
    bytes
}

/// Writes the canonical `sine_440_1s_16bit_stereo_44100.wav` fixture to a
/// uniquely-named temp path so parallel test runs don't collide, and
/// returns that path.
pub fn write_sine_wav(test_name: &str) -> PathBuf {
    let pcm = sine_pcm_bytes();
    let bytes = wav_bytes_from_pcm(CHANNELS, SAMPLE_RATE, BITS_PER_SAMPLE, &pcm);
    let path = std::env::temp_dir().join(format!(
        "jukebox_test_{}_{}_sine_440_1s_16bit_stereo_44100.wav",
        std::process::id(),
        test_name
    ));
    std::fs::write(&path, bytes).expect("failed to write temp WAV fixture");
    path
}
