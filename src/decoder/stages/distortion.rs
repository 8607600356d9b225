//! `Distortion`: soft-clips via `tanh(gain*x)/tanh(gain)` around the
//! silence level.

use crate::common::{BitDepth, ChannelCount, SampleRate};
use crate::decoder::Stage;

fn max_amplitude(bits: BitDepth) -> f64 {
    match bits {
        8 => 127.0,
        16 => i16::MAX as f64,
        32 => i32::MAX as f64,
        _ => unreachable!("bits already validated upstream"),
    }
}

pub struct Distortion {
    downstream: Box<dyn Stage>,
    gain: f64,
}

impl Distortion {
    pub fn new(downstream: Box<dyn Stage>, gain: f64) -> Self {
        debug_assert!(gain > 0.0, "distortion gain must be positive");
        Self { downstream, gain }
    }
}

impl Stage for Distortion {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        let n = self.downstream.read_samples(buf, position_bytes, max_bytes);
        let bits = self.downstream.bits_per_sample();
        let sample_bytes = bits as usize / 8;
        let silence = self.downstream.silence_level();
        let max_amp = max_amplitude(bits);
        let norm = self.gain.tanh();
        if norm == 0.0 {
            return n;
        }

        let mut off = 0;
        while off + sample_bytes <= n {
            let raw = read_raw(&buf[off..off + sample_bytes], bits);
            let centered = raw - silence;
            let x = centered as f64 / max_amp;
            let shaped = (self.gain * x).tanh() / norm;
            let out = (shaped * max_amp).round() as i64 + silence;
            write_raw(&mut buf[off..off + sample_bytes], bits, out, max_amp as i64, silence);
            off += sample_bytes;
        }
        n
    }

    fn channels(&self) -> ChannelCount {
        self.downstream.channels()
    }

    fn sample_rate(&self) -> SampleRate {
        self.downstream.sample_rate()
    }

    fn bits_per_sample(&self) -> BitDepth {
        self.downstream.bits_per_sample()
    }

    fn data_size(&self) -> u64 {
        self.downstream.data_size()
    }

    fn peel(self: Box<Self>) -> Box<dyn Stage> {
        self.downstream
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            downstream: self.downstream.clone_stage(),
            gain: self.gain,
        })
    }
}

fn read_raw(bytes: &[u8], bits: BitDepth) -> i64 {
    match bits {
        8 => bytes[0] as i64,
        16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        _ => unreachable!(),
    }
}

fn write_raw(out: &mut [u8], bits: BitDepth, value: i64, max_amp: i64, silence: i64) {
    let lo = silence - max_amp;
    let hi = silence + max_amp;
    let clamped = value.clamp(lo, hi);
    match bits {
        8 => out[0] = clamped as u8,
        16 => out[..2].copy_from_slice(&(clamped as i16).to_le_bytes()),
        32 => out[..4].copy_from_slice(&(clamped as i32).to_le_bytes()),
        _ => unreachable!(),
    }
}
