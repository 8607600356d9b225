//! `MovingAverage`: a leaky integrator, `y[n] = alpha*x[n] + (1-alpha)*y[n-1]`,
//! applied independently per channel.

use crate::common::{BitDepth, ChannelCount, SampleRate};
use crate::decoder::Stage;

pub struct MovingAverage {
    downstream: Box<dyn Stage>,
    alpha: f64,
    last: Vec<i64>,
}

impl MovingAverage {
    pub fn new(downstream: Box<dyn Stage>, alpha: f64) -> Self {
        let channels = downstream.channels() as usize;
        Self {
            downstream,
            alpha: alpha.clamp(0.0, 1.0),
            last: vec![0; channels.max(1)],
        }
    }
}

fn read_signed(bytes: &[u8], bits: BitDepth) -> i64 {
    match bits {
        8 => bytes[0] as i64 - 128,
        16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i64,
        32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        _ => unreachable!("bits already validated upstream"),
    }
}

fn write_signed(out: &mut [u8], bits: BitDepth, value: i64) {
    match bits {
        8 => out[0] = (value.clamp(-128, 127) + 128) as u8,
        16 => out[..2].copy_from_slice(&(value.clamp(i16::MIN as i64, i16::MAX as i64) as i16).to_le_bytes()),
        32 => out[..4].copy_from_slice(&(value.clamp(i32::MIN as i64, i32::MAX as i64) as i32).to_le_bytes()),
        _ => unreachable!(),
    }
}

impl Stage for MovingAverage {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        if position_bytes == 0 {
            self.last.iter_mut().for_each(|v| *v = 0);
        }

        let n = self.downstream.read_samples(buf, position_bytes, max_bytes);
        let bits = self.downstream.bits_per_sample();
        let channels = self.downstream.channels() as usize;
        let sample_bytes = bits as usize / 8;
        let frame_bytes = sample_bytes * channels;
        if frame_bytes == 0 {
            return n;
        }

        let mut off = 0;
        while off + frame_bytes <= n {
            for (c, last) in self.last.iter_mut().enumerate() {
                let s_off = off + c * sample_bytes;
                let sample = read_signed(&buf[s_off..], bits);
                let filtered = (self.alpha * sample as f64 + (1.0 - self.alpha) * *last as f64).round() as i64;
                *last = filtered;
                write_signed(&mut buf[s_off..], bits, filtered);
            }
            off += frame_bytes;
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
            alpha: self.alpha,
            last: self.last.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::stages::test_support::ConstantStage;

    #[test]
    fn smooths_a_step_toward_the_target() {
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend_from_slice(&10_000i16.to_le_bytes());
        }
        let base = ConstantStage::from_bytes(1, 44_100, 16, data);
        let mut stage = MovingAverage::new(Box::new(base), 0.5);
        let mut buf = vec![0u8; 10];
        let n = stage.read_samples(&mut buf, 0, 10);
        assert_eq!(n, 10);
        let first = i16::from_le_bytes([buf[0], buf[1]]);
        let last = i16::from_le_bytes([buf[8], buf[9]]);
        assert!(first < last);
        assert!(last <= 10_000);
    }

    #[test]
    fn zero_alpha_holds_at_zero() {
        let mut data = Vec::new();
        data.extend_from_slice(&10_000i16.to_le_bytes());
        let base = ConstantStage::from_bytes(1, 44_100, 16, data);
        let mut stage = MovingAverage::new(Box::new(base), 0.0);
        let mut buf = [0u8; 2];
        stage.read_samples(&mut buf, 0, 2);
        assert_eq!(i16::from_le_bytes(buf), 0);
    }
}
