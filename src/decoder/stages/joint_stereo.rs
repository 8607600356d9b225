//! `JointStereo`: averages left and right channels down to mono.

use crate::common::{BitDepth, ChannelCount, SampleRate};
use crate::decoder::Stage;

pub struct JointStereo {
    downstream: Box<dyn Stage>,
}

impl JointStereo {
    pub fn new(downstream: Box<dyn Stage>) -> Self {
        Self { downstream }
    }

    fn sample_bytes(&self) -> usize {
        self.downstream.bits_per_sample() as usize / 8
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

impl Stage for JointStereo {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        let sample_bytes = self.sample_bytes();
        let bits = self.downstream.bits_per_sample();
        let target_frame = sample_bytes; // mono: one sample per frame
        let downstream_frame = sample_bytes * 2; // stereo downstream
        if target_frame == 0 {
            return 0;
        }

        let frames_requested = max_bytes.min(buf.len()) / target_frame;
        let frame_index = position_bytes / target_frame as u64;
        let downstream_pos = frame_index * downstream_frame as u64;
        let downstream_max = frames_requested * downstream_frame;

        let mut scratch = vec![0u8; downstream_max];
        let got = self
            .downstream
            .read_samples(&mut scratch, downstream_pos, downstream_max);
        let frames_got = got / downstream_frame;

        for f in 0..frames_got {
            let off = f * downstream_frame;
            let left = read_signed(&scratch[off..], bits);
            let right = read_signed(&scratch[off + sample_bytes..], bits);
            let avg = (left + right) / 2;
            write_signed(&mut buf[f * target_frame..], bits, avg);
        }

        frames_got * target_frame
    }

    fn channels(&self) -> ChannelCount {
        1
    }

    fn sample_rate(&self) -> SampleRate {
        self.downstream.sample_rate()
    }

    fn bits_per_sample(&self) -> BitDepth {
        self.downstream.bits_per_sample()
    }

    fn data_size(&self) -> u64 {
        self.downstream.data_size() / 2
    }

    fn peel(self: Box<Self>) -> Box<dyn Stage> {
        self.downstream
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            downstream: self.downstream.clone_stage(),
        })
    }
}
