//! `Fade`: linear gain ramp applied at the start and/or end of a stream.
//!
//! Both ramps live on the same stage since they can overlap on very short
//! streams; the effective gain at any frame is the product of whichever
//! ramps are active there.

use crate::common::{BitDepth, ChannelCount, SampleRate};
use crate::decoder::Stage;

pub struct Fade {
    downstream: Box<dyn Stage>,
    fade_in_frames: u64,
    fade_out_frames: u64,
}

impl Fade {
    /// `fade_in_frames`/`fade_out_frames` of 0 disable that ramp.
    pub fn new(downstream: Box<dyn Stage>, fade_in_frames: u64, fade_out_frames: u64) -> Self {
        Self {
            downstream,
            fade_in_frames,
            fade_out_frames,
        }
    }

    fn gain_at(&self, frame_index: u64, total_frames: u64) -> f64 {
        let in_gain = if self.fade_in_frames == 0 || frame_index >= self.fade_in_frames {
            1.0
        } else {
            frame_index as f64 / self.fade_in_frames as f64
        };

        let out_gain = if self.fade_out_frames == 0 {
            1.0
        } else {
            let fade_start = total_frames.saturating_sub(self.fade_out_frames);
            if frame_index < fade_start {
                1.0
            } else {
                let elapsed = frame_index - fade_start;
                (1.0 - elapsed as f64 / self.fade_out_frames as f64).max(0.0)
            }
        };

        in_gain * out_gain
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

impl Stage for Fade {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        let n = self.downstream.read_samples(buf, position_bytes, max_bytes);
        let bits = self.downstream.bits_per_sample();
        let channels = self.downstream.channels() as usize;
        let sample_bytes = bits as usize / 8;
        let frame_bytes = sample_bytes * channels;
        if frame_bytes == 0 {
            return n;
        }

        let total_frames = self.downstream.data_size() / frame_bytes as u64;
        let start_frame = position_bytes / frame_bytes as u64;

        let mut off = 0;
        let mut frame = start_frame;
        while off + frame_bytes <= n {
            let gain = self.gain_at(frame, total_frames);
            if gain != 1.0 {
                for c in 0..channels {
                    let s_off = off + c * sample_bytes;
                    let sample = read_signed(&buf[s_off..], bits);
                    let scaled = (sample as f64 * gain).round() as i64;
                    write_signed(&mut buf[s_off..], bits, scaled);
                }
            }
            off += frame_bytes;
            frame += 1;
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
            fade_in_frames: self.fade_in_frames,
            fade_out_frames: self.fade_out_frames,
        })
    }
}
