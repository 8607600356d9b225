//! `FadeOnStop`: a fade-to-silence the engine installs on top of a running
//! chain when a `Sound` is asked to stop gracefully. Unlike [`super::fade::Fade`],
//! the fade window and the stream's advertised length are both fixed at
//! construction time, anchored to the position playback was at when the
//! stop was requested.

use crate::common::{BitDepth, ChannelCount, SampleRate};
use crate::decoder::Stage;

pub struct FadeOnStop {
    downstream: Box<dyn Stage>,
    start_frame: u64,
    fade_frames: u64,
}

impl FadeOnStop {
    pub fn new(downstream: Box<dyn Stage>, start_position_bytes: u64, fade_frames: u64) -> Self {
        let frame_size = downstream.frame_size().max(1) as u64;
        Self {
            start_frame: start_position_bytes / frame_size,
            fade_frames: fade_frames.max(1),
            downstream,
        }
    }

    fn end_frame(&self) -> u64 {
        self.start_frame + self.fade_frames
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

impl Stage for FadeOnStop {
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        let n = self.downstream.read_samples(buf, position_bytes, max_bytes);
        let bits = self.downstream.bits_per_sample();
        let channels = self.downstream.channels() as usize;
        let sample_bytes = bits as usize / 8;
        let frame_bytes = sample_bytes * channels;
        if frame_bytes == 0 {
            return n;
        }

        let start_frame = position_bytes / frame_bytes as u64;
        let mut off = 0;
        let mut frame = start_frame;
        while off + frame_bytes <= n {
            let gain = if frame < self.start_frame {
                1.0
            } else if frame >= self.end_frame() {
                0.0
            } else {
                1.0 - (frame - self.start_frame) as f64 / self.fade_frames as f64
            };

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
        let frame_size = self.frame_size().max(1) as u64;
        let truncated = self.end_frame() * frame_size;
        self.downstream.data_size().min(truncated)
    }

    fn peel(self: Box<Self>) -> Box<dyn Stage> {
        self.downstream
    }

    fn clone_stage(&self) -> Box<dyn Stage> {
        Box::new(Self {
            downstream: self.downstream.clone_stage(),
            start_frame: self.start_frame,
            fade_frames: self.fade_frames,
        })
    }
}
