//! L4: platform audio output via `cpal`.
//!
//! A [`CpalSink`] opens an output stream matching a [`Sound`](crate::sound::Sound)'s
//! exact format (channels, sample rate, bit depth) and exposes the
//! [`Sink`] contract the playback engine drives: `write` pushes freshly
//! decoded PCM chunks into a shared queue, the audio callback drains it at
//! the device's own pace. An underrun (the producer falling behind the
//! device) is filled with silence rather than surfaced as an error,
//! matching how real output devices behave when starved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::common::AudioFormat;
use crate::error::SinkError;

/// The fixed-size block the engine aims to hand the device per `write`,
/// independent of the producer's own pull chunk size (spec: "typical:
/// `frame_size * 1024 * 4`").
const PERIOD_FRAMES: usize = 1024 * 4;

/// The host audio output the playback engine drives.
///
/// Mirrors the abstract sink collaborator from the design notes: `open`,
/// `period_size`, `write`, `drop` (discard buffered audio), `drain` (block
/// until buffered audio has played), `close`. After `write` returns,
/// subsequent `write`s append in order; after `drop`, the next `write`
/// starts the device from silence.
pub trait Sink {
    /// The fixed block size, in bytes, this sink prefers per `write`.
    fn period_size(&self) -> usize;

    /// Queues `block` for playback. Returns the number of bytes accepted
    /// (always `block.len()` for this in-process queue).
    fn write(&self, block: &[u8]) -> Result<usize, SinkError>;

    /// Discards buffered but not-yet-played audio. The next `write` starts
    /// the device from silence.
    fn drop_buffered(&self);

    /// Blocks until all buffered audio has been consumed by the device.
    fn drain(&self);

    /// Closes the device. No further `write`s are accepted.
    fn close(&self);
}

pub struct CpalSink {
    _stream: cpal::Stream,
    queue: Arc<Mutex<VecDeque<u8>>>,
    format: AudioFormat,
}

impl CpalSink {
    pub fn open_default(format: AudioFormat) -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Open("no default output device".to_string()))?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let sample_format = match format.bits_per_sample {
            8 => SampleFormat::U8,
            16 => SampleFormat::I16,
            32 => SampleFormat::I32,
            other => {
                return Err(SinkError::Open(format!(
                    "unsupported bit depth for playback: {other}"
                )))
            }
        };

        let stream = build_stream(&device, &config, sample_format, queue.clone())
            .map_err(|e| SinkError::Open(e.to_string()))?;
        stream.play().map_err(|e| SinkError::Open(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            queue,
            format,
        })
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Sink for CpalSink {
    fn period_size(&self) -> usize {
        PERIOD_FRAMES * self.format.frame_size().max(1)
    }

    fn write(&self, block: &[u8]) -> Result<usize, SinkError> {
        self.lock_queue().extend(block.iter().copied());
        Ok(block.len())
    }

    fn drop_buffered(&self) {
        self.lock_queue().clear();
    }

    fn drain(&self) {
        loop {
            if self.lock_queue().is_empty() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn close(&self) {
        self.drop_buffered();
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    queue: Arc<Mutex<VecDeque<u8>>>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let err_fn = |err| {
        #[cfg(feature = "tracing")]
        tracing::error!("audio output stream error: {err}");
        #[cfg(not(feature = "tracing"))]
        eprintln!("audio output stream error: {err}");
    };

    macro_rules! build {
        ($t:ty, $silence:expr) => {
            device.build_output_stream(
                config,
                move |data: &mut [$t], _| {
                    let sample_bytes = std::mem::size_of::<$t>();
                    let mut raw = [0u8; 4];
                    let mut guard = queue
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner);
                    for sample in data.iter_mut() {
                        *sample = if guard.len() >= sample_bytes {
                            for slot in raw.iter_mut().take(sample_bytes) {
                                *slot = guard.pop_front().unwrap();
                            }
                            <$t>::from_ne_bytes(raw[..sample_bytes].try_into().unwrap())
                        } else {
                            $silence
                        };
                    }
                },
                err_fn,
                None,
            )
        };
    }

    match sample_format {
        SampleFormat::U8 => build!(u8, 128),
        SampleFormat::I16 => build!(i16, 0),
        SampleFormat::I32 => build!(i32, 0),
        _ => unreachable!("CpalSink::open_default only requests U8/I16/I32 configs"),
    }
}
