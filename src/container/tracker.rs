//! MOD container: a self-contained ProTracker-format sequencer/mixer.
//!
//! No maintained pure-Rust MOD playback crate was available, so this module
//! renders the module to PCM itself instead of wrapping a third-party
//! decoder. It supports the common 4/6/8-channel ProTracker signatures and
//! only the `Fxx` (set speed/tempo) effect; other effect columns (vibrato,
//! portamento, arpeggio, volume slides) are parsed but not applied. That
//! covers straightforward modules correctly and renders the rest
//! recognizably, at reduced fidelity, which is where a from-scratch engine
//! started to exceed this crate's scope.

use std::fs::File;
use std::sync::Arc;

use crate::common::AudioFormat;
use crate::container::{read_whole_file, Container, InMemorySource};
use crate::decoder::base::pcm::PcmBaseDecoder;
use crate::decoder::Stage;
use crate::error::ContainerError;

const SAMPLE_RATE: u32 = 44_100;
const HEADER_LEN: usize = 20 + 31 * 30 + 1 + 1 + 128 + 4;
const ROWS_PER_PATTERN: usize = 64;

// Standard Amiga/ProTracker period table (finetune 0), covering three octaves.
const PERIOD_TABLE: [u16; 36] = [
    1712, 1616, 1525, 1440, 1357, 1281, 1209, 1141, 1077, 1017, 961, 907, 856, 808, 762, 720, 678,
    640, 604, 570, 538, 508, 480, 453, 427, 403, 380, 359, 339, 320, 302, 285, 269, 254, 240, 226,
];
const AMIGA_CLOCK: f64 = 7_093_789.2;

struct SampleDef {
    data: Vec<i8>,
    volume: u8,
    repeat_start: usize,
    repeat_len: usize,
}

struct ModFile {
    channels: usize,
    song_length: usize,
    order: Vec<u8>,
    patterns: Vec<u8>, // flat: pattern * (rows*channels*4) + row*channels*4 + channel*4
    samples: Vec<SampleDef>,
}

fn channel_count_for_signature(sig: &[u8; 4]) -> Option<usize> {
    match sig {
        b"M.K." | b"M!K!" | b"FLT4" | b"4CHN" => Some(4),
        b"6CHN" => Some(6),
        b"8CHN" | b"OCTA" => Some(8),
        _ => None,
    }
}

fn parse(bytes: &[u8]) -> Result<ModFile, ContainerError> {
    let malformed = |msg: &str| ContainerError::MalformedHeader(msg.to_string());

    if bytes.len() < HEADER_LEN {
        return Err(malformed("file too small for a MOD header"));
    }

    let mut sig = [0u8; 4];
    sig.copy_from_slice(&bytes[HEADER_LEN - 4..HEADER_LEN]);
    let channels =
        channel_count_for_signature(&sig).ok_or_else(|| malformed("unrecognized MOD signature"))?;

    let mut sample_headers = Vec::with_capacity(31);
    for i in 0..31 {
        let off = 20 + i * 30;
        let length_words = u16::from_be_bytes([bytes[off + 22], bytes[off + 23]]) as usize;
        let volume = bytes[off + 25].min(64);
        let repeat_offset_words = u16::from_be_bytes([bytes[off + 26], bytes[off + 27]]) as usize;
        let repeat_len_words = u16::from_be_bytes([bytes[off + 28], bytes[off + 29]]) as usize;
        sample_headers.push((length_words * 2, volume, repeat_offset_words * 2, repeat_len_words * 2));
    }

    let song_length = bytes[950] as usize;
    let order_start = 952;
    let order: Vec<u8> = bytes[order_start..order_start + 128].to_vec();
    let num_patterns = order.iter().take(song_length.max(1)).copied().max().unwrap_or(0) as usize + 1;

    let pattern_bytes = num_patterns * ROWS_PER_PATTERN * channels * 4;
    let patterns_start = HEADER_LEN;
    if bytes.len() < patterns_start + pattern_bytes {
        return Err(malformed("truncated pattern data"));
    }
    let patterns = bytes[patterns_start..patterns_start + pattern_bytes].to_vec();

    let mut cursor = patterns_start + pattern_bytes;
    let mut samples = Vec::with_capacity(31);
    for (len, volume, repeat_start, repeat_len) in sample_headers {
        let end = (cursor + len).min(bytes.len());
        let data: Vec<i8> = bytes[cursor.min(bytes.len())..end]
            .iter()
            .map(|&b| b as i8)
            .collect();
        cursor += len;
        samples.push(SampleDef {
            data,
            volume,
            repeat_start,
            repeat_len,
        });
    }

    Ok(ModFile {
        channels,
        song_length,
        order,
        patterns,
        samples,
    })
}

struct ChannelState {
    sample: Option<usize>,
    period: u16,
    position: f64,
    volume: u8,
}

impl ChannelState {
    fn new() -> Self {
        Self {
            sample: None,
            period: 0,
            position: 0.0,
            volume: 0,
        }
    }
}

fn render(module: &ModFile) -> Vec<u8> {
    let mut channels: Vec<ChannelState> = (0..module.channels).map(|_| ChannelState::new()).collect();
    let mut speed: u32 = 6;
    let mut bpm: u32 = 125;
    let mut pcm = Vec::new();

    for &pattern_index in module.order.iter().take(module.song_length.max(1)) {
        let pattern_index = pattern_index as usize;
        let pattern_off = pattern_index * ROWS_PER_PATTERN * module.channels * 4;
        if pattern_off + ROWS_PER_PATTERN * module.channels * 4 > module.patterns.len() {
            continue;
        }

        for row in 0..ROWS_PER_PATTERN {
            let row_off = pattern_off + row * module.channels * 4;

            for (c, state) in channels.iter_mut().enumerate() {
                let cell_off = row_off + c * 4;
                let cell = &module.patterns[cell_off..cell_off + 4];
                let sample_number = (cell[0] & 0xF0) | (cell[2] >> 4);
                let period = (((cell[0] & 0x0F) as u16) << 8) | cell[1] as u16;
                let effect_cmd = cell[2] & 0x0F;
                let effect_param = cell[3];

                if sample_number != 0 {
                    let idx = sample_number as usize - 1;
                    if idx < module.samples.len() {
                        state.sample = Some(idx);
                        state.volume = module.samples[idx].volume;
                    }
                }
                if period != 0 {
                    state.period = period;
                    state.position = 0.0;
                }
                if effect_cmd == 0x0F {
                    if effect_param == 0 {
                        // ignored: stop is not a valid speed/tempo value
                    } else if effect_param < 32 {
                        speed = effect_param as u32;
                    } else {
                        bpm = effect_param as u32;
                    }
                }
            }

            let ticks_per_second = bpm as f64 * 2.0 / 5.0;
            let samples_per_tick = SAMPLE_RATE as f64 / ticks_per_second;
            let row_samples = (speed as f64 * samples_per_tick).round() as usize;

            for _ in 0..row_samples {
                let mut left = 0i32;
                let mut right = 0i32;

                for (c, state) in channels.iter_mut().enumerate() {
                    let Some(idx) = state.sample else { continue };
                    if state.period == 0 {
                        continue;
                    }
                    let def = &module.samples[idx];
                    if def.data.is_empty() {
                        continue;
                    }

                    let pos = state.position as usize;
                    if pos >= def.data.len() {
                        if def.repeat_len > 2 {
                            state.position -= (def.data.len() - def.repeat_start) as f64;
                        } else {
                            state.sample = None;
                            continue;
                        }
                    }
                    let pos = (state.position as usize).min(def.data.len() - 1);
                    let raw = def.data[pos] as i32;
                    let scaled = raw * state.volume as i32 / 64;

                    if c % 4 == 0 || c % 4 == 3 {
                        left += scaled;
                    } else {
                        right += scaled;
                    }

                    let freq = AMIGA_CLOCK / (state.period as f64 * 2.0);
                    state.position += freq / SAMPLE_RATE as f64;
                }

                pcm.extend_from_slice(&(left.clamp(i8::MIN as i32, i8::MAX as i32) as i16 * 256).to_le_bytes());
                pcm.extend_from_slice(&(right.clamp(i8::MIN as i32, i8::MAX as i32) as i16 * 256).to_le_bytes());
            }
        }
    }

    pcm
}

pub struct ModContainer {
    source: Arc<InMemorySource>,
    format: AudioFormat,
}

impl ModContainer {
    pub fn open(mut file: File) -> Result<Self, ContainerError> {
        let bytes = read_whole_file(&mut file)?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let module = parse(&bytes)?;
        let pcm = render(&module);
        let format = AudioFormat {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            data_size: pcm.len() as u64,
        };
        Ok(Self {
            source: Arc::new(InMemorySource::new(pcm)),
            format,
        })
    }
}

impl Container for ModContainer {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn trunc_at(&mut self, byte_position: u64) {
        self.format.data_size = self.format.data_size.min(byte_position);
    }

    fn make_decoder(&self) -> Result<Box<dyn Stage>, ContainerError> {
        Ok(Box::new(PcmBaseDecoder::new(
            self.source.clone(),
            0,
            self.format,
        )))
    }

    fn try_clone(&self) -> Result<Box<dyn Container>, ContainerError> {
        Ok(Box::new(ModContainer {
            source: self.source.clone(),
            format: self.format,
        }))
    }
}
