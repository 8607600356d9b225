//! FLAC container: decodes the whole stream to PCM once, at open time, via
//! `claxon`. FLAC natively allows any bit depth up to 32; depths other than
//! 8/16/32 are rescaled to the nearest one this crate's `Stage` contract
//! supports.

use std::fs::File;
use std::io::Cursor;
use std::sync::Arc;

use crate::common::AudioFormat;
use crate::container::{read_whole_file, Container, InMemorySource};
use crate::decoder::base::pcm::PcmBaseDecoder;
use crate::decoder::Stage;
use crate::error::ContainerError;

pub struct FlacContainer {
    source: Arc<InMemorySource>,
    format: AudioFormat,
}

fn target_bits(native_bits: u32) -> u16 {
    if native_bits <= 8 {
        8
    } else if native_bits <= 16 {
        16
    } else {
        32
    }
}

impl FlacContainer {
    pub fn open(mut file: File) -> Result<Self, ContainerError> {
        let bytes = read_whole_file(&mut file)?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let mut reader = claxon::FlacReader::new(Cursor::new(bytes))
            .map_err(|e| ContainerError::MalformedHeader(format!("invalid FLAC stream: {e}")))?;

        let info = reader.streaminfo();
        let channels = info.channels as u16;
        let sample_rate = info.sample_rate;
        let native_bits = info.bits_per_sample;
        let bits = target_bits(native_bits);

        let native_max = (1i64 << (native_bits - 1)) - 1;
        let target_max: i64 = match bits {
            8 => 127,
            16 => i16::MAX as i64,
            32 => i32::MAX as i64,
            _ => unreachable!(),
        };

        let mut pcm = Vec::new();
        for sample in reader.samples() {
            let sample = sample
                .map_err(|e| ContainerError::MalformedHeader(format!("flac decode error: {e}")))?
                as i64;
            let rescaled = if native_bits as u16 == bits {
                sample
            } else {
                (sample as f64 * (target_max as f64 / native_max as f64)).round() as i64
            };
            match bits {
                8 => pcm.push((rescaled.clamp(-128, 127) + 128) as u8),
                16 => pcm.extend_from_slice(&(rescaled as i16).to_le_bytes()),
                32 => pcm.extend_from_slice(&(rescaled as i32).to_le_bytes()),
                _ => unreachable!(),
            }
        }

        let format = AudioFormat {
            channels,
            sample_rate,
            bits_per_sample: bits,
            data_size: pcm.len() as u64,
        };

        Ok(Self {
            source: Arc::new(InMemorySource::new(pcm)),
            format,
        })
    }
}

impl Container for FlacContainer {
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
        Ok(Box::new(FlacContainer {
            source: self.source.clone(),
            format: self.format,
        }))
    }
}
