//! MP3 container: decodes the whole stream to 16-bit PCM once, at open
//! time, via `minimp3_fixed`. Format (channels, sample rate) is taken from
//! the first decoded frame; later frames are trusted to match, which holds
//! for the constant-format files this crate expects to play.

use std::fs::File;
use std::io::Cursor;
use std::sync::Arc;

use minimp3_fixed::{Decoder, Error as Mp3Error};

use crate::common::AudioFormat;
use crate::container::{read_whole_file, Container, InMemorySource};
use crate::decoder::base::pcm::PcmBaseDecoder;
use crate::decoder::Stage;
use crate::error::ContainerError;

pub struct Mp3Container {
    source: Arc<InMemorySource>,
    format: AudioFormat,
}

impl Mp3Container {
    pub fn open(mut file: File) -> Result<Self, ContainerError> {
        let bytes = read_whole_file(&mut file)?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let mut decoder = Decoder::new(Cursor::new(bytes));

        let mut pcm = Vec::new();
        let mut channels: Option<u16> = None;
        let mut sample_rate: Option<u32> = None;

        loop {
            match decoder.next_frame() {
                Ok(frame) => {
                    channels.get_or_insert(frame.channels as u16);
                    sample_rate.get_or_insert(frame.sample_rate as u32);
                    for sample in frame.data {
                        pcm.extend_from_slice(&sample.to_le_bytes());
                    }
                }
                Err(Mp3Error::Eof) => break,
                Err(e) => {
                    return Err(ContainerError::MalformedHeader(format!(
                        "mp3 decode error: {e:?}"
                    )))
                }
            }
        }

        let channels = channels.ok_or_else(|| {
            ContainerError::MalformedHeader("mp3 stream contained no decodable frames".into())
        })?;
        let sample_rate = sample_rate.unwrap_or(44_100);

        let format = AudioFormat {
            channels,
            sample_rate,
            bits_per_sample: 16,
            data_size: pcm.len() as u64,
        };

        Ok(Self {
            source: Arc::new(InMemorySource::new(pcm)),
            format,
        })
    }
}

impl Container for Mp3Container {
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
        Ok(Box::new(Mp3Container {
            source: self.source.clone(),
            format: self.format,
        }))
    }
}
