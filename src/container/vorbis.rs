//! Ogg Vorbis container: decodes the whole stream to 16-bit PCM once, at
//! open time, via `lewton`. Vorbis carries no native bit depth, so the
//! decoded output is fixed at int16 the way `lewton`'s packet reader
//! produces it.

use std::fs::File;
use std::io::Cursor;
use std::sync::Arc;

use lewton::inside_ogg::OggStreamReader;

use crate::common::AudioFormat;
use crate::container::{read_whole_file, Container, InMemorySource};
use crate::decoder::base::pcm::PcmBaseDecoder;
use crate::decoder::Stage;
use crate::error::ContainerError;

pub struct VorbisContainer {
    source: Arc<InMemorySource>,
    format: AudioFormat,
}

impl VorbisContainer {
    pub fn open(mut file: File) -> Result<Self, ContainerError> {
        let bytes = read_whole_file(&mut file)?;
        Self::from_bytes(bytes)
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let mut reader = OggStreamReader::new(Cursor::new(bytes))
            .map_err(|e| ContainerError::MalformedHeader(format!("invalid Ogg Vorbis stream: {e}")))?;

        let channels = reader.ident_hdr.audio_channels as u16;
        let sample_rate = reader.ident_hdr.audio_sample_rate;

        let mut pcm = Vec::new();
        while let Some(packet) = reader
            .read_dec_packet_itl()
            .map_err(|e| ContainerError::MalformedHeader(format!("vorbis decode error: {e}")))?
        {
            for sample in packet {
                pcm.extend_from_slice(&sample.to_le_bytes());
            }
        }

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

impl Container for VorbisContainer {
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
        Ok(Box::new(VorbisContainer {
            source: self.source.clone(),
            format: self.format,
        }))
    }
}
