//! MIDI container: renders a Standard MIDI File against the process-wide
//! SoundFont (see [`crate::config`]) to 16-bit stereo PCM once, at open
//! time, via `rustysynth`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustysynth::{MidiFile, MidiFileSequencer, SoundFont, Synthesizer, SynthesizerSettings};

use crate::common::AudioFormat;
use crate::container::{Container, InMemorySource};
use crate::decoder::base::pcm::PcmBaseDecoder;
use crate::decoder::Stage;
use crate::error::ContainerError;

const SAMPLE_RATE: u32 = 44_100;
const RENDER_CHUNK_FRAMES: usize = 4_096;

pub struct MidiContainer {
    source: Arc<InMemorySource>,
    format: AudioFormat,
}

impl MidiContainer {
    pub fn open(path: &Path) -> Result<Self, ContainerError> {
        let sound_font_path = crate::config::get_sound_font().ok_or(ContainerError::MissingSoundFont)?;

        let mut sf_reader = BufReader::new(File::open(&sound_font_path)?);
        let sound_font = Arc::new(
            SoundFont::new(&mut sf_reader)
                .map_err(|e| ContainerError::MalformedHeader(format!("invalid SoundFont: {e}")))?,
        );

        let mut midi_reader = BufReader::new(File::open(path)?);
        let midi_file = Arc::new(
            MidiFile::new(&mut midi_reader)
                .map_err(|e| ContainerError::MalformedHeader(format!("invalid MIDI file: {e}")))?,
        );

        let settings = SynthesizerSettings::new(SAMPLE_RATE as i32);
        let synthesizer = Synthesizer::new(&sound_font, &settings)
            .map_err(|e| ContainerError::MalformedHeader(format!("cannot start synthesizer: {e}")))?;
        let mut sequencer = MidiFileSequencer::new(synthesizer);
        sequencer.play(&midi_file, false);

        let mut left = vec![0f32; RENDER_CHUNK_FRAMES];
        let mut right = vec![0f32; RENDER_CHUNK_FRAMES];
        let mut pcm = Vec::new();
        while !sequencer.end_of_sequence() {
            sequencer.render(&mut left, &mut right);
            for (l, r) in left.iter().zip(right.iter()) {
                pcm.extend_from_slice(&to_i16(*l).to_le_bytes());
                pcm.extend_from_slice(&to_i16(*r).to_le_bytes());
            }
        }

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

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

impl Container for MidiContainer {
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
        Ok(Box::new(MidiContainer {
            source: self.source.clone(),
            format: self.format,
        }))
    }
}
