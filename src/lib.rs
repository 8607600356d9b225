//! An audio playback and processing library.
//!
//! Load a compressed or container-based audio file — WAV/PCM, Ogg Vorbis,
//! MP3, FLAC, MIDI (via a SoundFont) or MOD — decode it through a
//! composable stack of DSP stages, and play it back with per-sound volume,
//! looping, position control, timed callbacks and stop notification:
//!
//! ```no_run
//! # #[cfg(feature = "playback")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sound = jukebox::Sound::load("sine_440_1s_16bit_stereo_44100.wav")?;
//! sound.set_volume(80).r#loop(true).play();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "playback"))]
//! # fn main() {}
//! ```
//!
//! The crate is organized in the layers described in its design notes:
//! [`container`] parses file headers and supplies bytes (L0), [`decoder`]
//! holds the [`decoder::Stage`] contract, the base decoders and the DSP
//! stages built on it (L1/L2), [`engine`] drives the playback state machine
//! and producer thread (L3), and [`sink`]/[`mixer`] are the platform audio
//! output and the process-wide volume control (L4/L4'). [`Sound`] ties all
//! of that together into the handle callers actually use.

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod callbacks;
pub mod common;
pub mod config;
pub mod container;
pub mod decoder;
pub mod error;

#[cfg(feature = "playback")]
pub mod engine;
#[cfg(feature = "playback")]
pub mod mixer;
#[cfg(feature = "playback")]
pub mod sink;
#[cfg(feature = "playback")]
pub mod sound;

pub use common::AudioFormat;
pub use config::{get_sound_font, set_sound_font};
pub use container::Container;
pub use decoder::{DecoderChain, Stage};
pub use error::{ContainerError, DecoderError, SinkError};

#[cfg(feature = "playback")]
pub use engine::PlaybackState;
#[cfg(feature = "playback")]
pub use mixer::{mixer, Mixer};
#[cfg(feature = "playback")]
pub use sound::Sound;
