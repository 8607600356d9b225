//! Error taxonomy for the three failure categories described in the design
//! notes: container (load-time), decoder (construction-time) and sink
//! (runtime). Contract violations (peel past the base decoder, out-of-range
//! `set_position`/`set_volume`) are clamped or ignored by the callers in this
//! crate rather than represented here, matching the established library
//! style.

use std::path::PathBuf;

/// Errors that can occur while opening a [`crate::container::Container`].
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("unsupported container format for {0}")]
    UnsupportedFormat(PathBuf),

    #[error("data size {actual} exceeds the {limit} byte limit")]
    TooLarge { actual: u64, limit: u64 },

    #[error("MIDI playback requires a SoundFont; call jukebox::set_sound_font first")]
    MissingSoundFont,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while constructing a base decoder from an already
/// open container.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("codec handshake failed: {0}")]
    Handshake(String),

    #[error("invalid resolution parameter: {0} bits (expected 8, 16 or 32)")]
    InvalidResolution(u16),
}

/// Runtime errors surfaced from the sink while a [`crate::sound::Sound`] is
/// playing. These are fatal to the playing sound: the engine transitions to
/// `Stopped` and drains the on-stop callback stack.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to open audio output device: {0}")]
    Open(String),

    #[error("failed to write audio block to the device: {0}")]
    Write(String),
}
