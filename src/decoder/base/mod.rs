//! L1: base decoders, the bottom stage of every chain.
//!
//! Every container format in this crate decodes to a flat interleaved PCM
//! byte buffer once, at open time (WAV's buffer *is* its file content past
//! the header; the compressed formats decode into a fresh one). From there
//! on every format is served by the same [`pcm::PcmBaseDecoder`]: a direct
//! byte-range view with no further codec state. `peel()` on one always
//! panics, per the [`super::Stage`] contract.

pub mod pcm;
