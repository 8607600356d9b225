//! L1/L2: the `Stage` contract and the decoder chain built on top of it.
//!
//! A [`Stage`] is one link in the decoder chain. The bottom
//! stage of any chain is a base decoder (`decoder::base::*`) wrapping a
//! format-specific codec; every stage above it is a DSP filter
//! (`decoder::stages::*`) that pulls from its downstream, transforms the
//! bytes, and reports its own (possibly different) format attributes.
//!
//! Chains are represented as a single boxed trait object owning its
//! downstream, per the redesign guidance in the design notes: no
//! decorator-inheritance hierarchy, just `Box<dyn Stage>` wrapping
//! `Box<dyn Stage>`.

pub mod base;
pub mod chain;
pub mod stages;

use crate::common::{AudioFormat, BitDepth, ChannelCount, SampleRate};

pub use chain::DecoderChain;

/// One link in a decoder chain.
///
/// `read_samples` is the only method with real work to do; the format
/// accessors describe what that work produces. Implementations must keep
/// their reported `frame_size()` consistent with `channels()` and
/// `bits_per_sample()` (the default implementation derives it from those
/// two, which is correct for every stage in this crate).
pub trait Stage: Send {
    /// Pulls up to `max_bytes` bytes representing this stage's own
    /// reported format, starting at `position_bytes` in that same format's
    /// coordinate system. Returns the number of bytes actually written to
    /// `buf`, always a multiple of `frame_size()`, and 0 iff end of stream
    /// has been reached.
    fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize;

    fn channels(&self) -> ChannelCount;
    fn sample_rate(&self) -> SampleRate;
    fn bits_per_sample(&self) -> BitDepth;

    /// Total size of this stage's PCM stream, in its own reported format.
    fn data_size(&self) -> u64;

    /// The sample value representing zero output for this stage's encoding.
    fn silence_level(&self) -> i64 {
        if self.bits_per_sample() == 8 {
            128
        } else {
            0
        }
    }

    fn frame_size(&self) -> usize {
        self.channels() as usize * (self.bits_per_sample() as usize / 8)
    }

    fn format(&self) -> AudioFormat {
        AudioFormat {
            channels: self.channels(),
            sample_rate: self.sample_rate(),
            bits_per_sample: self.bits_per_sample(),
            data_size: self.data_size(),
        }
    }

    /// Removes this stage and returns its downstream, restoring the
    /// previously reported format. Calling this on a base decoder (one with
    /// no downstream) is a contract violation, not a recoverable error: the
    /// base decoder's implementation panics.
    fn peel(self: Box<Self>) -> Box<dyn Stage>;

    /// Deep-clones this stage and its entire downstream, for
    /// `DecoderChain::try_clone`. Base decoders reopen their own
    /// `PcmSource`-backed state; DSP stages clone their parameters and
    /// recurse into their downstream.
    fn clone_stage(&self) -> Box<dyn Stage>;
}
