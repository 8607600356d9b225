//! The mutable stack of stages sitting on top of a base decoder.

use crate::common::AudioFormat;
use crate::decoder::Stage;

/// An ordered stack of [`Stage`]s with exactly one base decoder at the
/// bottom. Positions handed to [`DecoderChain::read_samples`] are always in
/// bytes of the *topmost* stage's reported format.
///
/// Mutation (`wrap`/`peel`) is only legal while the owning `Sound` is not
/// actively pulling, i.e. in `Stopped` or `Paused`; this type
/// itself does not enforce that, the engine does.
pub struct DecoderChain {
    top: Box<dyn Stage>,
}

impl DecoderChain {
    pub fn new(base: Box<dyn Stage>) -> Self {
        Self { top: base }
    }

    #[inline]
    pub fn read_samples(&mut self, buf: &mut [u8], position_bytes: u64, max_bytes: usize) -> usize {
        self.top.read_samples(buf, position_bytes, max_bytes)
    }

    #[inline]
    pub fn format(&self) -> AudioFormat {
        self.top.format()
    }

    #[inline]
    pub fn silence_level(&self) -> i64 {
        self.top.silence_level()
    }

    #[inline]
    pub fn frame_size(&self) -> usize {
        self.top.frame_size()
    }

    /// Pushes a new top stage, built from the current top via `builder`.
    pub fn wrap<F>(&mut self, builder: F)
    where
        F: FnOnce(Box<dyn Stage>) -> Box<dyn Stage>,
    {
        let previous = std::mem::replace(&mut self.top, Box::new(Placeholder));
        self.top = builder(previous);
    }

    /// Removes the topmost stage, restoring the previous reported format.
    /// Peeling past the base decoder is a contract violation;
    /// the base decoder's own `peel` panics in that case.
    pub fn peel(&mut self) {
        let top = std::mem::replace(&mut self.top, Box::new(Placeholder));
        self.top = top.peel();
    }

    /// Deep-clones the whole stack.
    pub fn try_clone(&self) -> DecoderChain {
        DecoderChain {
            top: self.top.clone_stage(),
        }
    }
}

/// Never observed: only exists to let `mem::replace` move the real stage out
/// of `self.top` while `builder`/`peel` run.
struct Placeholder;

impl Stage for Placeholder {
    fn read_samples(&mut self, _buf: &mut [u8], _position_bytes: u64, _max_bytes: usize) -> usize {
        unreachable!("placeholder stage pulled from")
    }
    fn channels(&self) -> crate::common::ChannelCount {
        0
    }
    fn sample_rate(&self) -> crate::common::SampleRate {
        0
    }
    fn bits_per_sample(&self) -> crate::common::BitDepth {
        0
    }
    fn data_size(&self) -> u64 {
        0
    }
    fn peel(self: Box<Self>) -> Box<dyn Stage> {
        unreachable!("placeholder stage peeled")
    }
    fn clone_stage(&self) -> Box<dyn Stage> {
        unreachable!("placeholder stage cloned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::stages::resolution::SampleResolution;
    use crate::decoder::stages::test_support::ConstantStage;

    #[test]
    fn wrap_then_peel_restores_format() {
        let base = ConstantStage::new(2, 44_100, 16, 1_000, 0);
        let mut chain = DecoderChain::new(Box::new(base));
        let before = chain.format();

        chain.wrap(|downstream| Box::new(SampleResolution::new(downstream, 8).unwrap()));
        assert_eq!(chain.format().bits_per_sample, 8);

        chain.peel();
        assert_eq!(chain.format(), before);
    }
}
