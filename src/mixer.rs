//! L4': a process-wide master volume knob, applied by every `Sound`'s
//! producer thread on top of its own per-sound volume before the bytes
//! reach a [`crate::sink::CpalSink`].

use std::sync::atomic::{AtomicU8, Ordering};

static MASTER_VOLUME: AtomicU8 = AtomicU8::new(100);

/// A handle to the process-wide master volume. All instances refer to the
/// same underlying value; there is exactly one mixer per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mixer;

/// Returns a handle to the process-wide master volume.
pub fn mixer() -> Mixer {
    Mixer::new()
}

impl Mixer {
    pub fn new() -> Self {
        Self
    }

    /// Sets the master volume as a percentage, clamped to `0..=100`.
    pub fn set_volume(&self, percent: u8) {
        MASTER_VOLUME.store(percent.min(100), Ordering::Relaxed);
    }

    /// Returns the current master volume percentage.
    pub fn get_volume(&self) -> u8 {
        MASTER_VOLUME.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_above_one_hundred() {
        let mixer = Mixer::new();
        mixer.set_volume(255);
        assert_eq!(mixer.get_volume(), 100);
        mixer.set_volume(50); // leave global state sane for other tests
    }
}
