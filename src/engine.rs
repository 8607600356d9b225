//! L3: the playback state machine and its producer thread.
//!
//! Each [`PlaybackEngine`] owns exactly one background thread for the
//! lifetime of the `Sound` that owns it: the thread blocks on its command
//! channel while `Stopped`/`Paused` and only pulls from the decoder chain
//! while `Playing`. The thread is always joined, on drop, never detached.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender};

use crate::callbacks::Callbacks;
use crate::decoder::DecoderChain;
use crate::mixer::Mixer;
use crate::sink::{CpalSink, Sink};

const CHUNK_FRAMES: usize = 2_048;
const COMMAND_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

enum Command {
    /// `reset` is true iff the previous state was `Stopped`, i.e. this is a
    /// fresh start rather than a resume from `Paused` — only then does the
    /// cursor snap back to 0 (spec §4.4: `Stopped | play() | Playing` resets
    /// the cursor, `Paused | play() | Playing` does not).
    Play { reset: bool },
    Pause,
    /// `drain` is true iff the previous state was `Playing` or `Paused`,
    /// i.e. this stop is an actual transition rather than a no-op on an
    /// already-`Stopped` sound — only then does the on-stop stack fire.
    Stop { drain: bool },
    SetPosition(u64),
    Shutdown,
}

pub struct PlaybackEngine {
    chain: Arc<Mutex<DecoderChain>>,
    state: Arc<Mutex<PlaybackState>>,
    position: Arc<AtomicU64>,
    volume: Arc<AtomicU8>,
    looping: Arc<AtomicBool>,
    tx: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    pub fn new(chain: DecoderChain, callbacks: Arc<Callbacks>) -> Self {
        let chain = Arc::new(Mutex::new(chain));
        let state = Arc::new(Mutex::new(PlaybackState::Stopped));
        let position = Arc::new(AtomicU64::new(0));
        let volume = Arc::new(AtomicU8::new(100));
        let looping = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(COMMAND_CAPACITY);

        let thread = {
            let chain = chain.clone();
            let state = state.clone();
            let position = position.clone();
            let volume = volume.clone();
            let looping = looping.clone();
            std::thread::Builder::new()
                .name("jukebox-playback".to_string())
                .spawn(move || run(chain, state, position, volume, looping, callbacks, rx))
                .expect("failed to spawn playback thread")
        };

        Self {
            chain,
            state,
            position,
            volume,
            looping,
            tx,
            thread: Some(thread),
        }
    }

    pub fn play(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), PlaybackState::Playing);
        let reset = previous == PlaybackState::Stopped;
        let _ = self.tx.send(Command::Play { reset });
    }

    pub fn pause(&self) {
        *self.lock_state() = PlaybackState::Paused;
        let _ = self.tx.send(Command::Pause);
    }

    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), PlaybackState::Stopped);
        let drain = previous != PlaybackState::Stopped;
        let _ = self.tx.send(Command::Stop { drain });
    }

    pub fn state(&self) -> PlaybackState {
        *self.lock_state()
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Acquire)
    }

    pub fn set_position(&self, position_bytes: u64) {
        self.position.store(position_bytes, Ordering::Release);
        let _ = self.tx.send(Command::SetPosition(position_bytes));
    }

    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Acquire)
    }

    pub fn set_volume(&self, percent: u8) {
        self.volume.store(percent.min(100), Ordering::Release);
    }

    pub fn looping(&self) -> bool {
        self.looping.load(Ordering::Acquire)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Release);
    }

    pub fn chain(&self) -> &Arc<Mutex<DecoderChain>> {
        &self.chain
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PlaybackState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    chain: Arc<Mutex<DecoderChain>>,
    state: Arc<Mutex<PlaybackState>>,
    position: Arc<AtomicU64>,
    volume: Arc<AtomicU8>,
    looping: Arc<AtomicBool>,
    callbacks: Arc<Callbacks>,
    rx: crossbeam_channel::Receiver<Command>,
) {
    let mut sink: Option<CpalSink> = None;
    let mut buf: Vec<u8> = Vec::new();
    let master = Mixer::new();

    loop {
        let current = *state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if current != PlaybackState::Playing {
            match rx.recv() {
                Ok(Command::Shutdown) | Err(_) => return,
                Ok(Command::SetPosition(pos)) => {
                    position.store(pos, Ordering::Release);
                    callbacks.reset_fired();
                }
                Ok(Command::Pause) => {
                    if let Some(sink) = &sink {
                        sink.drop_buffered();
                    }
                }
                Ok(Command::Stop { drain }) => {
                    if let Some(sink) = sink.take() {
                        sink.drain();
                        sink.close();
                    }
                    if drain {
                        callbacks.drain_on_stop();
                    }
                }
                Ok(Command::Play { reset }) => {
                    if reset {
                        position.store(0, Ordering::Release);
                        callbacks.reset_fired();
                    }
                }
            }
            continue;
        }

        let mut shutdown = false;
        while let Ok(cmd) = rx.try_recv() {
            match cmd {
                Command::Shutdown => shutdown = true,
                Command::SetPosition(pos) => {
                    position.store(pos, Ordering::Release);
                    callbacks.reset_fired();
                }
                Command::Pause => {
                    if let Some(sink) = &sink {
                        sink.drop_buffered();
                    }
                }
                Command::Stop { drain } => {
                    if let Some(sink) = sink.take() {
                        sink.drain();
                        sink.close();
                    }
                    if drain {
                        callbacks.drain_on_stop();
                    }
                }
                Command::Play { reset } => {
                    if reset {
                        position.store(0, Ordering::Release);
                        callbacks.reset_fired();
                    }
                }
            }
        }
        if shutdown {
            return;
        }
        if *state.lock().unwrap_or_else(std::sync::PoisonError::into_inner) != PlaybackState::Playing {
            continue;
        }

        let format = chain.lock().unwrap_or_else(std::sync::PoisonError::into_inner).format();
        if sink.is_none() {
            sink = CpalSink::open_default(format).ok();
        }

        let frame_size = (format.channels as usize) * (format.bits_per_sample as usize / 8);
        if frame_size == 0 {
            continue;
        }
        // Step 1: the sink dictates the period length once it's open; a
        // fixed chunk size is only a fallback before the device is known.
        let period = sink
            .as_ref()
            .map(|s| s.period_size())
            .unwrap_or(CHUNK_FRAMES * frame_size)
            .max(frame_size);
        let period = period - (period % frame_size);
        if buf.len() != period {
            buf = vec![0u8; period];
        }

        let pos = position.load(Ordering::Acquire);
        let got = chain
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .read_samples(&mut buf, pos, period);

        if got == 0 {
            if looping.load(Ordering::Acquire) {
                position.store(0, Ordering::Release);
                callbacks.reset_fired();
            } else {
                *state.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = PlaybackState::Stopped;
                if let Some(sink) = sink.take() {
                    sink.drain();
                    sink.close();
                }
                callbacks.drain_on_stop();
            }
            continue;
        }

        let gain = (volume.load(Ordering::Acquire) as f64 / 100.0)
            * (master.get_volume() as f64 / 100.0);
        apply_gain(&mut buf[..got], format.bits_per_sample, gain);

        // Step 5: a short read never reaches the sink as a partial period —
        // pad the tail with silence so the device always gets a full block.
        if got < period {
            fill_silence(&mut buf[got..period], format.bits_per_sample);
        }

        if let Some(sink) = &sink {
            let _ = sink.write(&buf[..period]);
        }

        let new_pos = pos + got as u64;
        callbacks.fire_due_events(pos, new_pos);
        position.store(new_pos, Ordering::Release);
    }
}

/// Fills `buf` with the raw byte pattern for silence at `bits` depth: 128
/// for 8-bit unsigned PCM (matches `AudioFormat::silence_level`), 0 for
/// 16-/32-bit signed PCM, which is all-zero bytes in either byte order.
fn fill_silence(buf: &mut [u8], bits: u16) {
    let byte = if bits == 8 { 128u8 } else { 0u8 };
    buf.fill(byte);
}

fn apply_gain(buf: &mut [u8], bits: u16, gain: f64) {
    if gain >= 0.999 {
        return;
    }
    let sample_bytes = bits as usize / 8;
    let mut off = 0;
    while off + sample_bytes <= buf.len() {
        match bits {
            8 => {
                let centered = buf[off] as i64 - 128;
                let scaled = (centered as f64 * gain).round() as i64;
                buf[off] = (scaled.clamp(-128, 127) + 128) as u8;
            }
            16 => {
                let sample = i16::from_ne_bytes([buf[off], buf[off + 1]]);
                let scaled = (sample as f64 * gain).round() as i32;
                buf[off..off + 2]
                    .copy_from_slice(&(scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16).to_ne_bytes());
            }
            32 => {
                let sample = i32::from_ne_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
                let scaled = (sample as f64 * gain).round() as i64;
                buf[off..off + 4]
                    .copy_from_slice(&(scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32).to_ne_bytes());
            }
            _ => {}
        }
        off += sample_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_scales_centered_samples() {
        let mut buf = 1000i16.to_ne_bytes().to_vec();
        apply_gain(&mut buf, 16, 0.5);
        assert_eq!(i16::from_ne_bytes([buf[0], buf[1]]), 500);
    }

    #[test]
    fn full_gain_is_a_no_op() {
        let original = vec![1, 2, 3, 4];
        let mut buf = original.clone();
        apply_gain(&mut buf, 16, 1.0);
        assert_eq!(buf, original);
    }

    #[test]
    fn fill_silence_8bit_uses_128() {
        let mut buf = vec![7u8; 4];
        fill_silence(&mut buf, 8);
        assert_eq!(buf, vec![128, 128, 128, 128]);
    }

    #[test]
    fn fill_silence_16bit_uses_zero() {
        let mut buf = vec![9u8; 4];
        fill_silence(&mut buf, 16);
        assert_eq!(buf, vec![0, 0, 0, 0]);
    }

    #[test]
    fn play_from_stopped_resets_cursor_to_zero() {
        use crate::decoder::stages::test_support::ConstantStage;

        let chain = DecoderChain::new(Box::new(ConstantStage::new(2, 44_100, 16, 4_000_000, 0)));
        let engine = PlaybackEngine::new(chain, Arc::new(Callbacks::new()));

        // Simulate a sound parked at a stale nonzero cursor while Stopped
        // (what a natural EOF leaves behind).
        engine.set_position(1_234);
        assert_eq!(engine.position(), 1_234);

        // play() immediately followed by pause(), with no read in between:
        // the producer thread is still parked on its command channel when
        // both land, so the reset from the Play command is the only thing
        // that can have touched position by the time it settles on Paused.
        engine.play();
        engine.pause();
        std::thread::sleep(std::time::Duration::from_millis(20));

        // Replaying from Stopped must snap the cursor back to 0 rather than
        // resuming from the stale position (which, at true EOF, would
        // silently re-stop without producing any audio).
        assert_eq!(engine.position(), 0);
    }

    #[test]
    fn pause_then_play_preserves_cursor() {
        use crate::decoder::stages::test_support::ConstantStage;

        let chain = DecoderChain::new(Box::new(ConstantStage::new(2, 44_100, 16, 4_000_000, 0)));
        let engine = PlaybackEngine::new(chain, Arc::new(Callbacks::new()));

        engine.set_position(2_000);
        engine.pause();
        assert_eq!(engine.position(), 2_000);

        engine.play();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(engine.position() >= 2_000);
    }
}
