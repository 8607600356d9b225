//! L3 public API: [`Sound`], the handle callers build from a loaded
//! [`crate::container::Container`] and drive through play/pause/stop,
//! volume, looping, callbacks and the DSP stage catalog.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::callbacks::{Callback, Callbacks};
use crate::container::Container;
use crate::decoder::chain::DecoderChain;
use crate::decoder::stages::distortion::Distortion;
use crate::decoder::stages::fade::Fade;
use crate::decoder::stages::fade_on_stop::FadeOnStop;
use crate::decoder::stages::joint_stereo::JointStereo;
use crate::decoder::stages::moving_average::MovingAverage;
use crate::decoder::stages::resolution::SampleResolution;
use crate::decoder::stages::reverb::Reverb;
use crate::engine::{PlaybackEngine, PlaybackState};
use crate::error::ContainerError;

/// A loaded, independently playable audio file.
///
/// Dropping a `Sound` stops it: [`PlaybackEngine`]'s `Drop` joins the
/// producer thread before the decoder chain (and the container behind it)
/// are released.
pub struct Sound {
    filename: PathBuf,
    container: Box<dyn Container>,
    engine: PlaybackEngine,
    callbacks: Arc<Callbacks>,
    fade_on_stop_seconds: Mutex<Option<f64>>,
}

impl Sound {
    /// Opens `path`, auto-selecting a container by file extension, and
    /// builds a `Sound` ready to `play()`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let path = path.as_ref().to_path_buf();
        let container = crate::container::open(&path)?;
        let chain = DecoderChain::new(container.make_decoder()?);
        let callbacks = Arc::new(Callbacks::new());
        let engine = PlaybackEngine::new(chain, callbacks.clone());
        Ok(Self {
            filename: path,
            container,
            engine,
            callbacks,
            fade_on_stop_seconds: Mutex::new(None),
        })
    }

    fn frame_size(&self) -> usize {
        self.engine.chain().lock().unwrap_or_else(std::sync::PoisonError::into_inner).frame_size()
    }

    fn sample_rate(&self) -> u32 {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .format()
            .sample_rate
    }

    // -- transport -----------------------------------------------------

    /// Starts (or resumes) playback. From `Stopped` this resets the cursor
    /// to 0; from `Paused` it resumes where it left off.
    pub fn play(&self) -> &Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(filename = %self.filename.display(), "play");
        self.engine.play();
        self
    }

    /// Rewinds to the start and plays, regardless of the current state.
    pub fn restart(&self) -> &Self {
        self.engine.set_position(0);
        self.engine.play();
        self
    }

    pub fn pause(&self) -> &Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(filename = %self.filename.display(), "pause");
        self.engine.pause();
        self
    }

    /// Stops playback. If [`Sound::fade_on_stop`] configured a release
    /// fade, this installs a [`FadeOnStop`] stage anchored at the current
    /// position instead of cutting off immediately: playback continues
    /// until the (now shortened) stream's natural end, which drives the
    /// normal EOF-without-looping transition to `Stopped`.
    pub fn stop(&self) -> &Self {
        #[cfg(feature = "tracing")]
        tracing::debug!(filename = %self.filename.display(), "stop");
        let fade_seconds = self
            .fade_on_stop_seconds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        match fade_seconds {
            Some(seconds) => {
                let sample_rate = self.sample_rate();
                let fade_frames = ((seconds * sample_rate as f64).round() as u64).max(1);
                let position = self.engine.position();
                let mut chain = self
                    .engine
                    .chain()
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                chain.wrap(|downstream| {
                    Box::new(FadeOnStop::new(downstream, position, fade_frames))
                });
            }
            None => self.engine.stop(),
        }
        self
    }

    pub fn playing(&self) -> bool {
        self.engine.state() == PlaybackState::Playing
    }

    // -- volume / looping / position ------------------------------------

    pub fn set_volume(&self, percent: u8) -> &Self {
        self.engine.set_volume(percent.min(100));
        self
    }

    pub fn get_volume(&self) -> u8 {
        self.engine.volume()
    }

    /// Enables or disables looping at end of stream. Named with a raw
    /// identifier since `loop` is a reserved word.
    pub fn r#loop(&self, enable: bool) -> &Self {
        self.engine.set_looping(enable);
        self
    }

    pub fn get_position(&self) -> u64 {
        self.engine.position()
    }

    /// Out-of-range positions are clamped by the producer thread treating
    /// a position at or past `data_size` as end of stream on the next pull,
    /// per the established clamp-don't-error library style.
    pub fn set_position(&self, position_bytes: u64) -> &Self {
        self.engine.set_position(position_bytes);
        self
    }

    // -- callbacks --------------------------------------------------------

    pub fn push_on_stop_callback(&self, callback: Callback) -> &Self {
        self.callbacks.push_on_stop(callback);
        self
    }

    pub fn pop_on_stop_callback(&self) -> Option<Callback> {
        self.callbacks.pop_on_stop()
    }

    pub fn clear_on_stop_stack(&self) -> &Self {
        self.callbacks.clear_on_stop();
        self
    }

    /// Registers `callback` to fire once the cursor first reaches or
    /// passes `seconds` into the topmost stage's reported format.
    pub fn add_timed_event_callback(&self, seconds: f64, callback: Callback) -> &Self {
        let bytes_per_sec = self.sample_rate() as f64 * self.frame_size() as f64;
        let position = (seconds * bytes_per_sec).round().max(0.0) as u64;
        self.callbacks.add_timed_event(position, callback);
        self
    }

    // -- decoder chain stages ---------------------------------------------

    pub fn reverb(&self, delay_seconds: f64, decay: f64, num_delays: u32) -> &Self {
        let delay_ms = (delay_seconds * 1000.0).round().max(1.0) as u32;
        self.wrap(|downstream| Box::new(Reverb::new(downstream, delay_ms, decay, num_delays)));
        self
    }

    pub fn distortion(&self, gain: f64) -> &Self {
        self.wrap(|downstream| Box::new(Distortion::new(downstream, gain)));
        self
    }

    /// Installs a `MovingAverage` leaky integrator with a window of
    /// `window_seconds`. Not part of the primary builder surface, but
    /// kept available for callers who want the stage directly.
    pub fn moving_average(&self, window_seconds: f64) -> &Self {
        let rate = self.sample_rate().max(1) as f64;
        let n = (window_seconds * rate).max(1.0);
        let alpha = (1.0 / n).clamp(0.0, 1.0);
        self.wrap(|downstream| Box::new(MovingAverage::new(downstream, alpha)));
        self
    }

    pub fn fade(&self, fade_in_s: f64, fade_out_s: f64) -> &Self {
        let rate = self.sample_rate() as f64;
        let fade_in_frames = (fade_in_s * rate).round().max(0.0) as u64;
        let fade_out_frames = (fade_out_s * rate).round().max(0.0) as u64;
        self.wrap(|downstream| Box::new(Fade::new(downstream, fade_in_frames, fade_out_frames)));
        self
    }

    /// Converts PCM resolution between 8/16/32 bits per sample. Invalid
    /// values (anything other than 8, 16 or 32) are ignored, matching the
    /// clamp-or-ignore handling given to every other contract violation in
    /// this crate's public API.
    pub fn resolution(&self, bits: u16) -> &Self {
        if bits != 8 && bits != 16 && bits != 32 {
            return self;
        }
        self.wrap(|downstream| {
            Box::new(SampleResolution::new(downstream, bits).expect("bits validated above"))
        });
        self
    }

    /// Pre-configures a graceful release fade: the next [`Sound::stop`]
    /// installs a [`FadeOnStop`] of this length instead of stopping
    /// immediately.
    pub fn fade_on_stop(&self, fade_out_s: f64) -> &Self {
        *self
            .fade_on_stop_seconds
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(fade_out_s);
        self
    }

    pub fn joint_stereo(&self) -> &Self {
        self.wrap(|downstream| Box::new(JointStereo::new(downstream)));
        self
    }

    /// Removes the topmost stage. A contract violation to call this past
    /// the base decoder; the base decoder's `peel` panics in that case.
    pub fn peel_decoder(&self) -> &Self {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .peel();
        self
    }

    fn wrap<F>(&self, builder: F)
    where
        F: FnOnce(Box<dyn crate::decoder::Stage>) -> Box<dyn crate::decoder::Stage>,
    {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .wrap(builder);
    }

    /// Deep-clones the current decoder chain over a freshly opened copy of
    /// this sound's container, producing an independent `Sound` that
    /// shares no mutable state: separate cursor, volume, loop flag and
    /// callback stacks.
    pub fn prototype(&self) -> Result<Sound, ContainerError> {
        let container = self.container.try_clone()?;
        let chain = self
            .engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .try_clone();
        let callbacks = Arc::new(Callbacks::new());
        let engine = PlaybackEngine::new(chain, callbacks.clone());
        Ok(Sound {
            filename: self.filename.clone(),
            container,
            engine,
            callbacks,
            fade_on_stop_seconds: Mutex::new(None),
        })
    }

    // -- accessors --------------------------------------------------------

    pub fn get_num_channels(&self) -> u16 {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .format()
            .channels
    }

    pub fn get_sample_rate(&self) -> u32 {
        self.sample_rate()
    }

    pub fn get_bits_per_sample(&self) -> u16 {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .format()
            .bits_per_sample
    }

    pub fn get_data_size(&self) -> u64 {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .format()
            .data_size
    }

    pub fn get_filename(&self) -> &Path {
        &self.filename
    }

    /// Duration in seconds, computed as `data_size / (rate * channels *
    /// bits/8)` on the topmost stage's reported format.
    pub fn get_duration(&self) -> f64 {
        self.engine
            .chain()
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .format()
            .duration_secs()
    }
}
