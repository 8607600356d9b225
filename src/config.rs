//! Process-wide configuration.
//!
//! The only process-wide knob the library exposes is the MIDI SoundFont
//! path. It is a lazily-initialized, mutex-guarded singleton:
//! mutating it does not retroactively affect MIDI decoders that were
//! already constructed.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

fn sound_font_slot() -> &'static Mutex<Option<PathBuf>> {
    static SLOT: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Sets the process-wide SoundFont path used by MIDI decoders constructed
/// *after* this call. Existing MIDI decoders are unaffected.
pub fn set_sound_font(path: impl AsRef<Path>) {
    let mut slot = sound_font_slot()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner());
    *slot = Some(path.as_ref().to_path_buf());
}

/// Returns the currently configured SoundFont path, if any.
pub fn get_sound_font() -> Option<PathBuf> {
    sound_font_slot()
        .lock()
        .unwrap_or_else(|poison| poison.into_inner())
        .clone()
}
