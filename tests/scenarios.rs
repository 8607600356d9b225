//! End-to-end scenario tests covering load/format reporting, the DSP
//! stage catalog, looping, and callback/timed-event behavior.

mod support;

use jukebox::container;
use jukebox::decoder::chain::DecoderChain;
use jukebox::decoder::stages::joint_stereo::JointStereo;
use jukebox::decoder::stages::resolution::SampleResolution;
use jukebox::{Container, Stage};

/// loading the canonical sine fixture reports the format it was
/// generated with.
#[test]
fn loads_canonical_sine_wav_and_reports_its_format() {
    let path = support::write_sine_wav("load_format");
    let container = container::open(&path).expect("container should open");
    let format = container.format();

    assert_eq!(format.channels, support::CHANNELS);
    assert_eq!(format.sample_rate, support::SAMPLE_RATE);
    assert_eq!(format.bits_per_sample, support::BITS_PER_SAMPLE);
    assert_eq!(format.data_size, support::EXPECTED_DATA_SIZE);
    approx::assert_relative_eq!(
        format.duration_secs(),
        support::DURATION_SECONDS,
        epsilon = 1e-6
    );

    let _ = std::fs::remove_file(&path);
}

/// `resolution(8)` halves the reported bit depth and, proportionally,
/// the advertised data size.
#[test]
fn resolution_to_8_bit_halves_depth_and_data_size() {
    let path = support::write_sine_wav("resolution");
    let container = container::open(&path).expect("container should open");
    let base = container.make_decoder().expect("base decoder");
    let original_size = base.data_size();
    let mut chain = DecoderChain::new(base);

    chain.wrap(|downstream| Box::new(SampleResolution::new(downstream, 8).unwrap()));

    assert_eq!(chain.format().bits_per_sample, 8);
    assert_eq!(chain.format().data_size, original_size / 2);

    let _ = std::fs::remove_file(&path);
}

/// `joint_stereo()` averages the left/right channels of each frame.
/// The fixture's left and right channels are identical (mono content
/// duplicated to stereo), so every averaged sample must equal the source.
#[test]
fn joint_stereo_averages_left_and_right() {
    let path = support::write_sine_wav("joint_stereo");
    let container = container::open(&path).expect("container should open");
    let base = container.make_decoder().expect("base decoder");
    let mut chain = DecoderChain::new(base);

    chain.wrap(|downstream| Box::new(JointStereo::new(downstream)));
    assert_eq!(chain.format().channels, 1);

    let mut buf = vec![0u8; 8];
    let got = chain.read_samples(&mut buf, 0, buf.len());
    assert!(got > 0);

    let pcm = support::sine_pcm_bytes();
    for frame in 0..(got / 2) {
        let averaged = i16::from_le_bytes([buf[frame * 2], buf[frame * 2 + 1]]);
        let expected = i16::from_le_bytes([pcm[frame * 4], pcm[frame * 4 + 1]]);
        assert_eq!(averaged, expected);
    }

    let _ = std::fs::remove_file(&path);
}

/// `fade(0, 1)` ramps the final second down to silence; the very last
/// frame of the stream must be silent (or within rounding of it), while an
/// early frame is untouched.
#[test]
fn fade_out_silences_the_final_frame() {
    use jukebox::decoder::stages::fade::Fade;

    let path = support::write_sine_wav("fade_out");
    let container = container::open(&path).expect("container should open");
    let base = container.make_decoder().expect("base decoder");
    let data_size = base.data_size();
    let mut chain = DecoderChain::new(base);

    chain.wrap(|downstream| Box::new(Fade::new(downstream, 0, support::SAMPLE_RATE as u64)));

    let frame_size = chain.frame_size() as u64;
    let last_frame_pos = data_size - frame_size;
    let mut buf = vec![0u8; frame_size as usize];
    let got = chain.read_samples(&mut buf, last_frame_pos, buf.len());
    assert_eq!(got as u64, frame_size);
    let left = i16::from_le_bytes([buf[0], buf[1]]);
    assert!(left.abs() < 50, "expected near-silence at stream end, got {left}");

    let _ = std::fs::remove_file(&path);
}

/// looping, then stopping, leaves the sound in `Stopped` and its
/// producer thread joins (via `Drop`) without hanging.
#[cfg(feature = "playback")]
#[test]
fn loop_then_stop_reaches_stopped_and_joins_promptly() {
    use jukebox::Sound;

    let path = support::write_sine_wav("loop_stop");
    let sound = Sound::load(&path).expect("sound should load");
    sound.r#loop(true).play();
    std::thread::sleep(std::time::Duration::from_millis(20));
    sound.stop();
    std::thread::sleep(std::time::Duration::from_millis(20));

    assert!(!sound.playing());
    drop(sound); // must join within this call, not hang.

    let _ = std::fs::remove_file(&path);
}

/// on-stop callbacks run most-recently-pushed-first.
#[cfg(feature = "playback")]
#[test]
fn on_stop_callbacks_fire_in_lifo_order() {
    use jukebox::Sound;
    use std::sync::{Arc, Mutex};

    let path = support::write_sine_wav("on_stop_lifo");
    let sound = Sound::load(&path).expect("sound should load");

    let order = Arc::new(Mutex::new(Vec::new()));
    let order_a = order.clone();
    let order_b = order.clone();
    sound.push_on_stop_callback(Box::new(move || order_a.lock().unwrap().push("a")));
    sound.push_on_stop_callback(Box::new(move || order_b.lock().unwrap().push("b")));

    sound.play();
    std::thread::sleep(std::time::Duration::from_millis(20));
    sound.stop();
    std::thread::sleep(std::time::Duration::from_millis(20));

    assert_eq!(*order.lock().unwrap(), vec!["b", "a"]);

    let _ = std::fs::remove_file(&path);
}

/// a timed event registered at 0.5s fires at most once within one
/// chunk period of playback reaching that position.
#[cfg(feature = "playback")]
#[test]
fn timed_event_fires_once_near_its_target_position() {
    use jukebox::Sound;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let path = support::write_sine_wav("timed_event");
    let sound = Sound::load(&path).expect("sound should load");

    let fired = Arc::new(AtomicUsize::new(0));
    let fired_cb = fired.clone();
    sound.add_timed_event_callback(0.5, Box::new(move || {
        fired_cb.fetch_add(1, Ordering::SeqCst);
    }));

    sound.set_position((support::EXPECTED_DATA_SIZE as f64 * 0.5) as u64);
    sound.play();
    std::thread::sleep(std::time::Duration::from_millis(100));
    sound.stop();
    std::thread::sleep(std::time::Duration::from_millis(20));

    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let _ = std::fs::remove_file(&path);
}
