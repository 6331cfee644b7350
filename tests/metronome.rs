use approx::assert_abs_diff_eq;
use crossbeam::channel;
use cuebeat::audio::{CLICK_QUEUE_CAPACITY, ClickSynthesizer};
use cuebeat::config::MetronomeSettings;
use cuebeat::metronome::TapTempoSettings;
use cuebeat::{Config, Metronome, MetronomeEvent, TimeSignature};
use std::thread;
use std::time::{Duration, Instant};

fn silent(bpm: f64, signature: TimeSignature) -> Metronome {
    let settings = MetronomeSettings {
        bpm,
        signature,
        muted: false,
    };
    Metronome::new(&settings, TapTempoSettings::default(), ClickSynthesizer::silent())
}

#[test]
fn test_defaults_from_config() {
    let metronome = Metronome::from_config(&Config::default(), ClickSynthesizer::silent());
    assert_eq!(metronome.bpm(), 100.0);
    assert_eq!(metronome.signature(), TimeSignature::EightBeat);
    assert_eq!(metronome.current_beat(), 1);
    assert!(!metronome.is_running());
    assert!(!metronome.is_muted());
    assert!(!metronome.audio_connected());
}

#[test]
fn test_start_stop_cycle() {
    let metronome = silent(300.0, TimeSignature::EightBeat);
    metronome.start();
    assert!(metronome.is_running());
    assert!(metronome.has_tick_source());

    thread::sleep(Duration::from_millis(450));
    metronome.stop();
    let stopped_on = metronome.current_beat();
    // 450 ms at 200 ms per beat: two or three beats past the downbeat
    assert!((2..=4).contains(&stopped_on), "stopped on {}", stopped_on);

    assert!(!metronome.is_running());
    assert!(!metronome.has_tick_source());

    thread::sleep(Duration::from_millis(300));
    assert_eq!(metronome.current_beat(), stopped_on);

    metronome.stop();
    assert!(!metronome.is_running());
    assert_eq!(metronome.current_beat(), stopped_on);
}

#[test]
fn test_restart_returns_to_downbeat() {
    let metronome = silent(300.0, TimeSignature::EightBeat);
    metronome.start();
    thread::sleep(Duration::from_millis(450));
    metronome.start();
    assert_eq!(metronome.current_beat(), 1);
    assert!(metronome.is_running());
    metronome.stop();
}

#[test]
fn test_tempo_change_keeps_phase() {
    let metronome = silent(120.0, TimeSignature::EightBeat);
    let before = Instant::now();
    metronome.start();
    thread::sleep(Duration::from_millis(1250));
    metronome.set_bpm(90.0);
    let beat = metronome.current_beat();
    let after = Instant::now();

    // The beat must equal floor(elapsed / new_beat) + 1 for some elapsed
    // within the measured window.
    let elapsed_max = after.duration_since(before).as_secs_f64() * 1000.0;
    let lowest = (1250.0 / (60_000.0 / 90.0)) as u32 + 1;
    let highest = (elapsed_max / (60_000.0 / 90.0)) as u32 + 1;
    metronome.stop();

    assert!(
        (lowest..=highest.max(lowest)).contains(&beat),
        "beat {} outside {}..={}",
        beat,
        lowest,
        highest
    );
    assert_eq!(metronome.bpm(), 90.0);
}

#[test]
fn test_bpm_bounds() {
    let metronome = silent(100.0, TimeSignature::EightBeat);
    metronome.set_bpm(1000.0);
    assert_eq!(metronome.bpm(), 300.0);
    metronome.set_bpm(10.0);
    assert_eq!(metronome.bpm(), 40.0);
    metronome.set_bpm(-5.0);
    assert_eq!(metronome.bpm(), 40.0);
    metronome.set_bpm(f64::NAN);
    assert_eq!(metronome.bpm(), 40.0);

    metronome.set_bpm_text("132.456");
    assert_abs_diff_eq!(metronome.bpm(), 132.46, epsilon = 1e-9);
    metronome.set_bpm_text("fast");
    assert_abs_diff_eq!(metronome.bpm(), 132.46, epsilon = 1e-9);
}

#[test]
fn test_typed_entry() {
    let metronome = silent(100.0, TimeSignature::EightBeat);
    assert_eq!(metronome.enter_bpm("35"), Ok(35.0));
    assert_eq!(metronome.bpm(), 35.0);
    assert_eq!(metronome.enter_bpm("140.9"), Ok(140.0));
    assert!(metronome.enter_bpm("").is_err());
    assert_eq!(metronome.bpm(), 140.0);
}

#[test]
fn test_tap_tempo_sets_bpm() {
    let metronome = silent(100.0, TimeSignature::EightBeat);
    let start = Instant::now();
    for i in 0..4 {
        metronome.tap_tempo_at(start + Duration::from_millis(i * 400));
    }
    assert_abs_diff_eq!(metronome.bpm(), 150.0, epsilon = 0.5);
    assert_eq!(metronome.tap_count(), 4);
}

#[test]
fn test_flamenco_accent_tapping_is_scaled() {
    let metronome = silent(100.0, TimeSignature::Flamenco12);
    let start = Instant::now();
    // Six steady taps at 240 BPM read as accents only
    for i in 0..6 {
        metronome.tap_tempo_at(start + Duration::from_millis(i * 250));
    }
    assert_abs_diff_eq!(metronome.bpm(), 144.0, epsilon = 0.5);

    let metronome = silent(100.0, TimeSignature::EightBeat);
    for i in 0..6 {
        metronome.tap_tempo_at(start + Duration::from_millis(i * 250));
    }
    assert_abs_diff_eq!(metronome.bpm(), 240.0, epsilon = 0.5);
}

#[test]
fn test_toggle_signature_and_mute() {
    let metronome = silent(100.0, TimeSignature::EightBeat);
    assert_eq!(metronome.toggle_signature(), TimeSignature::Flamenco12);
    assert_eq!(metronome.signature_config().cycle_length, 12);
    assert_eq!(metronome.toggle_signature(), TimeSignature::EightBeat);

    assert!(metronome.toggle_mute());
    assert!(metronome.is_muted());
    assert!(!metronome.toggle_mute());
}

#[test]
fn test_flamenco_starts_on_twelve() {
    let metronome = silent(100.0, TimeSignature::Flamenco12);
    metronome.set_current_beat(12);
    metronome.start();
    assert_eq!(metronome.current_beat(), 12);
    metronome.stop();
}

#[test]
fn test_audio_channel_connected() {
    let (synth, consumer) = ClickSynthesizer::channel(CLICK_QUEUE_CAPACITY);
    let metronome = Metronome::from_config(&Config::default(), synth);
    assert!(metronome.audio_connected());
    drop(consumer);
    assert!(!metronome.audio_connected());
}

#[test]
fn test_event_stream() {
    let metronome = silent(100.0, TimeSignature::EightBeat);
    let (sender, receiver) = channel::unbounded();
    metronome.set_event_sender(sender);

    metronome.set_bpm(120.0);
    metronome.toggle_mute();
    metronome.toggle_signature();

    let events: Vec<MetronomeEvent> = receiver.try_iter().collect();
    assert_eq!(
        events,
        vec![
            MetronomeEvent::BpmChanged(120.0),
            MetronomeEvent::MuteToggled(true),
            MetronomeEvent::SignatureChanged(TimeSignature::Flamenco12),
        ]
    );
}
