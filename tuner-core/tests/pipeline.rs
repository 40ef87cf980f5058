//! End-to-end: synthetic audio through the capture pipeline into the session.

use approx::assert_abs_diff_eq;
use std::f32::consts::PI;
use std::thread;
use tuner_core::{
    Instrument, NoiseGate, SessionState, SilencePolicy, Tuner, TunerSettings, TuningStatus,
};

const SR: u32 = 44_100;

fn sine(freq: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.4 * (2.0 * PI * freq * i as f32 / SR as f32).sin())
        .collect()
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fine_settings() -> TunerSettings {
    TunerSettings {
        fft_size: 16_384,
        ..TunerSettings::default()
    }
}

#[test]
fn guitar_strings_are_recognised_from_audio() {
    init_logging();
    let tuner = Tuner::new(fine_settings());
    let mut sink = tuner.frame_sink(SR);
    let bin = SR as f32 / 16_384.0;

    for string in Instrument::Guitar.strings() {
        let target = string.target_frequency(440.0);
        assert_eq!(sink.push(&sine(target, 16_384)), 1);
        assert!(tuner.poll());

        let snap = tuner.snapshot();
        assert_eq!(snap.state, SessionState::Detected);
        assert_eq!(snap.matched_string.map(|s| s.name), Some(string.name));
        assert_eq!(snap.note.map(|n| n.name()), Some(string.name.to_string()));
        assert!((snap.frequency - target).abs() <= bin / 2.0 + 1e-3);
    }
}

#[test]
fn partial_frames_do_not_publish() {
    let tuner = Tuner::default();
    let mut sink = tuner.frame_sink(SR);
    let tone = sine(220.0, 4096);

    assert_eq!(sink.push(&tone[..1000]), 0);
    assert!(!tuner.poll());
    assert_eq!(sink.push(&tone[1000..]), 1);
    assert!(tuner.poll());
}

#[test]
fn out_of_band_audio_is_no_signal() {
    let tuner = Tuner::new(TunerSettings {
        silence: SilencePolicy::Clear,
        ..TunerSettings::default()
    });
    let mut sink = tuner.frame_sink(SR);

    sink.push(&sine(110.0, 4096));
    tuner.poll();
    assert_eq!(tuner.snapshot().state, SessionState::Detected);

    // 3 kHz is outside [60, 2000) Hz.
    sink.push(&sine(3000.0, 4096));
    assert!(tuner.poll());
    let snap = tuner.snapshot();
    assert_eq!(snap.state, SessionState::Idle);
    assert_eq!(snap.frequency, 0.0);
}

#[test]
fn retain_policy_keeps_last_reading_through_silence() {
    let tuner = Tuner::default();
    let mut sink = tuner.frame_sink(SR);
    sink.push(&sine(110.0, 4096));
    tuner.poll();

    sink.push(&vec![0.0; 4096]);
    assert!(!tuner.poll());
    assert_eq!(tuner.snapshot().state, SessionState::Detected);
}

#[test]
fn gate_choice_decides_whether_a_click_registers() {
    let mut click = vec![0.0; 4096];
    click[2048] = 1.0;

    let gated = Tuner::new(TunerSettings {
        silence: SilencePolicy::Clear,
        ..TunerSettings::default()
    });
    gated.frame_sink(SR).push(&click);
    gated.poll();
    assert_eq!(gated.snapshot().state, SessionState::Idle);

    let literal = Tuner::new(TunerSettings {
        noise_gate: NoiseGate::PeakFraction { fraction: 0.1 },
        plausible_range: tuner_core::PlausibleRange {
            min_hz: 0.0,
            max_hz: 22_050.0,
        },
        ..TunerSettings::default()
    });
    literal.frame_sink(SR).push(&click);
    assert!(literal.poll());
}

#[test]
fn reference_change_applies_before_next_frame() {
    let tuner = Tuner::new(fine_settings());
    let mut sink = tuner.frame_sink(SR);
    sink.push(&sine(110.0, 16_384));
    tuner.poll();
    let before = tuner.snapshot().note.unwrap();

    tuner.set_reference_pitch(449.0);
    let after = tuner.snapshot().note.unwrap();
    assert_eq!(after.name(), "A2");
    assert_abs_diff_eq!(after.frequency, 112.25, epsilon = 1e-3);
    assert!(after.cents < before.cents - 30.0);
    assert_eq!(tuner.snapshot().status, Some(TuningStatus::Flat));
}

#[test]
fn instrument_switch_ignores_pending_reading() {
    let tuner = Tuner::default();
    tuner.on_frequency(440.0);
    assert_eq!(tuner.snapshot().status, Some(TuningStatus::OutOfRange));

    tuner.select_instrument(Instrument::Ukulele);
    let snap = tuner.snapshot();
    assert_eq!(snap.state, SessionState::Idle);
    assert!(snap.matched_string.is_none());

    tuner.on_frequency(440.0);
    assert_eq!(tuner.snapshot().status, Some(TuningStatus::InTune));
}

#[test]
fn stop_wins_against_a_concurrent_capture_thread() {
    init_logging();
    let tuner = Tuner::default();
    let mut sink = tuner.frame_sink(SR);
    let tone = sine(196.0, 4096);

    let capture = thread::spawn(move || {
        for _ in 0..20 {
            sink.push(&tone);
        }
    });

    for _ in 0..20 {
        tuner.poll();
    }
    tuner.stop();
    capture.join().unwrap();

    // Everything the old sink wrote belongs to the previous epoch.
    assert!(!tuner.poll());
    let snap = tuner.snapshot();
    assert_eq!(snap.state, SessionState::Idle);
    assert_eq!(snap.frequency, 0.0);
}

#[test]
fn subscription_follows_polls() {
    let tuner = Tuner::default();
    let sub = tuner.subscribe();
    assert_eq!(sub.try_latest().unwrap().state, SessionState::Idle);

    tuner.producer().publish(329.63);
    tuner.poll();
    let snap = sub.try_latest().unwrap();
    assert_eq!(snap.matched_string.unwrap().name, "E4");
}
