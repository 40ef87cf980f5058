//! Terminal rendering of tuner readings.

use tuner_core::{Instrument, SessionState, TuningSnapshot, TuningStatus};

/// Width of the cent meter in characters, centre included.
const METER_WIDTH: usize = 21;

/// One-line readout, e.g. `110.4 Hz  A2  +5.6¢  [---------●---------]  ●  A2 is in tune`.
pub fn format_reading(snapshot: &TuningSnapshot) -> String {
    let note = match (snapshot.state, snapshot.note) {
        (SessionState::Detected, Some(note)) => note,
        _ => return "listening...".to_string(),
    };
    let status = snapshot.status.unwrap_or(TuningStatus::OutOfRange);

    let advice = match status {
        TuningStatus::OutOfRange => format!("no {} string nearby", snapshot.instrument),
        TuningStatus::InTune | TuningStatus::Sharp | TuningStatus::Flat => {
            snapshot.recommendation.clone().unwrap_or_default()
        }
    };

    format!(
        "{:>7.1} Hz  {:<4} {:>+6.1}¢  {}  {}  {}",
        snapshot.frequency,
        note.to_string(),
        note.cents,
        cent_meter(note.cents),
        status.symbol(),
        advice
    )
}

/// ASCII meter spanning -50..=+50 cents.
pub fn cent_meter(cents: f32) -> String {
    let half = (METER_WIDTH / 2) as f32;
    let offset = (cents.clamp(-50.0, 50.0) / 50.0 * half).round() as i32;
    let pos = (half as i32 + offset) as usize;
    let body: String = (0..METER_WIDTH)
        .map(|i| if i == pos { '●' } else if i == METER_WIDTH / 2 { '|' } else { '-' })
        .collect();
    format!("[{body}]")
}

/// Table of strings and their targets under `reference_pitch`.
pub fn format_strings(instrument: Instrument, reference_pitch: f32) -> String {
    let mut out = format!("{instrument} (A4 = {reference_pitch} Hz)\n");
    for string in instrument.strings() {
        out.push_str(&format!(
            "  string {}  {:<3} {:>8.2} Hz\n",
            string.index,
            string.name,
            string.target_frequency(reference_pitch)
        ));
    }
    out
}
