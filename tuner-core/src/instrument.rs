//! # Instruments
//!
//! Built-in string tables and the matcher that picks the string a played
//! frequency most likely belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::tuning::equal_tempered_frequency;

/// Semitones on either side of a string's target that still count as that string.
pub const MATCH_WINDOW_SEMITONES: i32 = 3;

/// One string of an instrument in standard tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstrumentString {
    pub name: &'static str,
    /// Semitones from the reference pitch (A4).
    pub semitone_offset: i32,
    /// Conventional string number, for display only.
    pub index: u8,
}

impl InstrumentString {
    pub const fn new(name: &'static str, semitone_offset: i32, index: u8) -> Self {
        Self {
            name,
            semitone_offset,
            index,
        }
    }

    /// Target frequency of the open string under `reference_pitch`.
    pub fn target_frequency(&self, reference_pitch: f32) -> f32 {
        equal_tempered_frequency(reference_pitch, self.semitone_offset)
    }

    /// Inclusive band of frequencies attributed to this string.
    pub fn match_window(&self, reference_pitch: f32) -> (f32, f32) {
        let target = self.target_frequency(reference_pitch);
        let edge = 2.0_f32.powf(MATCH_WINDOW_SEMITONES as f32 / 12.0);
        (target / edge, target * edge)
    }
}

impl fmt::Display for InstrumentString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (string {})", self.name, self.index)
    }
}

/// Standard guitar tuning, lowest string first.
pub const GUITAR_STRINGS: [InstrumentString; 6] = [
    InstrumentString::new("E2", -29, 6),
    InstrumentString::new("A2", -24, 5),
    InstrumentString::new("D3", -19, 4),
    InstrumentString::new("G3", -14, 3),
    InstrumentString::new("B3", -10, 2),
    InstrumentString::new("E4", -5, 1),
];

/// Standard re-entrant ukulele tuning (G-C-E-A), in playing order.
pub const UKULELE_STRINGS: [InstrumentString; 4] = [
    InstrumentString::new("G4", -2, 4),
    InstrumentString::new("C4", -9, 3),
    InstrumentString::new("E4", -5, 2),
    InstrumentString::new("A4", 0, 1),
];

/// Instruments with a built-in string table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    #[default]
    Guitar,
    Ukulele,
}

impl Instrument {
    pub const ALL: [Instrument; 2] = [Instrument::Guitar, Instrument::Ukulele];

    pub fn strings(self) -> &'static [InstrumentString] {
        match self {
            Instrument::Guitar => &GUITAR_STRINGS,
            Instrument::Ukulele => &UKULELE_STRINGS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Guitar => "guitar",
            Instrument::Ukulele => "ukulele",
        }
    }

    /// Closest string of this instrument to `freq`. See [`match_among`].
    pub fn match_string(self, freq: f32, reference_pitch: f32) -> Option<InstrumentString> {
        match_among(self.strings(), freq, reference_pitch)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownInstrument(pub String);

impl fmt::Display for UnknownInstrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown instrument '{}' (expected guitar or ukulele)", self.0)
    }
}

impl std::error::Error for UnknownInstrument {}

impl FromStr for Instrument {
    type Err = UnknownInstrument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guitar" => Ok(Instrument::Guitar),
            "ukulele" | "uke" => Ok(Instrument::Ukulele),
            other => Err(UnknownInstrument(other.to_string())),
        }
    }
}

/// Relative difference below which two string distances are treated as equal.
///
/// Well above `f32` rounding at string midpoints, far below any musically
/// meaningful difference (a few thousandths of a cent).
pub const TIE_TOLERANCE: f32 = 1e-5;

/// Finds the string whose target frequency is closest to `freq`.
///
/// Only strings whose ±3 semitone window contains `freq` (bounds inclusive)
/// are candidates. On equal distance the string listed first wins, so the
/// result is deterministic for a given table order. Distances within
/// [`TIE_TOLERANCE`] of each other (relative) count as equal, so rounding
/// at a midpoint between two targets cannot favour the later string.
///
/// # Returns
/// * `Some(string)` - Closest candidate string
/// * `None` - `freq` is outside every string's window
pub fn match_among(
    strings: &[InstrumentString],
    freq: f32,
    reference_pitch: f32,
) -> Option<InstrumentString> {
    let mut best: Option<(InstrumentString, f32)> = None;

    for string in strings {
        let (low, high) = string.match_window(reference_pitch);
        if freq < low || freq > high {
            continue;
        }
        let distance = (string.target_frequency(reference_pitch) - freq).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance * (1.0 - TIE_TOLERANCE) => {}
            _ => best = Some((*string, distance)),
        }
    }

    best.map(|(string, _)| string)
}
