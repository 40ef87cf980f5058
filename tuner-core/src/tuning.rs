//! # Musical Tuning Module
//!
//! Maps a frequency onto the 12-tone equal-tempered scale under an adjustable
//! reference pitch, and classifies the deviation against a tolerance.
//!
//! The note that matches the reference pitch exactly is `A4`. Quantization
//! uses `f32::round`, so a frequency exactly half-way between two notes goes
//! to the note further from the reference (ties round away from zero).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semitones between C and A within an octave; anchors the reference to `A`.
const REFERENCE_OFFSET_FROM_C: i32 = 9;

/// The twelve pitch classes, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Position within the octave, `C = 0` .. `B = 11`.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C♯",
            PitchClass::D => "D",
            PitchClass::DSharp => "D♯",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F♯",
            PitchClass::G => "G",
            PitchClass::GSharp => "G♯",
            PitchClass::A => "A",
            PitchClass::ASharp => "A♯",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pitch class of the note `note_index` semitones away from the reference.
///
/// Uses a Euclidean remainder, so negative indices wrap to `0..12`.
pub fn pitch_class_for(note_index: i32) -> PitchClass {
    let idx = (note_index + REFERENCE_OFFSET_FROM_C).rem_euclid(12);
    PitchClass::ALL[idx as usize]
}

/// Octave of the note `note_index` semitones away from the reference.
///
/// Octaves change at C and the reference itself sits in octave 4.
/// Uses floor division, so e.g. index `-10` (the B below) is octave 3.
pub fn octave_for(note_index: i32) -> i32 {
    (note_index + REFERENCE_OFFSET_FROM_C).div_euclid(12) + 4
}

/// Frequency of the note `semitones` away from `reference_pitch` in equal temperament.
pub fn equal_tempered_frequency(reference_pitch: f32, semitones: i32) -> f32 {
    reference_pitch * 2.0_f32.powf(semitones as f32 / 12.0)
}

/// Deviation of `freq` from `target_freq` in cents (positive = sharp).
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// A frequency quantized to the nearest equal-tempered note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MusicalNote {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Semitones from the reference pitch.
    pub note_index: i32,
    /// Exact frequency of the quantized note.
    pub frequency: f32,
    /// Deviation of the measured frequency from `frequency`, in `[-50, 50]`.
    pub cents: f32,
}

impl MusicalNote {
    /// Name with octave, e.g. `"A4"` or `"C♯3"`.
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Tuning status of this note for the given tolerance.
    pub fn status(&self, tolerance: f32) -> TuningStatus {
        TuningStatus::from_cents(self.cents, tolerance)
    }
}

impl fmt::Display for MusicalNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

/// Quantizes `freq` to the nearest note under `reference_pitch`.
///
/// # Returns
/// * `Some(note)` - Nearest note and the cents deviation from it
/// * `None` - `freq` or `reference_pitch` is not a positive, finite frequency
pub fn to_note(freq: f32, reference_pitch: f32) -> Option<MusicalNote> {
    if !(freq > 0.0 && freq.is_finite() && reference_pitch > 0.0 && reference_pitch.is_finite()) {
        return None;
    }

    let semitones = 12.0 * (freq / reference_pitch).log2();
    let rounded = semitones.round();
    let cents = (semitones - rounded) * 100.0;
    let note_index = rounded as i32;

    Some(MusicalNote {
        pitch_class: pitch_class_for(note_index),
        octave: octave_for(note_index),
        note_index,
        frequency: equal_tempered_frequency(reference_pitch, note_index),
        cents,
    })
}

/// [`to_note`] together with the note's status under `tolerance`.
pub fn classify(freq: f32, reference_pitch: f32, tolerance: f32) -> Option<(MusicalNote, TuningStatus)> {
    to_note(freq, reference_pitch).map(|note| (note, note.status(tolerance)))
}

/// How a measured pitch relates to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TuningStatus {
    InTune,
    Sharp,
    Flat,
    /// No string of the selected instrument is close to the pitch.
    OutOfRange,
}

impl TuningStatus {
    /// Classifies a deviation: in tune when `|cents| <= tolerance`.
    ///
    /// Never yields [`TuningStatus::OutOfRange`]; that depends on string matching.
    pub fn from_cents(cents: f32, tolerance: f32) -> Self {
        if cents.abs() <= tolerance {
            TuningStatus::InTune
        } else if cents > 0.0 {
            TuningStatus::Sharp
        } else {
            TuningStatus::Flat
        }
    }

    /// Short glyph for meters and terminal output.
    pub fn symbol(self) -> &'static str {
        match self {
            TuningStatus::InTune => "●",
            TuningStatus::Sharp => "▲",
            TuningStatus::Flat => "▼",
            TuningStatus::OutOfRange => "–",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            TuningStatus::InTune => "in tune",
            TuningStatus::Sharp => "sharp",
            TuningStatus::Flat => "flat",
            TuningStatus::OutOfRange => "out of range",
        }
    }
}

impl fmt::Display for TuningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
