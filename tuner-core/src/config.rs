//! # Tuner Configuration
//!
//! Reference pitch and tolerance with clamped setters, plus the serializable
//! settings bundle that front ends load and save.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::fft::{NoiseGate, Refinement};
use crate::frame::DEFAULT_FRAME_SIZE;
use crate::instrument::Instrument;
use crate::pitch::PlausibleRange;

pub const REFERENCE_PITCH_RANGE: RangeInclusive<f32> = 431.0..=449.0;
pub const TOLERANCE_RANGE: RangeInclusive<f32> = 10.0..=100.0;

pub const DEFAULT_REFERENCE_PITCH: f32 = 440.0;
pub const DEFAULT_TOLERANCE: f32 = 10.0;

/// Smallest and largest FFT sizes accepted from settings.
pub const FFT_SIZE_RANGE: RangeInclusive<usize> = 1024..=32768;

/// Clamps `value` into `range`; NaN maps to the lower bound.
fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        return *range.start();
    }
    value.clamp(*range.start(), *range.end())
}

/// Reference pitch and tolerance. Both always lie within their closed ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConfiguration", into = "RawConfiguration")]
pub struct TuningConfiguration {
    reference_pitch: f32,
    tolerance: f32,
}

impl Default for TuningConfiguration {
    fn default() -> Self {
        Self {
            reference_pitch: DEFAULT_REFERENCE_PITCH,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl TuningConfiguration {
    pub fn new(reference_pitch: f32, tolerance: f32) -> Self {
        let mut config = Self::default();
        config.set_reference_pitch(reference_pitch);
        config.set_tolerance(tolerance);
        config
    }

    /// Frequency of A4 in Hz.
    pub fn reference_pitch(&self) -> f32 {
        self.reference_pitch
    }

    /// Half-width of the in-tune band, in cents.
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// Stores `value` clamped to [`REFERENCE_PITCH_RANGE`] and returns what was stored.
    pub fn set_reference_pitch(&mut self, value: f32) -> f32 {
        self.reference_pitch = clamp_to(value, &REFERENCE_PITCH_RANGE);
        self.reference_pitch
    }

    /// Stores `value` clamped to [`TOLERANCE_RANGE`] and returns what was stored.
    pub fn set_tolerance(&mut self, value: f32) -> f32 {
        self.tolerance = clamp_to(value, &TOLERANCE_RANGE);
        self.tolerance
    }
}

#[derive(Serialize, Deserialize)]
struct RawConfiguration {
    #[serde(default = "default_reference_pitch")]
    reference_pitch: f32,
    #[serde(default = "default_tolerance")]
    tolerance: f32,
}

fn default_reference_pitch() -> f32 {
    DEFAULT_REFERENCE_PITCH
}

fn default_tolerance() -> f32 {
    DEFAULT_TOLERANCE
}

impl From<RawConfiguration> for TuningConfiguration {
    fn from(raw: RawConfiguration) -> Self {
        TuningConfiguration::new(raw.reference_pitch, raw.tolerance)
    }
}

impl From<TuningConfiguration> for RawConfiguration {
    fn from(config: TuningConfiguration) -> Self {
        RawConfiguration {
            reference_pitch: config.reference_pitch,
            tolerance: config.tolerance,
        }
    }
}

/// What the engine does with frames that carry no usable pitch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilencePolicy {
    /// Keep showing the last reading.
    #[default]
    Retain,
    /// Clear the reading as if a zero frequency had arrived.
    Clear,
}

/// Everything a front end persists between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    #[serde(flatten)]
    pub tuning: TuningConfiguration,
    pub instrument: Instrument,
    pub fft_size: usize,
    pub noise_gate: NoiseGate,
    pub refinement: Refinement,
    pub plausible_range: PlausibleRange,
    pub silence: SilencePolicy,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            tuning: TuningConfiguration::default(),
            instrument: Instrument::default(),
            fft_size: DEFAULT_FRAME_SIZE,
            noise_gate: NoiseGate::default(),
            refinement: Refinement::default(),
            plausible_range: PlausibleRange::default(),
            silence: SilencePolicy::default(),
        }
    }
}

impl TunerSettings {
    /// FFT size rounded up to a power of two and clamped to [`FFT_SIZE_RANGE`].
    pub fn normalized_fft_size(&self) -> usize {
        self.fft_size
            .clamp(*FFT_SIZE_RANGE.start(), *FFT_SIZE_RANGE.end())
            .next_power_of_two()
    }
}
