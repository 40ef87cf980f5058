//! # Spectral Estimator
//!
//! Turns one frame of mono samples into a dominant-frequency estimate by
//! picking the strongest bin of a Hann-windowed magnitude spectrum.
//!
//! ## Features
//! - FFT planned once with RustFFT, window and scratch buffers pre-allocated
//! - DC offset removal and Hann windowing before the transform
//! - Configurable noise gate (see [`NoiseGate`])
//! - Optional parabolic refinement for sub-bin estimates
//!
//! Without refinement the result is quantized to `sample_rate / fft_size` Hz,
//! so the estimation error is at most half a bin.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::frame::SampleFrame;

/// Policy deciding whether the strongest bin is a tone or just noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseGate {
    /// The peak must reach `fraction` of the spectrum's maximum magnitude.
    ///
    /// The peak *is* the maximum, so this only rejects spectra without any
    /// energy at all. Kept for callers that want the ungated behavior.
    PeakFraction { fraction: f32 },
    /// The peak must be at least `ratio` times the mean bin magnitude.
    ///
    /// A windowed sinusoid sits orders of magnitude above its mean bin, while
    /// broadband noise or clicks spread their energy over the whole spectrum.
    MeanRatio { ratio: f32 },
}

impl Default for NoiseGate {
    fn default() -> Self {
        NoiseGate::MeanRatio { ratio: 10.0 }
    }
}

impl NoiseGate {
    /// Returns `true` if a peak of magnitude `peak` passes the gate for the given spectrum.
    pub fn admits(&self, peak: f32, magnitudes: &[f32]) -> bool {
        // Also rejects NaN.
        if !(peak > 0.0) || magnitudes.is_empty() {
            return false;
        }
        match *self {
            NoiseGate::PeakFraction { fraction } => {
                let max = magnitudes.iter().copied().fold(0.0_f32, f32::max);
                peak >= max * fraction
            }
            NoiseGate::MeanRatio { ratio } => {
                let mean = magnitudes.iter().sum::<f32>() / magnitudes.len() as f32;
                peak >= mean * ratio
            }
        }
    }
}

/// How the peak bin is turned into a frequency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refinement {
    /// Report the center frequency of the peak bin.
    #[default]
    None,
    /// Fit a parabola through the log magnitudes of the peak and its neighbours.
    Parabolic,
}

/// Frequency estimator for fixed-size frames.
///
/// All buffers are sized in [`SpectralEstimator::new`]; [`estimate`](Self::estimate)
/// only overwrites them, so it can run on the capture callback.
pub struct SpectralEstimator {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    gate: NoiseGate,
    refinement: Refinement,
}

impl fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("fft_size", &self.fft_size)
            .field("gate", &self.gate)
            .field("refinement", &self.refinement)
            .finish_non_exhaustive()
    }
}

impl SpectralEstimator {
    /// Creates an estimator for frames of `fft_size` samples.
    ///
    /// # Panics
    /// * If `fft_size` is not a power of two of at least 4
    pub fn new(fft_size: usize) -> Self {
        assert!(
            fft_size >= 4 && fft_size.is_power_of_two(),
            "FFT size must be a power of two >= 4, got {fft_size}"
        );

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft_size,
            fft,
            window: hann_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![0.0; fft_size / 2],
            gate: NoiseGate::default(),
            refinement: Refinement::None,
        }
    }

    pub fn with_gate(mut self, gate: NoiseGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_refinement(mut self, refinement: Refinement) -> Self {
        self.refinement = refinement;
        self
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn gate(&self) -> NoiseGate {
        self.gate
    }

    /// Width of one spectrum bin in Hz.
    pub fn bin_width(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.fft_size as f32
    }

    /// Magnitude spectrum of the last analysed frame (`fft_size / 2` bins).
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Estimates the dominant frequency of `frame`.
    pub fn estimate(&mut self, frame: &SampleFrame) -> Option<f32> {
        self.estimate_samples(frame.samples(), frame.sample_rate())
    }

    /// Estimates the dominant frequency of the first `fft_size` samples.
    ///
    /// # Returns
    /// * `Some(frequency)` - Frequency of the strongest bin in Hz
    /// * `None` - Too few samples, zero sample rate, or the peak failed the noise gate
    pub fn estimate_samples(&mut self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        if samples.len() < self.fft_size || sample_rate == 0 {
            return None;
        }
        let input = &samples[..self.fft_size];

        let mean = input.iter().sum::<f32>() / self.fft_size as f32;
        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(input).zip(&self.window) {
            *slot = Complex::new((sample - mean) * w, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (mag, c) in self.magnitudes.iter_mut().zip(&self.buffer) {
            *mag = c.norm();
        }

        // Strictly greater keeps the lowest bin on ties.
        let mut peak_bin = 0;
        let mut peak = f32::MIN;
        for (i, &mag) in self.magnitudes.iter().enumerate() {
            if mag > peak {
                peak = mag;
                peak_bin = i;
            }
        }

        if !self.gate.admits(peak, &self.magnitudes) {
            return None;
        }

        let bin = match self.refinement {
            Refinement::None => peak_bin as f32,
            Refinement::Parabolic => parabolic_peak(&self.magnitudes, peak_bin),
        };
        Some(bin * sample_rate as f32 / self.fft_size as f32)
    }
}

/// Hann window of length `n`: `w[i] = 0.5 * (1 - cos(2*pi*i / (n - 1)))`.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Interpolated peak position (in bins) from the log magnitudes around `peak_bin`.
///
/// Falls back to `peak_bin` at the spectrum edges or when a neighbour is silent.
fn parabolic_peak(magnitudes: &[f32], peak_bin: usize) -> f32 {
    if peak_bin == 0 || peak_bin + 1 >= magnitudes.len() {
        return peak_bin as f32;
    }

    let y1 = magnitudes[peak_bin - 1].ln();
    let y2 = magnitudes[peak_bin].ln();
    let y3 = magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return peak_bin as f32;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return peak_bin as f32;
    }

    let shift = (y3 - y1) / (2.0 * denominator);
    peak_bin as f32 + shift.clamp(-0.5, 0.5)
}
