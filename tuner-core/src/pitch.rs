//! # Pitch Tracking
//!
//! Producer-side pipeline: spectral estimate followed by a plausibility
//! filter that keeps only frequencies a guitar or ukulele can produce.

use serde::{Deserialize, Serialize};

use crate::fft::SpectralEstimator;
use crate::frame::SampleFrame;

/// Half-open frequency band `[min_hz, max_hz)` accepted as a musical signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl PlausibleRange {
    /// Range used for the built-in string instruments.
    pub const INSTRUMENTS: PlausibleRange = PlausibleRange {
        min_hz: 60.0,
        max_hz: 2000.0,
    };

    pub fn contains(&self, freq: f32) -> bool {
        freq >= self.min_hz && freq < self.max_hz
    }

    /// Passes `freq` through when it lies inside the range.
    pub fn filter(&self, freq: f32) -> Option<f32> {
        self.contains(freq).then_some(freq)
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        Self::INSTRUMENTS
    }
}

/// Estimator plus plausibility filter, run once per captured frame.
#[derive(Debug)]
pub struct PitchTracker {
    estimator: SpectralEstimator,
    range: PlausibleRange,
}

impl PitchTracker {
    pub fn new(estimator: SpectralEstimator) -> Self {
        Self {
            estimator,
            range: PlausibleRange::default(),
        }
    }

    pub fn with_range(mut self, range: PlausibleRange) -> Self {
        self.range = range;
        self
    }

    pub fn fft_size(&self) -> usize {
        self.estimator.fft_size()
    }

    pub fn estimator(&self) -> &SpectralEstimator {
        &self.estimator
    }

    /// Frequency of `frame`, or `None` when there is no usable signal.
    pub fn track(&mut self, frame: &SampleFrame) -> Option<f32> {
        self.track_samples(frame.samples(), frame.sample_rate())
    }

    pub fn track_samples(&mut self, samples: &[f32], sample_rate: u32) -> Option<f32> {
        self.estimator
            .estimate_samples(samples, sample_rate)
            .and_then(|freq| self.range.filter(freq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, len: usize, sample_rate: u32) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn range_is_half_open() {
        let range = PlausibleRange::INSTRUMENTS;
        assert!(!range.contains(59.9));
        assert!(range.contains(60.0));
        assert!(range.contains(1999.9));
        assert!(!range.contains(2000.0));
        assert!(!range.contains(f32::NAN));
        assert_eq!(range.filter(440.0), Some(440.0));
        assert_eq!(range.filter(0.0), None);
    }

    #[test]
    fn tracker_drops_out_of_band_tones() {
        let mut tracker = PitchTracker::new(SpectralEstimator::new(4096));
        // Bin 4 at 44.1 kHz is ~43 Hz, below the band.
        let low = 4.0 * 44_100.0 / 4096.0;
        assert_eq!(tracker.track_samples(&sine(low, 4096, 44_100), 44_100), None);
        // ~3 kHz is above it.
        assert_eq!(tracker.track_samples(&sine(3000.0, 4096, 44_100), 44_100), None);

        let a2 = tracker.track_samples(&sine(110.0, 4096, 44_100), 44_100);
        assert!(a2.is_some_and(|f| (f - 110.0).abs() < 6.0));
    }

    #[test]
    fn custom_range_widens_the_band() {
        let mut tracker = PitchTracker::new(SpectralEstimator::new(4096)).with_range(PlausibleRange {
            min_hz: 20.0,
            max_hz: 5000.0,
        });
        let f = tracker.track(&SampleFrame::new(sine(3000.0, 4096, 44_100), 44_100));
        assert!(f.is_some_and(|f| (f - 3000.0).abs() < 6.0));
    }
}
