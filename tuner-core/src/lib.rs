// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate estimates the pitch of incoming audio frames and maps it onto
//! notes, cents and instrument strings. It is completely headless
//! and contains no GUI code.
//!
//! Data flow:
//!
//! ```text
//! samples -> FrameAssembler -> SpectralEstimator -> PlausibleRange
//!         -> LatestFrequency (single slot) -> TuningSession -> snapshot / recommendation
//! ```
//!
//! Live microphone capture is behind the `capture` feature.

#[cfg(feature = "capture")]
pub mod audio;
pub mod config;
pub mod engine;
pub mod fft;
pub mod frame;
pub mod handoff;
pub mod instrument;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use config::{SilencePolicy, TunerSettings, TuningConfiguration};
pub use engine::{FrameSink, Tuner};
pub use fft::{NoiseGate, Refinement, SpectralEstimator};
pub use frame::SampleFrame;
pub use instrument::{Instrument, InstrumentString};
pub use pitch::{PitchTracker, PlausibleRange};
pub use session::{SessionState, Subscription, TuningSession, TuningSnapshot};
pub use tuning::{MusicalNote, PitchClass, TuningStatus};
