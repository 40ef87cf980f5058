//! # Tuner Engine
//!
//! Wires the capture side (frames in, estimates out) to the control side
//! (session state) through the single-slot handoff.
//!
//! - **Capture path**: a [`FrameSink`] per stream assembles frames, runs the
//!   pitch tracker and publishes into the slot. It never locks.
//! - **Control loop**: [`Tuner::poll`] moves the latest estimate into the
//!   session under the session lock.
//! - **Presentation**: setters, [`Tuner::snapshot`] and [`Tuner::subscribe`]
//!   take the same lock, so they are atomic with respect to `poll`.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{SilencePolicy, TunerSettings, TuningConfiguration};
use crate::fft::SpectralEstimator;
use crate::frame::FrameAssembler;
use crate::handoff::{FrequencyProducer, LatestFrequency};
use crate::instrument::Instrument;
use crate::pitch::PitchTracker;
use crate::session::{Subscription, TuningSession, TuningSnapshot};

/// Capture-side pipeline for one audio stream.
#[derive(Debug)]
pub struct FrameSink {
    assembler: FrameAssembler,
    tracker: PitchTracker,
    producer: FrequencyProducer,
    sample_rate: u32,
    silence: SilencePolicy,
}

impl FrameSink {
    /// Rate the stream delivers samples at, in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples per analysed frame (the FFT size).
    pub fn frame_size(&self) -> usize {
        self.assembler.frame_size()
    }

    /// Feeds mono samples; every completed frame is analysed and published.
    ///
    /// Returns the number of frames analysed during this call.
    pub fn push(&mut self, data: &[f32]) -> usize {
        let Self {
            assembler,
            tracker,
            producer,
            sample_rate,
            silence,
        } = self;

        let mut frames = 0;
        assembler.push(data, |frame| {
            frames += 1;
            match tracker.track_samples(frame, *sample_rate) {
                Some(freq) => producer.publish(freq),
                None => match silence {
                    SilencePolicy::Retain => {}
                    SilencePolicy::Clear => producer.publish_silence(),
                },
            }
        });
        frames
    }
}

/// Shared tuner: one per capture session, passed by reference to every consumer.
#[derive(Debug)]
pub struct Tuner {
    settings: TunerSettings,
    latest: Arc<LatestFrequency>,
    session: Mutex<TuningSession>,
}

impl Default for Tuner {
    fn default() -> Self {
        Self::new(TunerSettings::default())
    }
}

impl Tuner {
    /// Creates an idle tuner from `settings`.
    ///
    /// # Arguments
    /// * `settings` - Initial configuration and instrument plus the analysis
    ///   parameters every [`FrameSink`] from this tuner is built with
    pub fn new(settings: TunerSettings) -> Self {
        let session = TuningSession::new(settings.tuning, settings.instrument);
        log::info!(
            "[ENGINE] Tuner ready: {} at A4 = {} Hz, tolerance {} cents, FFT {}",
            settings.instrument,
            settings.tuning.reference_pitch(),
            settings.tuning.tolerance(),
            settings.normalized_fft_size()
        );
        Self {
            settings,
            latest: LatestFrequency::new(),
            session: Mutex::new(session),
        }
    }

    /// Settings the tuner was built with (configuration reflects construction time).
    pub fn settings(&self) -> &TunerSettings {
        &self.settings
    }

    /// A fresh estimator/filter pair configured from the settings.
    pub fn tracker(&self) -> PitchTracker {
        let estimator = SpectralEstimator::new(self.settings.normalized_fft_size())
            .with_gate(self.settings.noise_gate)
            .with_refinement(self.settings.refinement);
        PitchTracker::new(estimator).with_range(self.settings.plausible_range)
    }

    /// Write handle bound to the current epoch.
    pub fn producer(&self) -> FrequencyProducer {
        FrequencyProducer::new(self.latest.clone())
    }

    /// Capture pipeline for a stream running at `sample_rate`.
    pub fn frame_sink(&self, sample_rate: u32) -> FrameSink {
        let tracker = self.tracker();
        FrameSink {
            assembler: FrameAssembler::new(tracker.fft_size()),
            tracker,
            producer: self.producer(),
            sample_rate,
            silence: self.settings.silence,
        }
    }

    /// Applies the latest published estimate, if there is one.
    ///
    /// Returns `true` when the session was updated.
    pub fn poll(&self) -> bool {
        let mut session = self.session.lock();
        match self.latest.take() {
            Some(freq) => {
                session.on_frequency(freq);
                true
            }
            None => false,
        }
    }

    /// Feeds a frequency straight into the session, bypassing the handoff.
    pub fn on_frequency(&self, freq: f32) {
        self.session.lock().on_frequency(freq);
    }

    /// Synchronously returns the session to idle.
    ///
    /// Every producer handed out before this call is invalidated, so a frame
    /// still in flight cannot repopulate the reading.
    pub fn stop(&self) {
        let mut session = self.session.lock();
        let epoch = self.latest.advance_epoch();
        session.reset();
        log::info!("[ENGINE] Stopped; now at epoch {epoch}");
    }

    /// Clamps and applies a new reference pitch; the current reading is
    /// re-derived before this returns.
    ///
    /// # Returns
    /// The value actually stored.
    pub fn set_reference_pitch(&self, value: f32) -> f32 {
        self.session.lock().set_reference_pitch(value)
    }

    /// Clamps and applies a new tolerance.
    ///
    /// # Returns
    /// The value actually stored.
    pub fn set_tolerance(&self, value: f32) -> f32 {
        self.session.lock().set_tolerance(value)
    }

    /// Switches instrument; the session returns to idle.
    pub fn select_instrument(&self, instrument: Instrument) {
        self.session.lock().select_instrument(instrument);
    }

    /// Current reference pitch and tolerance.
    pub fn configuration(&self) -> TuningConfiguration {
        self.session.lock().configuration()
    }

    /// Currently selected instrument.
    pub fn instrument(&self) -> Instrument {
        self.session.lock().instrument()
    }

    /// Instruction for the player, `None` while idle or out of range.
    pub fn recommendation(&self) -> Option<String> {
        self.session.lock().recommendation()
    }

    /// Consistent view of the session, taken under the session lock.
    pub fn snapshot(&self) -> TuningSnapshot {
        self.session.lock().snapshot()
    }

    /// Listener that receives the newest snapshot after every change.
    pub fn subscribe(&self) -> Subscription {
        self.session.lock().subscribe()
    }

    /// Settings reflecting the current configuration and instrument.
    pub fn current_settings(&self) -> TunerSettings {
        let session = self.session.lock();
        TunerSettings {
            tuning: session.configuration(),
            instrument: session.instrument(),
            ..self.settings.clone()
        }
    }
}
