//! # Tuning Session
//!
//! Owns the configuration and instrument selection, turns each raw frequency
//! into a note and matched string, and publishes the combined reading.
//!
//! ```text
//! Idle --valid frequency--> Detected
//! Detected --frequency <= 0 | instrument switch | reset--> Idle
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::config::TuningConfiguration;
use crate::instrument::{Instrument, InstrumentString};
use crate::tuning::{self, MusicalNote, TuningStatus};

/// Cents band within which the recommendation says "in tune".
///
/// Independent of the configurable tolerance.
pub const FINE_TUNE_CENTS: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Detected,
}

/// Read model of a session at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningSnapshot {
    pub state: SessionState,
    /// Last raw frequency in Hz, `0.0` when idle.
    pub frequency: f32,
    pub note: Option<MusicalNote>,
    pub matched_string: Option<InstrumentString>,
    pub status: Option<TuningStatus>,
    /// Deviation of the raw frequency from the matched string's target.
    pub string_cents: Option<f32>,
    pub recommendation: Option<String>,
    pub configuration: TuningConfiguration,
    pub instrument: Instrument,
}

/// Channel pair of one subscriber. The session keeps its own receiver so it
/// can drop an unread snapshot before sending a newer one.
#[derive(Debug)]
struct Subscriber {
    tx: Sender<TuningSnapshot>,
    rx: Receiver<TuningSnapshot>,
    alive: Weak<()>,
}

impl Subscriber {
    /// Replaces any pending snapshot. Returns `false` once the subscription is dropped.
    fn offer(&self, snapshot: &TuningSnapshot) -> bool {
        if self.alive.strong_count() == 0 {
            return false;
        }
        while self.rx.try_recv().is_ok() {}
        !matches!(
            self.tx.try_send(snapshot.clone()),
            Err(TrySendError::Disconnected(_))
        )
    }
}

/// Receiving end of [`TuningSession::subscribe`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: Receiver<TuningSnapshot>,
    _alive: Arc<()>,
}

impl Subscription {
    /// The pending snapshot, if one arrived since the last call.
    pub fn try_latest(&self) -> Option<TuningSnapshot> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next snapshot.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TuningSnapshot> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Underlying channel, for use in `crossbeam_channel::select!`.
    pub fn receiver(&self) -> &Receiver<TuningSnapshot> {
        &self.rx
    }
}

#[derive(Debug)]
pub struct TuningSession {
    config: TuningConfiguration,
    instrument: Instrument,
    last_frequency: Option<f32>,
    note: Option<MusicalNote>,
    matched: Option<InstrumentString>,
    subscribers: Vec<Subscriber>,
}

impl Default for TuningSession {
    fn default() -> Self {
        Self::new(TuningConfiguration::default(), Instrument::default())
    }
}

impl TuningSession {
    /// Creates an idle session.
    ///
    /// # Arguments
    /// * `config` - Reference pitch and tolerance, already clamped
    /// * `instrument` - Instrument whose strings readings are matched against
    pub fn new(config: TuningConfiguration, instrument: Instrument) -> Self {
        Self {
            config,
            instrument,
            last_frequency: None,
            note: None,
            matched: None,
            subscribers: Vec::new(),
        }
    }

    /// Feeds one raw frequency into the session.
    ///
    /// A frequency `<= 0` (or not finite) means "no signal" and clears the reading.
    pub fn on_frequency(&mut self, freq: f32) {
        if !(freq > 0.0 && freq.is_finite()) {
            self.clear_reading();
        } else {
            self.last_frequency = Some(freq);
            self.recompute();
        }
        self.notify();
    }

    /// Clamps and stores a new reference pitch, re-deriving the current
    /// reading from the last raw frequency.
    ///
    /// # Returns
    /// The value actually stored, within `[431, 449]` Hz.
    pub fn set_reference_pitch(&mut self, value: f32) -> f32 {
        let stored = self.config.set_reference_pitch(value);
        log::debug!("[SESSION] Reference pitch set to {stored} Hz (requested {value})");
        if self.note.is_some() {
            self.recompute();
        }
        self.notify();
        stored
    }

    /// Clamps and stores a new tolerance. Cents are unchanged; only the
    /// in-tune boundary used by [`status`](Self::status) moves.
    ///
    /// # Returns
    /// The value actually stored, within `[10, 100]` cents.
    pub fn set_tolerance(&mut self, value: f32) -> f32 {
        let stored = self.config.set_tolerance(value);
        log::debug!("[SESSION] Tolerance set to {stored} cents (requested {value})");
        self.notify();
        stored
    }

    /// Switches instrument and always returns to idle.
    pub fn select_instrument(&mut self, instrument: Instrument) {
        log::debug!("[SESSION] Instrument {} -> {}", self.instrument, instrument);
        self.instrument = instrument;
        self.clear_reading();
        self.notify();
    }

    /// Returns to idle, forgetting the last raw frequency.
    pub fn reset(&mut self) {
        self.clear_reading();
        self.notify();
    }

    /// `Detected` while a note is shown, `Idle` otherwise.
    pub fn state(&self) -> SessionState {
        if self.note.is_some() {
            SessionState::Detected
        } else {
            SessionState::Idle
        }
    }

    /// Current reference pitch and tolerance.
    pub fn configuration(&self) -> TuningConfiguration {
        self.config
    }

    /// Instrument readings are matched against.
    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Last raw frequency, `0.0` when idle.
    pub fn frequency(&self) -> f32 {
        self.last_frequency.unwrap_or(0.0)
    }

    /// Nearest chromatic note of the last frequency, `None` when idle.
    pub fn note(&self) -> Option<MusicalNote> {
        self.note
    }

    /// String the last frequency was attributed to.
    ///
    /// # Returns
    /// * `Some(string)` - Closest string whose window holds the frequency
    /// * `None` - Idle, or no string of the instrument is within three semitones
    pub fn matched_string(&self) -> Option<InstrumentString> {
        self.matched
    }

    /// Effective status: out of range whenever no string matched.
    ///
    /// # Returns
    /// * `Some(status)` - A note is shown
    /// * `None` - Idle
    pub fn status(&self) -> Option<TuningStatus> {
        let note = self.note?;
        Some(match self.matched {
            Some(_) => note.status(self.config.tolerance()),
            None => TuningStatus::OutOfRange,
        })
    }

    /// Cents from the matched string's target frequency.
    pub fn string_cents(&self) -> Option<f32> {
        let string = self.matched?;
        let freq = self.last_frequency?;
        Some(tuning::cents_between(
            freq,
            string.target_frequency(self.config.reference_pitch()),
        ))
    }

    /// Instruction for the player, naming the matched string.
    ///
    /// Uses the fixed [`FINE_TUNE_CENTS`] band; the cents magnitude is rounded
    /// to the nearest integer.
    ///
    /// # Returns
    /// * `Some(text)` - e.g. `"A2 is flat by 12 cents, tune up"`
    /// * `None` - Idle or out of range
    pub fn recommendation(&self) -> Option<String> {
        let string = self.matched?;
        let note = self.note?;
        Some(advise(string.name, note.cents))
    }

    /// Every derived value at once, consistent with a single state.
    pub fn snapshot(&self) -> TuningSnapshot {
        TuningSnapshot {
            state: self.state(),
            frequency: self.frequency(),
            note: self.note,
            matched_string: self.matched,
            status: self.status(),
            string_cents: self.string_cents(),
            recommendation: self.recommendation(),
            configuration: self.config,
            instrument: self.instrument,
        }
    }

    /// Registers a listener that receives a snapshot after every change.
    ///
    /// Unread snapshots are replaced, so a slow reader only ever sees the latest.
    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let alive = Arc::new(());
        let subscriber = Subscriber {
            tx,
            rx: rx.clone(),
            alive: Arc::downgrade(&alive),
        };
        subscriber.offer(&self.snapshot());
        self.subscribers.push(subscriber);
        Subscription { rx, _alive: alive }
    }

    fn recompute(&mut self) {
        let Some(freq) = self.last_frequency else {
            return;
        };
        let reference = self.config.reference_pitch();
        self.note = tuning::to_note(freq, reference);
        self.matched = self
            .note
            .and_then(|_| self.instrument.match_string(freq, reference));
    }

    fn clear_reading(&mut self) {
        self.last_frequency = None;
        self.note = None;
        self.matched = None;
    }

    fn notify(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers.retain(|s| s.offer(&snapshot));
    }
}

/// Player instruction for `string_name` given a deviation in cents.
///
/// `|cents| <= FINE_TUNE_CENTS` (bounds included) reads as in tune.
fn advise(string_name: &str, cents: f32) -> String {
    let magnitude = cents.abs().round() as u32;
    if cents.abs() <= FINE_TUNE_CENTS {
        format!("{string_name} is in tune")
    } else if cents > 0.0 {
        format!("{string_name} is sharp by {magnitude} cents, tune down")
    } else {
        format!("{string_name} is flat by {magnitude} cents, tune up")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn session() -> TuningSession {
        TuningSession::default()
    }

    #[test]
    fn starts_idle() {
        let s = session();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.frequency(), 0.0);
        assert!(s.note().is_none());
        assert!(s.status().is_none());
        assert!(s.recommendation().is_none());
    }

    #[test]
    fn valid_frequency_detects_note_and_string() {
        let mut s = session();
        s.on_frequency(110.0);
        assert_eq!(s.state(), SessionState::Detected);
        assert_eq!(s.note().unwrap().name(), "A2");
        assert_eq!(s.matched_string().unwrap().name, "A2");
        assert_eq!(s.status(), Some(TuningStatus::InTune));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is in tune"));
    }

    #[test]
    fn non_positive_frequency_clears() {
        let mut s = session();
        s.on_frequency(110.0);
        s.on_frequency(0.0);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.matched_string().is_none());

        s.on_frequency(110.0);
        s.on_frequency(-3.0);
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn unmatched_note_is_out_of_range() {
        let mut s = session();
        // A5 is far above the guitar's top string.
        s.on_frequency(880.0);
        assert_eq!(s.note().unwrap().name(), "A5");
        assert!(s.matched_string().is_none());
        assert_eq!(s.status(), Some(TuningStatus::OutOfRange));
        assert!(s.recommendation().is_none());
    }

    #[test]
    fn recommendation_directions() {
        let mut s = session();
        s.on_frequency(110.0 * 2.0_f32.powf(20.0 / 1200.0));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is sharp by 20 cents, tune down"));
        assert_eq!(s.status(), Some(TuningStatus::Sharp));

        s.on_frequency(110.0 * 2.0_f32.powf(-12.0 / 1200.0));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is flat by 12 cents, tune up"));
        assert_eq!(s.status(), Some(TuningStatus::Flat));

        // Within the fine-tuning band.
        s.on_frequency(110.0 * 2.0_f32.powf(4.0 / 1200.0));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is in tune"));
    }

    #[test]
    fn fine_tune_band_is_closed() {
        assert_eq!(advise("A2", 5.0), "A2 is in tune");
        assert_eq!(advise("A2", -5.0), "A2 is in tune");
        assert_eq!(advise("A2", 0.0), "A2 is in tune");
        assert_eq!(advise("A2", 5.01), "A2 is sharp by 5 cents, tune down");
        assert_eq!(advise("A2", -5.4), "A2 is flat by 5 cents, tune up");
        assert_eq!(advise("A2", -5.6), "A2 is flat by 6 cents, tune up");
    }

    #[test]
    fn recommendation_at_band_edge_reads_in_tune() {
        let mut s = session();
        // Just inside the band on both sides.
        s.on_frequency(110.0 * 2.0_f32.powf(4.99 / 1200.0));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is in tune"));
        s.on_frequency(110.0 * 2.0_f32.powf(-4.99 / 1200.0));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is in tune"));
    }

    #[test]
    fn recommendation_band_ignores_tolerance() {
        let mut s = session();
        s.set_tolerance(50.0);
        s.on_frequency(110.0 * 2.0_f32.powf(8.0 / 1200.0));
        assert_eq!(s.status(), Some(TuningStatus::InTune));
        assert_eq!(s.recommendation().as_deref(), Some("A2 is sharp by 8 cents, tune down"));
    }

    #[test]
    fn tolerance_moves_boundary_without_touching_cents() {
        let mut s = session();
        s.on_frequency(110.0 * 2.0_f32.powf(15.0 / 1200.0));
        let cents = s.note().unwrap().cents;
        assert_eq!(s.status(), Some(TuningStatus::Sharp));

        assert_eq!(s.set_tolerance(20.0), 20.0);
        assert_eq!(s.status(), Some(TuningStatus::InTune));
        assert_eq!(s.note().unwrap().cents, cents);
    }

    #[test]
    fn reference_change_recomputes_from_raw_frequency() {
        let mut s = session();
        s.on_frequency(110.0);
        assert_abs_diff_eq!(s.note().unwrap().cents, 0.0, epsilon = 1e-3);

        assert_eq!(s.set_reference_pitch(444.0), 444.0);
        let note = s.note().unwrap();
        let expected = 1200.0 * (440.0_f32 / 444.0).log2();
        assert_abs_diff_eq!(note.cents, expected, epsilon = 1e-2);
        assert_abs_diff_eq!(note.frequency, 111.0, epsilon = 1e-3);
        assert_eq!(s.frequency(), 110.0);
    }

    #[test]
    fn reference_change_while_idle_stays_idle() {
        let mut s = session();
        assert_eq!(s.set_reference_pitch(1000.0), 449.0);
        assert_eq!(s.set_reference_pitch(0.0), 431.0);
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.configuration().reference_pitch(), 431.0);
    }

    #[test]
    fn instrument_switch_always_clears() {
        let mut s = session();
        s.on_frequency(440.0);
        s.select_instrument(Instrument::Ukulele);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.matched_string().is_none());

        s.on_frequency(440.0);
        assert_eq!(s.matched_string().unwrap().name, "A4");
        // Same instrument, same frequency: still cleared.
        s.select_instrument(Instrument::Ukulele);
        assert!(s.note().is_none());
        assert!(s.matched_string().is_none());
    }

    #[test]
    fn string_cents_measure_against_matched_string() {
        let mut s = session();
        // F2 is one semitone above E2: chromatic cents ~0, string cents ~100.
        s.on_frequency(87.31);
        assert_eq!(s.note().unwrap().name(), "F2");
        assert_eq!(s.matched_string().unwrap().name, "E2");
        assert_abs_diff_eq!(s.string_cents().unwrap(), 100.0, epsilon = 0.5);
    }

    #[test]
    fn subscribers_see_only_the_latest_snapshot() {
        let mut s = session();
        let sub = s.subscribe();
        assert_eq!(sub.try_latest().unwrap().state, SessionState::Idle);

        s.on_frequency(110.0);
        s.on_frequency(146.83);
        let latest = sub.try_latest().unwrap();
        assert_eq!(latest.matched_string.unwrap().name, "D3");
        assert!(sub.try_latest().is_none());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut s = session();
        drop(s.subscribe());
        let sub = s.subscribe();
        s.on_frequency(110.0);
        assert_eq!(s.subscribers.len(), 1);
        assert!(sub.try_latest().is_some());
    }

    #[test]
    fn snapshot_combines_reading_and_configuration() {
        let mut s = TuningSession::new(TuningConfiguration::new(442.0, 15.0), Instrument::Ukulele);
        s.on_frequency(442.0);
        let snap = s.snapshot();
        assert_eq!(snap.state, SessionState::Detected);
        assert_eq!(snap.frequency, 442.0);
        assert_eq!(snap.instrument, Instrument::Ukulele);
        assert_eq!(snap.configuration.tolerance(), 15.0);
        assert_eq!(snap.status, Some(TuningStatus::InTune));
        assert_eq!(snap.recommendation.as_deref(), Some("A4 is in tune"));
    }
}
