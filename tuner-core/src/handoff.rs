//! # Frequency Handoff
//!
//! Single-slot exchange between the capture callback (writer) and the control
//! loop (reader). Only the most recent estimate survives; older ones are
//! overwritten, never queued.
//!
//! Each value is tagged with the epoch of the producer that wrote it. Bumping
//! the epoch invalidates every producer handed out before, so a frame that
//! finishes after a stop cannot bring the old reading back.
//!
//! Epoch and frequency are packed into one `u64`, so publishing and taking
//! are single atomic operations and the capture callback never waits on a lock.

use crossbeam_utils::atomic::AtomicCell;
use std::sync::Arc;

/// Packed slot value meaning "nothing published since the last take".
///
/// Its low half is a NaN bit pattern that [`pack`] never produces.
const EMPTY: u64 = u64::MAX;

/// Epoch in the high 32 bits, frequency bits in the low 32.
///
/// NaN is stored as `0.0` ("no usable signal").
fn pack(epoch: u32, frequency: f32) -> u64 {
    let frequency = if frequency.is_nan() { 0.0 } else { frequency };
    (u64::from(epoch) << 32) | u64::from(frequency.to_bits())
}

fn unpack(packed: u64) -> (u32, f32) {
    ((packed >> 32) as u32, f32::from_bits(packed as u32))
}

/// The slot shared between producers and the reader.
///
/// Both cells hold plain integers, so every operation is a single native
/// atomic on targets with 64-bit atomics: no lock on the delivery path.
#[derive(Debug)]
pub struct LatestFrequency {
    slot: AtomicCell<u64>,
    epoch: AtomicCell<u32>,
}

impl Default for LatestFrequency {
    fn default() -> Self {
        Self {
            slot: AtomicCell::new(EMPTY),
            epoch: AtomicCell::new(0),
        }
    }
}

impl LatestFrequency {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `true` when publishing and taking compile to native atomics.
    pub fn is_lock_free() -> bool {
        AtomicCell::<u64>::is_lock_free() && AtomicCell::<u32>::is_lock_free()
    }

    pub fn epoch(&self) -> u32 {
        self.epoch.load()
    }

    /// Invalidates all existing producers and empties the slot.
    ///
    /// Returns the new epoch.
    pub fn advance_epoch(&self) -> u32 {
        let next = self.epoch.fetch_add(1).wrapping_add(1);
        self.slot.store(EMPTY);
        next
    }

    /// Takes the latest value written under the current epoch, if any.
    ///
    /// Values from older epochs are discarded.
    pub fn take(&self) -> Option<f32> {
        let packed = self.slot.swap(EMPTY);
        if packed == EMPTY {
            return None;
        }
        let (epoch, frequency) = unpack(packed);
        let current = self.epoch.load();
        if epoch == current {
            Some(frequency)
        } else {
            log::trace!("[HANDOFF] Dropping stale estimate from epoch {epoch} (current {current})");
            None
        }
    }

    fn store(&self, epoch: u32, frequency: f32) {
        self.slot.store(pack(epoch, frequency));
    }
}

/// Write handle for the capture path, bound to the epoch it was created in.
///
/// Publishing never blocks and never allocates.
#[derive(Debug, Clone)]
pub struct FrequencyProducer {
    shared: Arc<LatestFrequency>,
    epoch: u32,
}

impl FrequencyProducer {
    pub fn new(shared: Arc<LatestFrequency>) -> Self {
        let epoch = shared.epoch();
        Self { shared, epoch }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// `true` once the slot has moved on to a newer epoch.
    pub fn is_stale(&self) -> bool {
        self.shared.epoch() != self.epoch
    }

    /// Overwrites the slot with `frequency`. NaN is published as "no signal".
    pub fn publish(&self, frequency: f32) {
        self.shared.store(self.epoch, frequency);
    }

    /// Publishes an explicit "no signal" value.
    pub fn publish_silence(&self) {
        self.publish(0.0);
    }
}
