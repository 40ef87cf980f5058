//! # Sample Frames
//!
//! Fixed-length blocks of mono samples, and the assembler that cuts the
//! irregular chunks delivered by an audio callback into such blocks.

use std::sync::Arc;

/// Frame length used by the tuner when nothing else is configured.
///
/// At 44.1 kHz this is ~93 ms of audio and a bin width of ~10.8 Hz.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// An immutable block of mono samples together with the rate they were captured at.
///
/// The samples are shared, so cloning a frame never copies audio data.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleFrame {
    pub fn new(samples: impl Into<Arc<[f32]>>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration covered by the frame, in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Accumulates callback-sized chunks into fixed-size frames.
///
/// The internal buffer is allocated once with room for exactly one frame, so
/// pushing audio never grows the heap. This makes it safe to drive from a
/// real-time capture callback.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<f32>,
    frame_size: usize,
}

impl FrameAssembler {
    /// # Panics
    /// * If `frame_size` is zero
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame size must be non-zero");
        Self {
            buffer: Vec::with_capacity(frame_size),
            frame_size,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of samples waiting for the current frame to fill up.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `data` and calls `on_frame` once for every completed frame.
    ///
    /// The slice handed to `on_frame` is only valid for the duration of the call.
    pub fn push(&mut self, mut data: &[f32], mut on_frame: impl FnMut(&[f32])) {
        while !data.is_empty() {
            let room = self.frame_size - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == self.frame_size {
                on_frame(&self.buffer);
                self.buffer.clear();
            }
        }
    }

    /// Drops any partially assembled frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
