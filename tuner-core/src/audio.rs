//! # Audio Capture Module
//!
//! Real-time microphone capture through CPAL (Cross-Platform Audio Library).
//! The input callback down-mixes to mono and drives a [`FrameSink`], so pitch
//! estimation runs directly on the delivery path and only the latest
//! frequency is handed to the control loop.
//!
//! ## Features
//! - Default input device selection
//! - Prefers mono 32-bit float at 44.1 kHz, accepts multi-channel input
//! - Synchronous stop that also resets the tuner

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::engine::{FrameSink, Tuner};

/// Sample rate requested from the device when it offers a choice.
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// A running input stream feeding a [`Tuner`].
pub struct AudioCapture {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
    device_name: String,
}

impl AudioCapture {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stops the stream and resets the tuner before returning.
    pub fn stop(self, tuner: &Tuner) -> Result<()> {
        log::info!("[AUDIO] Stopping capture on {}", self.device_name);
        let paused = self.stream.pause().context("failed to pause input stream");
        drop(self.stream);
        tuner.stop();
        paused
    }
}

/// Starts capture from the default input device into `tuner`.
///
/// # Returns
/// * `Ok(capture)` - Running stream; keep it alive for as long as capture should run
/// * `Err(e)` - No input device, no f32 input format, or the stream failed to start
pub fn start_audio_capture(tuner: &Tuner) -> Result<AudioCapture> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;
    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    log::info!("[AUDIO] Using input device: {device_name}");

    let configs = device
        .supported_input_configs()
        .context("failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .into();
    let channels = config.channels;
    log::info!("[AUDIO] Capturing {channels} channel(s) at {sample_rate} Hz");

    let sink = tuner.frame_sink(sample_rate);
    let data_fn = input_callback(sink, channels);
    let err_fn = |err| log::error!("[AUDIO] An error occurred on the audio stream: {err}");

    let stream = device
        .build_input_stream(&config, data_fn, err_fn, None)
        .context("failed to build input stream")?;
    stream.play().context("failed to start input stream")?;

    Ok(AudioCapture {
        stream,
        sample_rate,
        channels,
        device_name,
    })
}

/// Mono samples produced per down-mix pass; the scratch buffer never grows past this.
const DOWNMIX_CHUNK: usize = 1024;

/// Builds the data callback: down-mix to mono, then hand to the sink.
fn input_callback(
    mut sink: FrameSink,
    channels: u16,
) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
    let channels = usize::from(channels.max(1));
    let mut mono = vec![0.0; DOWNMIX_CHUNK];

    move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if channels == 1 {
            sink.push(data);
            return;
        }
        downmix(data, channels, &mut mono, |chunk| {
            sink.push(chunk);
        });
    }
}

/// Averages interleaved `data` into `scratch` one chunk at a time.
///
/// Callback buffers of any length are handled without allocating; a trailing
/// partial frame (fewer than `channels` samples) is dropped.
fn downmix(data: &[f32], channels: usize, scratch: &mut [f32], mut emit: impl FnMut(&[f32])) {
    let chunk_frames = scratch.len();
    if chunk_frames == 0 {
        return;
    }
    for block in data.chunks(chunk_frames * channels) {
        let mut len = 0;
        for (out, frame) in scratch.iter_mut().zip(block.chunks_exact(channels)) {
            *out = frame.iter().sum::<f32>() / channels as f32;
            len += 1;
        }
        if len > 0 {
            emit(&scratch[..len]);
        }
    }
}

/// Picks the f32 input configuration closest to what the tuner wants.
///
/// Mono is preferred over multi-channel; among equals, the configuration
/// whose rate range is closest to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, rate_distance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_handles_buffers_larger_than_scratch() {
        let channels = 2;
        let frames = 2500;
        let data: Vec<f32> = (0..frames)
            .flat_map(|i| [i as f32, i as f32 + 2.0])
            .collect();
        let mut scratch = vec![0.0; 1024];
        let mut out = Vec::new();
        let mut calls = 0;

        downmix(&data, channels, &mut scratch, |chunk| {
            calls += 1;
            out.extend_from_slice(chunk);
        });

        assert_eq!(calls, 3);
        assert_eq!(scratch.len(), 1024);
        assert_eq!(out.len(), frames);
        for (i, sample) in out.iter().enumerate() {
            assert_eq!(*sample, i as f32 + 1.0);
        }
    }

    #[test]
    fn downmix_drops_trailing_partial_frame() {
        let data = [1.0, 3.0, 5.0, 7.0, 9.0];
        let mut scratch = vec![0.0; 8];
        let mut out = Vec::new();
        downmix(&data, 2, &mut scratch, |chunk| out.extend_from_slice(chunk));
        assert_eq!(out, vec![2.0, 6.0]);
    }
}
