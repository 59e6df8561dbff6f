//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! The input stream is cut into fixed-size mono frames which are delivered over a
//! channel, one frame per pitch estimate.
//!
//! ## Features
//! - Automatic audio device selection
//! - Mono downmix of multi-channel inputs
//! - Sample rate negotiation around a requested rate
//! - Non-blocking delivery: frames are dropped rather than stalling the audio callback

use anyhow::{Context, Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{debug, error, info};

/// Audio buffer size for processing frames.
///
/// The pitch estimator scans lags up to half a frame, so 1024 samples reach
/// down to about 86 Hz at 44.1 kHz.
pub const BUFFER_SIZE: usize = 1024;

/// Sample rate requested from the device when none is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an f32 input configuration near `target_rate`, preferring mono
/// 3. Sets up a callback that downmixes to mono and sends `BUFFER_SIZE` frames
///
/// The returned stream must be kept alive (and on some platforms on the thread
/// that created it) for as long as frames are wanted.
///
/// # Arguments
/// * `sender` - Channel sender for streaming audio frames to the consumer
/// * `target_rate` - Preferred sample rate in Hz
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and the actual sample rate
/// * `Err(e)` - Error if audio setup fails
pub fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(target: "audio", device = %device.name()?, "using audio input device");

    let configs = device
        .supported_input_configs()
        .context("Failed to query input configurations")?
        .collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = cpal::SampleRate(target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    ));
    let config = supported_config.with_sample_rate(sample_rate);

    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!(target: "audio", sample_rate = sample_rate_val, channels, "selected input format");

    let err_fn = |err| error!(target: "audio", "An error occurred on the audio stream: {}", err);

    let mut framer = Framer::new(BUFFER_SIZE, channels);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            framer.push(data, |frame| {
                // Send the frame, dropping it if the consumer is behind.
                if sender.try_send(frame).is_err() {
                    debug!(target: "audio", "frame dropped");
                }
            });
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Lists the names of the available input devices on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to get input devices: {}", e))?;

    Ok(devices
        .map(|device| device.name().unwrap_or_else(|_| "(name unavailable)".to_string()))
        .collect())
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only 32-bit float formats are considered. Mono configurations win over
/// multi-channel ones; within the same channel preference the range closest
/// to `target_rate` wins.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32 && c.channels() > 0)
        .min_by_key(|c| {
            let rate_distance = if (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate) {
                0
            } else {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            };
            (c.channels() != 1, rate_distance)
        })
}

/// Accumulates interleaved callback data into fixed-size mono frames.
#[derive(Debug)]
struct Framer {
    frame_size: usize,
    channels: usize,
    buffer: Vec<f32>,
}

impl Framer {
    fn new(frame_size: usize, channels: usize) -> Self {
        Self {
            frame_size,
            channels: channels.max(1),
            buffer: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Appends interleaved samples and emits every complete frame.
    fn push(&mut self, data: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        let channels = self.channels;
        self.buffer.extend(
            data.chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );

        // While we have enough data for a full frame, process it.
        while self.buffer.len() >= self.frame_size {
            emit(self.buffer.drain(..self.frame_size).collect());
        }
    }
}
