//! # Pitch Detection Module
//!
//! This module implements the time-domain pitch estimator used by the trainer.
//! It works directly on the raw sample buffer, which keeps it cheap enough to
//! run once per incoming frame.
//!
//! ## Features
//! - RMS noise gate to reject silence
//! - Normalized autocorrelation (mean absolute difference) over half the buffer
//! - Early exit as soon as the first strong periodic peak is passed
//! - Parabolic-style refinement around the peak

use serde::{Deserialize, Serialize};

/// Tunable thresholds for [`detect_pitch_autocorrelation`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchSettings {
    /// Buffers with an RMS below this value are treated as silence.
    pub silence_rms: f32,
    /// Correlation a rising lag must exceed to count as a periodic peak.
    pub good_enough_correlation: f32,
    /// Minimum correlation accepted when the scan ends without an early exit.
    pub min_correlation: f32,
}

impl Default for PitchSettings {
    fn default() -> Self {
        Self {
            silence_rms: 0.01,
            good_enough_correlation: 0.9,
            min_correlation: 0.01,
        }
    }
}

/// Estimates the fundamental frequency of `signal` using the default settings.
pub fn detect_pitch(signal: &[f32], sample_rate: u32) -> Option<f32> {
    detect_pitch_autocorrelation(signal, sample_rate, &PitchSettings::default())
}

/// Time-domain autocorrelation pitch estimator.
///
/// For every lag up to half the buffer the similarity score is
/// `1 - mean(|x[i] - x[i + lag]|)` over the first half of the buffer. The scan
/// stops at the first lag after a run of rising scores above
/// `good_enough_correlation`, and the best lag of that run is refined using
/// its neighbours.
///
/// # Arguments
/// * `signal` - Input audio samples in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
/// * `settings` - Noise gate and correlation thresholds
///
/// # Returns
/// * `Some(frequency)` - Estimated frequency in Hz
/// * `None` - No pitch detected (silence, noise, or invalid signal)
pub fn detect_pitch_autocorrelation(
    signal: &[f32],
    sample_rate: u32,
    settings: &PitchSettings,
) -> Option<f32> {
    let size = signal.len();
    let max_samples = size / 2;
    if max_samples == 0 {
        return None;
    }

    // --- Noise Gate: Calculate RMS to filter out silence/noise ---
    if rms(signal) < settings.silence_rms {
        return None;
    }

    let mut correlations = vec![0.0f32; max_samples];
    let mut best_offset = 0;
    let mut best_correlation = 0.0f32;
    let mut found_good_correlation = false;
    let mut last_correlation = 1.0f32;

    for offset in 0..max_samples {
        let distance: f32 = signal[..max_samples]
            .iter()
            .zip(&signal[offset..offset + max_samples])
            .map(|(a, b)| (a - b).abs())
            .sum();
        let correlation = 1.0 - distance / max_samples as f32;
        correlations[offset] = correlation;

        if correlation > settings.good_enough_correlation && correlation > last_correlation {
            found_good_correlation = true;
            if correlation > best_correlation {
                best_correlation = correlation;
                best_offset = offset;
            }
        } else if found_good_correlation {
            // The peak is behind us: refine with the neighbouring scores.
            // best_offset < offset, so best_offset + 1 has already been scored.
            let before = best_offset.checked_sub(1).map(|i| correlations[i])?;
            let after = correlations[best_offset + 1];
            let shift = (after - before) / correlations[best_offset];
            return valid_frequency(sample_rate as f32 / (best_offset as f32 + 8.0 * shift));
        }

        last_correlation = correlation;
    }

    if best_correlation > settings.min_correlation && best_offset > 0 {
        return valid_frequency(sample_rate as f32 / best_offset as f32);
    }

    None
}

/// Root mean square level of a buffer.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

fn valid_frequency(frequency: f32) -> Option<f32> {
    (frequency.is_finite() && frequency > 0.0).then_some(frequency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44_100;
    const FRAME: usize = 1024;

    fn sine(frequency: f32, amplitude: f32) -> Vec<f32> {
        (0..FRAME)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn semitones_between(a: f32, b: f32) -> f32 {
        (12.0 * (a / b).log2()).abs()
    }

    #[test]
    fn silence_has_no_pitch() {
        assert_eq!(detect_pitch(&vec![0.0; FRAME], SAMPLE_RATE), None);
    }

    #[test]
    fn quiet_signal_is_gated() {
        assert_eq!(detect_pitch(&sine(440.0, 0.005), SAMPLE_RATE), None);
    }

    #[test]
    fn tiny_buffers_have_no_pitch() {
        assert_eq!(detect_pitch(&[], SAMPLE_RATE), None);
        assert_eq!(detect_pitch(&[0.5], SAMPLE_RATE), None);
    }

    #[test]
    fn detects_sines_within_a_semitone() {
        for frequency in [110.0, 196.0, 261.63, 440.0, 659.25, 880.0] {
            let detected = detect_pitch(&sine(frequency, 0.5), SAMPLE_RATE)
                .unwrap_or_else(|| panic!("no pitch for {frequency} Hz"));
            assert!(
                semitones_between(detected, frequency) < 0.5,
                "{frequency} Hz detected as {detected} Hz"
            );
        }
    }

    #[test]
    fn rising_run_cut_off_by_the_scan_end_is_not_interpolated() {
        // A quiet tone whose period (600 samples) lies beyond the last lag
        // scanned (511): scores keep rising above 0.9 until the scan stops.
        let signal: Vec<f32> = (0..FRAME)
            .map(|i| 0.02 * (2.0 * PI * i as f32 / 600.0).sin())
            .collect();
        assert_eq!(detect_pitch(&signal, SAMPLE_RATE), Some(SAMPLE_RATE as f32 / 511.0));
    }

    #[test]
    fn loud_noise_without_a_periodic_peak_has_no_pitch() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise: Vec<f32> = (0..FRAME).map(|_| rng.gen_range(-1.0..1.0)).collect();
        assert!(rms(&noise) > 0.4);
        assert_eq!(detect_pitch(&noise, SAMPLE_RATE), None);
    }

    #[test]
    fn stricter_gate_rejects_moderate_signal() {
        let settings = PitchSettings {
            silence_rms: 0.5,
            ..PitchSettings::default()
        };
        assert_eq!(
            detect_pitch_autocorrelation(&sine(440.0, 0.5), SAMPLE_RATE, &settings),
            None
        );
    }

    #[test]
    fn rms_of_known_signals() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }
}
