// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-chunk amplitude envelope and magnitude spectrum.
//!
//! Derived-and-discarded: nothing here carries state between calls.

use std::f32::consts::PI;

use realfft::RealFftPlanner;

use iqsim_core::{AnalysisFrame, SpectrumData};

/// Envelope length pushed to live visualization subscribers.
pub const AMPLITUDE_ENVELOPE_LEN: usize = 20;
/// Maximum spectrum bin count pushed to live visualization subscribers.
pub const SPECTRUM_BINS: usize = 512;

const PCM_FULL_SCALE: f32 = 32_768.0;

/// `count` evenly spaced indices into `0..len`, endpoints included.
/// Nearest-index subsampling, not interpolation.
fn spaced_indices(len: usize, count: usize) -> Vec<usize> {
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![0];
    }
    (0..count)
        .map(|i| (i as f64 * (len - 1) as f64 / (count - 1) as f64) as usize)
        .collect()
}

/// Fixed-length amplitude envelope of a chunk.
///
/// Samples are normalized to [-1, 1] from the 16-bit PCM scale and
/// right-padded with zeros when the chunk is shorter than the envelope.
pub fn amplitude_envelope(samples: &[f32], target_len: usize) -> Vec<f32> {
    let mut normalized: Vec<f32> = samples.iter().map(|&s| s / PCM_FULL_SCALE).collect();
    if normalized.len() < target_len {
        normalized.resize(target_len, 0.0);
    }
    spaced_indices(normalized.len(), target_len)
        .into_iter()
        .map(|i| normalized[i])
        .collect()
}

/// Hann window of length `n` (symmetric; matches the numpy convention).
fn hann_window(n: usize) -> Vec<f32> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (n - 1) as f32).cos()))
        .collect()
}

/// Windowed real-FFT magnitude spectrum with its frequency bins.
///
/// When the natural bin count (`n/2 + 1`) exceeds `max_bins`, both arrays
/// are subsampled by the same nearest-index rule.
pub fn spectrum(samples: &[f32], sample_rate: f64, max_bins: usize) -> SpectrumData {
    let n = samples.len();
    if n == 0 {
        return SpectrumData {
            freqs: Vec::new(),
            magnitude: Vec::new(),
        };
    }

    let window = hann_window(n);
    let mut input: Vec<f32> = samples
        .iter()
        .zip(&window)
        .map(|(&s, &w)| s / PCM_FULL_SCALE * w)
        .collect();

    let fft = RealFftPlanner::<f32>::new().plan_fft_forward(n);
    let mut output = fft.make_output_vec();
    // Length and layout come from the planner; process only fails on
    // mismatched buffers.
    fft.process(&mut input, &mut output)
        .expect("real FFT buffers sized by planner");

    let mut magnitude: Vec<f32> = output.iter().map(|c| c.norm()).collect();
    let mut freqs: Vec<f32> = (0..magnitude.len())
        .map(|i| (i as f64 * sample_rate / n as f64) as f32)
        .collect();

    if magnitude.len() > max_bins {
        let indices = spaced_indices(magnitude.len(), max_bins);
        magnitude = indices.iter().map(|&i| magnitude[i]).collect();
        freqs = indices.iter().map(|&i| freqs[i]).collect();
    }

    SpectrumData { freqs, magnitude }
}

/// Build the live analysis frame for one filtered chunk.
pub fn analyze(filtered: &[f32], sample_rate: f64) -> AnalysisFrame {
    AnalysisFrame {
        sample_rate,
        amplitude: amplitude_envelope(filtered, AMPLITUDE_ENVELOPE_LEN),
        spectrum: spectrum(filtered, sample_rate, SPECTRUM_BINS),
    }
}

/// Convert filtered samples (16-bit PCM scale) to little-endian `i16`
/// bytes for the audio re-stream.
pub fn to_pcm_bytes(samples: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        buf.extend_from_slice(&(s as i16).to_le_bytes());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_fixed_length_and_padding() {
        // Shorter than the envelope: padded with zeros on the right.
        let short = vec![32_768.0; 5];
        let env = amplitude_envelope(&short, AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(env.len(), AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(env[0], 1.0);
        assert_eq!(env[AMPLITUDE_ENVELOPE_LEN - 1], 0.0);

        // Longer: subsampled, endpoints included.
        let long: Vec<f32> = (0..4410).map(|i| i as f32).collect();
        let env = amplitude_envelope(&long, AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(env.len(), AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(env[0], 0.0);
        assert_eq!(env[AMPLITUDE_ENVELOPE_LEN - 1], 4409.0 / PCM_FULL_SCALE);
    }

    #[test]
    fn spectrum_is_capped_and_bins_ascend() {
        let samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * PI * 1000.0 * i as f32 / 44_100.0).sin() * 20_000.0)
            .collect();
        let spec = spectrum(&samples, 44_100.0, SPECTRUM_BINS);
        assert_eq!(spec.freqs.len(), SPECTRUM_BINS);
        assert_eq!(spec.magnitude.len(), SPECTRUM_BINS);
        assert!(spec.freqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(spec.freqs[0], 0.0);

        // The peak bin sits at the tone frequency.
        let peak = spec
            .magnitude
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| spec.freqs[i])
            .unwrap();
        assert!((peak - 1000.0).abs() < 50.0, "peak at {}", peak);
    }

    #[test]
    fn short_chunk_keeps_natural_bins() {
        let samples = vec![1.0f32; 64];
        let spec = spectrum(&samples, 44_100.0, SPECTRUM_BINS);
        assert_eq!(spec.magnitude.len(), 33);
        assert_eq!(spec.freqs.len(), 33);
    }

    #[test]
    fn analyze_produces_complete_frame() {
        let samples = vec![100.0f32; 4410];
        let frame = analyze(&samples, 44_100.0);
        assert_eq!(frame.sample_rate, 44_100.0);
        assert_eq!(frame.amplitude.len(), AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(frame.spectrum.magnitude.len(), SPECTRUM_BINS);
    }

    #[test]
    fn pcm_bytes_saturate_and_round_trip() {
        let bytes = to_pcm_bytes(&[0.0, 1.0, -1.0, 40_000.0, -40_000.0]);
        assert_eq!(bytes.len(), 10);
        let vals: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(vals, vec![0, 1, -1, i16::MAX, i16::MIN]);
    }
}
