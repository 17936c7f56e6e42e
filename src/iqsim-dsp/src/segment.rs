// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Synthetic segment sources.
//!
//! All sources emit mono samples on the 16-bit PCM scale (±32767) so the
//! downstream audio path can cast to `i16` without rescaling.

use rand::Rng;

use iqsim_core::Mode;

pub const SAMPLE_RATE_HZ: u32 = 44_100;
pub const SEGMENT_DURATION_MS: u64 = 10_000;
pub const SILENCE_DURATION_MS: u64 = 100;

const PEAK_AMPLITUDE: f32 = 32_767.0;

/// Tone set of the multi-sine source, spread across the audible band.
const TONE_FREQS_HZ: [f32; 13] = [
    60.0, 500.0, 1000.0, 3000.0, 5000.0, 7000.0, 9000.0, 11000.0, 13000.0, 15000.0, 17000.0,
    19000.0, 21000.0,
];

/// Per-tone amplitude ratio before normalization.
const TONE_AMPLITUDE: f32 = 0.1;

/// A fixed-duration block of mono audio. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// A pluggable synthetic-signal factory.
///
/// `produce` is synchronous and CPU-bound; the session loop runs it on a
/// blocking worker so synthesis never delays the emission path.
pub trait SignalSource: Send + Sync {
    fn produce(&self) -> Segment;
}

fn samples_for(duration_ms: u64, sample_rate: u32) -> usize {
    (sample_rate as u64 * duration_ms / 1000) as usize
}

/// Scale so the largest absolute sample sits at full scale.
fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
    if peak > 0.0 {
        let gain = PEAK_AMPLITUDE / peak;
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}

/// Uniform white noise, peak-normalized.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    duration_ms: u64,
}

impl NoiseSource {
    pub fn new(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

impl Default for NoiseSource {
    fn default() -> Self {
        Self::new(SEGMENT_DURATION_MS)
    }
}

impl SignalSource for NoiseSource {
    fn produce(&self) -> Segment {
        let mut rng = rand::thread_rng();
        let mut samples: Vec<f32> = (0..samples_for(self.duration_ms, SAMPLE_RATE_HZ))
            .map(|_| rng.gen_range(-1.0f32..1.0))
            .collect();
        peak_normalize(&mut samples);
        Segment {
            samples,
            sample_rate: SAMPLE_RATE_HZ,
        }
    }
}

/// Sum of fixed-frequency tones, peak-normalized.
#[derive(Debug, Clone)]
pub struct MultiSineSource {
    duration_ms: u64,
}

impl MultiSineSource {
    pub fn new(duration_ms: u64) -> Self {
        Self { duration_ms }
    }
}

impl Default for MultiSineSource {
    fn default() -> Self {
        Self::new(SEGMENT_DURATION_MS)
    }
}

impl SignalSource for MultiSineSource {
    fn produce(&self) -> Segment {
        let n = samples_for(self.duration_ms, SAMPLE_RATE_HZ);
        let mut samples = vec![0.0f32; n];
        for &freq in &TONE_FREQS_HZ {
            let step = 2.0 * std::f32::consts::PI * freq / SAMPLE_RATE_HZ as f32;
            for (i, s) in samples.iter_mut().enumerate() {
                *s += TONE_AMPLITUDE * (step * i as f32).sin();
            }
        }
        peak_normalize(&mut samples);
        Segment {
            samples,
            sample_rate: SAMPLE_RATE_HZ,
        }
    }
}

/// Fixed short zero-amplitude gap between segments.
pub fn silence(duration_ms: u64) -> Segment {
    Segment {
        samples: vec![0.0; samples_for(duration_ms, SAMPLE_RATE_HZ)],
        sample_rate: SAMPLE_RATE_HZ,
    }
}

/// Resolve a mode to its segment source. The mode set is closed; unknown
/// names never reach this point (they fail at `Mode` parsing).
pub fn source_for(mode: Mode, duration_ms: u64) -> Box<dyn SignalSource> {
    match mode {
        Mode::Noise => Box::new(NoiseSource::new(duration_ms)),
        Mode::Sines => Box::new(MultiSineSource::new(duration_ms)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_segment_has_expected_shape() {
        let seg = NoiseSource::new(100).produce();
        assert_eq!(seg.sample_rate, SAMPLE_RATE_HZ);
        assert_eq!(seg.len(), 4410);
        assert_eq!(seg.duration_ms(), 100);
        let peak = seg.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!((peak - 32_767.0).abs() < 1.0);
    }

    #[test]
    fn sines_segment_is_normalized_and_nonzero() {
        let seg = MultiSineSource::new(200).produce();
        assert_eq!(seg.len(), 8820);
        let peak = seg.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()));
        assert!((peak - 32_767.0).abs() < 1.0);
        assert!(seg.samples.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn silence_is_all_zeros() {
        let seg = silence(SILENCE_DURATION_MS);
        assert_eq!(seg.len(), 4410);
        assert!(seg.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn sources_cover_every_mode() {
        for mode in Mode::ALL {
            let seg = source_for(mode, 10).produce();
            assert_eq!(seg.sample_rate, SAMPLE_RATE_HZ);
            assert_eq!(seg.len(), 441);
        }
    }
}
