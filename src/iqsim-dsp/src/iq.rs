// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Analytic-signal conversion and chunking.

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::segment::Segment;

/// Number of samples covering `period_ms` at `sample_rate`.
pub fn chunk_samples(sample_rate: u32, period_ms: u16) -> usize {
    (sample_rate as u64 * period_ms as u64 / 1000) as usize
}

/// FFT-based Hilbert transformer producing analytic signals.
///
/// The planner caches plans per length, so converting a run of equal-sized
/// chunks reuses the same FFT.
pub struct IqConverter {
    planner: FftPlanner<f32>,
}

impl IqConverter {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Compute the analytic signal of a real block.
    ///
    /// Frequency-domain construction: keep DC (and Nyquist for even
    /// lengths), double the positive frequencies, zero the negative ones,
    /// then inverse-transform. The real part of the result equals the
    /// input; the imaginary part is its Hilbert transform.
    pub fn analytic(&mut self, samples: &[f32]) -> Vec<Complex<f32>> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let fft = self.planner.plan_fft_forward(n);
        let ifft = self.planner.plan_fft_inverse(n);

        let mut buf: Vec<Complex<f32>> =
            samples.iter().map(|&s| Complex::new(s, 0.0)).collect();
        fft.process(&mut buf);

        let half = n / 2;
        if n % 2 == 0 {
            for x in &mut buf[1..half] {
                *x *= 2.0;
            }
        } else {
            for x in &mut buf[1..=half] {
                *x *= 2.0;
            }
        }
        for x in &mut buf[half + 1..] {
            *x = Complex::new(0.0, 0.0);
        }

        ifft.process(&mut buf);
        // rustfft leaves the inverse unnormalized.
        let scale = 1.0 / n as f32;
        for x in &mut buf {
            *x *= scale;
        }
        buf
    }
}

impl Default for IqConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy, finite, non-restartable sequence of analytic chunks covering a
/// segment end-to-end. The final chunk may be shorter than the nominal
/// period and is preserved verbatim.
pub struct AnalyticChunks<'a> {
    segment: &'a Segment,
    converter: IqConverter,
    chunk_len: usize,
    pos: usize,
}

impl Iterator for AnalyticChunks<'_> {
    type Item = Vec<Complex<f32>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.segment.samples.len() {
            return None;
        }
        let end = (self.pos + self.chunk_len).min(self.segment.samples.len());
        let chunk = self.converter.analytic(&self.segment.samples[self.pos..end]);
        self.pos = end;
        Some(chunk)
    }
}

pub fn to_analytic_chunks(segment: &Segment, period_ms: u16) -> AnalyticChunks<'_> {
    AnalyticChunks {
        segment,
        converter: IqConverter::new(),
        chunk_len: chunk_samples(segment.sample_rate, period_ms).max(1),
        pos: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{silence, NoiseSource, SignalSource, SAMPLE_RATE_HZ};

    #[test]
    fn chunks_cover_segment_exactly() {
        // 250 ms does not divide evenly into 100 ms chunks: expect
        // 4410 + 4410 + 2205 samples.
        let seg = NoiseSource::new(250).produce();
        let lens: Vec<usize> = to_analytic_chunks(&seg, 100).map(|c| c.len()).collect();
        assert_eq!(lens, vec![4410, 4410, 2205]);
        assert_eq!(lens.iter().sum::<usize>(), seg.len());
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let seg = silence(300);
        let lens: Vec<usize> = to_analytic_chunks(&seg, 100).map(|c| c.len()).collect();
        assert_eq!(lens, vec![4410, 4410, 4410]);
    }

    #[test]
    fn analytic_real_part_matches_input() {
        let seg = NoiseSource::new(100).produce();
        let analytic = IqConverter::new().analytic(&seg.samples);
        // Samples are on the ±32767 scale; allow for f32 FFT round-trip error.
        for (orig, z) in seg.samples.iter().zip(&analytic) {
            assert!(
                (orig - z.re).abs() < 5.0,
                "real part diverged: {} vs {}",
                orig,
                z.re
            );
        }
    }

    #[test]
    fn analytic_envelope_of_sine_is_flat() {
        let n = 4410;
        let freq = 1000.0f32;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE_HZ as f32).sin()
            })
            .collect();
        let analytic = IqConverter::new().analytic(&samples);
        // Away from the block edges the magnitude of the analytic signal
        // of a unit sine is ~1.
        for z in &analytic[200..n - 200] {
            assert!((z.norm() - 1.0).abs() < 0.05, "envelope {}", z.norm());
        }
    }
}
