// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

pub const DEFAULT_LOW_CUT_HZ: f64 = 20.0;
pub const DEFAULT_HIGH_CUT_HZ: f64 = 22_000.0;

/// Band-pass corner frequencies shared between the control plane and the
/// filter pipeline. Invariant: `0 < low_cut < high_cut < sample_rate / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterCutoffs {
    pub low_cut: f64,
    pub high_cut: f64,
}

impl Default for FilterCutoffs {
    fn default() -> Self {
        Self {
            low_cut: DEFAULT_LOW_CUT_HZ,
            high_cut: DEFAULT_HIGH_CUT_HZ,
        }
    }
}

impl FilterCutoffs {
    pub fn new(low_cut: f64, high_cut: f64) -> Self {
        Self { low_cut, high_cut }
    }

    /// Validate the cutoff invariant against a sample rate.
    pub fn validate(&self, sample_rate: f64) -> Result<(), String> {
        if !self.low_cut.is_finite() || !self.high_cut.is_finite() {
            return Err("cutoff frequencies must be finite".to_string());
        }
        if self.low_cut <= 0.0 {
            return Err(format!("low_cut must be > 0 (got {})", self.low_cut));
        }
        if self.low_cut >= self.high_cut {
            return Err(format!(
                "low_cut must be < high_cut (got {} >= {})",
                self.low_cut, self.high_cut
            ));
        }
        if self.high_cut >= sample_rate / 2.0 {
            return Err(format!(
                "high_cut must be below the Nyquist frequency {} (got {})",
                sample_rate / 2.0,
                self.high_cut
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cutoffs_are_valid() {
        assert!(FilterCutoffs::default().validate(44_100.0).is_ok());
    }

    #[test]
    fn rejects_inverted_and_out_of_range_cutoffs() {
        assert!(FilterCutoffs::new(8000.0, 100.0).validate(44_100.0).is_err());
        assert!(FilterCutoffs::new(0.0, 8000.0).validate(44_100.0).is_err());
        assert!(FilterCutoffs::new(-5.0, 8000.0).validate(44_100.0).is_err());
        assert!(FilterCutoffs::new(20.0, 23_000.0)
            .validate(44_100.0)
            .is_err());
        assert!(FilterCutoffs::new(20.0, f64::NAN).validate(44_100.0).is_err());
    }
}
