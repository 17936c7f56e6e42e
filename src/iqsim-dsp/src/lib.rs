// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Signal synthesis and analysis for the IQ stream simulator.
//!
//! Everything in this crate is synchronous and allocation-light; the
//! service binaries decide what runs on blocking workers and what runs on
//! the cooperative scheduler.

pub mod analysis;
pub mod filter;
pub mod iq;
pub mod segment;

pub use analysis::{analyze, to_pcm_bytes, AMPLITUDE_ENVELOPE_LEN, SPECTRUM_BINS};
pub use filter::FilterBank;
pub use iq::{chunk_samples, to_analytic_chunks, AnalyticChunks, IqConverter};
pub use segment::{
    silence, source_for, MultiSineSource, NoiseSource, Segment, SignalSource, SAMPLE_RATE_HZ,
    SEGMENT_DURATION_MS, SILENCE_DURATION_MS,
};
