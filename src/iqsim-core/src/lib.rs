// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod chunk;
pub mod client;
pub mod filter;
pub mod frame;
pub mod mode;
pub mod wire;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use chunk::IqChunk;
pub use client::{ClientCommand, ClientResponse};
pub use filter::FilterCutoffs;
pub use frame::{AnalysisFrame, SpectrumData};
pub use mode::Mode;
