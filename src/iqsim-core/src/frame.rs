// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Analysis frame wire payload.
//!
//! Payload layout: `[4 bytes BE JSON length][JSON frame]` followed by the
//! filtered chunk's raw little-endian 16-bit PCM bytes. The JSON part is
//! what the visualization client plots; the PCM tail lets it reconstruct
//! audio without a second channel.

use serde::{Deserialize, Serialize};

/// Parallel frequency/magnitude arrays of one windowed FFT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumData {
    pub freqs: Vec<f32>,
    pub magnitude: Vec<f32>,
}

/// Per-chunk derived summary for live visualization. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub sample_rate: f64,
    pub amplitude: Vec<f32>,
    pub spectrum: SpectrumData,
}

pub fn encode_analysis_frame(frame: &AnalysisFrame, pcm: &[u8]) -> std::io::Result<Vec<u8>> {
    let json = serde_json::to_vec(frame).map_err(std::io::Error::other)?;
    let mut buf = Vec::with_capacity(4 + json.len() + pcm.len());
    buf.extend_from_slice(&(json.len() as u32).to_be_bytes());
    buf.extend_from_slice(&json);
    buf.extend_from_slice(pcm);
    Ok(buf)
}

pub fn decode_analysis_frame(payload: &[u8]) -> std::io::Result<(AnalysisFrame, Vec<u8>)> {
    if payload.len() < 4 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "analysis frame payload too short",
        ));
    }
    let json_len = u32::from_be_bytes(payload[0..4].try_into().expect("sized slice")) as usize;
    let Some(json_end) = json_len.checked_add(4).filter(|end| *end <= payload.len()) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("analysis frame JSON length {} out of bounds", json_len),
        ));
    };
    let frame: AnalysisFrame =
        serde_json::from_slice(&payload[4..json_end]).map_err(std::io::Error::other)?;
    Ok((frame, payload[json_end..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trips_with_pcm_tail() {
        let frame = AnalysisFrame {
            sample_rate: 44_100.0,
            amplitude: vec![0.0, 0.5, -0.5],
            spectrum: SpectrumData {
                freqs: vec![0.0, 10.0],
                magnitude: vec![1.0, 2.0],
            },
        };
        let pcm = [1u8, 2, 3, 4];
        let payload = encode_analysis_frame(&frame, &pcm).unwrap();
        let (decoded, tail) = decode_analysis_frame(&payload).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(tail, pcm);
    }

    #[test]
    fn bogus_json_length_is_rejected() {
        let payload = [0xFFu8, 0xFF, 0xFF, 0xFF, 0x00];
        assert!(decode_analysis_frame(&payload).is_err());
    }
}
