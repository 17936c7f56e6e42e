// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IQ chunk wire payload.
//!
//! Payload layout: `[8 bytes BE sequence nr][4 bytes BE sample rate]`
//! followed by the analytic signal as interleaved little-endian `f32`
//! (re, im) pairs, the complex64 byte layout the visualization client
//! already consumes.

use num_complex::Complex;

/// One 100 ms slice of analytic signal, the atomic unit of transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct IqChunk {
    pub nr: u64,
    pub sample_rate: u32,
    pub iq: Vec<Complex<f32>>,
}

impl IqChunk {
    const HEADER_LEN: usize = 12;

    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + self.iq.len() * 8);
        buf.extend_from_slice(&self.nr.to_be_bytes());
        buf.extend_from_slice(&self.sample_rate.to_be_bytes());
        for sample in &self.iq {
            buf.extend_from_slice(&sample.re.to_le_bytes());
            buf.extend_from_slice(&sample.im.to_le_bytes());
        }
        buf
    }

    pub fn from_payload(payload: &[u8]) -> std::io::Result<Self> {
        if payload.len() < Self::HEADER_LEN || (payload.len() - Self::HEADER_LEN) % 8 != 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed IQ chunk payload ({} bytes)", payload.len()),
            ));
        }
        let nr = u64::from_be_bytes(payload[0..8].try_into().expect("sized slice"));
        let sample_rate = u32::from_be_bytes(payload[8..12].try_into().expect("sized slice"));
        let iq = payload[Self::HEADER_LEN..]
            .chunks_exact(8)
            .map(|pair| {
                Complex::new(
                    f32::from_le_bytes(pair[0..4].try_into().expect("sized slice")),
                    f32::from_le_bytes(pair[4..8].try_into().expect("sized slice")),
                )
            })
            .collect();
        Ok(Self {
            nr,
            sample_rate,
            iq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips() {
        let chunk = IqChunk {
            nr: 42,
            sample_rate: 44_100,
            iq: vec![Complex::new(1.5, -2.5), Complex::new(0.0, 3.25)],
        };
        let decoded = IqChunk::from_payload(&chunk.to_payload()).unwrap();
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        assert!(IqChunk::from_payload(&[0u8; 7]).is_err());
        // Header plus a half-written sample.
        assert!(IqChunk::from_payload(&[0u8; 16]).is_err());
    }
}
