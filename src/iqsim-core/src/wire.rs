// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Stream-plane protocol types and framing helpers.
//!
//! Wire format: `[1 byte type][4 bytes BE length N][N bytes payload]`

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// JSON `StreamInfo`, sent once by the server when a client connects.
pub const MSG_STREAM_INFO: u8 = 0x00;
/// JSON `{ "mode": ... }`, sent by a subscriber to pick its broadcast group.
pub const MSG_SET_MODE: u8 = 0x01;
/// Binary IQ chunk payload, see [`crate::chunk::IqChunk`].
pub const MSG_IQ_CHUNK: u8 = 0x02;
/// Analysis frame: JSON header plus raw PCM, see [`crate::frame`].
pub const MSG_ANALYSIS_FRAME: u8 = 0x03;

/// Maximum payload size (4 MB) to reject bogus frames early.
const MAX_PAYLOAD_SIZE: u32 = 4 * 1_048_576;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u8,
    pub chunk_period_ms: u16,
}

/// Body of a [`MSG_SET_MODE`] message.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

/// Write a length-prefixed stream message.
pub async fn write_msg<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
) -> std::io::Result<()> {
    let len = payload.len() as u32;
    writer.write_u8(msg_type).await?;
    writer.write_u32(len).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed stream message, returning `(type, payload)`.
pub async fn read_msg<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let msg_type = reader.read_u8().await?;
    let len = reader.read_u32().await?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("stream frame too large: {} bytes", len),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok((msg_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn framed_messages_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        write_msg(&mut client, MSG_SET_MODE, br#"{"mode":"sines"}"#)
            .await
            .unwrap();
        write_msg(&mut client, MSG_IQ_CHUNK, &[1, 2, 3]).await.unwrap();

        let (ty, payload) = read_msg(&mut server).await.unwrap();
        assert_eq!(ty, MSG_SET_MODE);
        assert_eq!(payload, br#"{"mode":"sines"}"#);

        let (ty, payload) = read_msg(&mut server).await.unwrap();
        assert_eq!(ty, MSG_IQ_CHUNK);
        assert_eq!(payload, vec![1, 2, 3]);
    }
}
