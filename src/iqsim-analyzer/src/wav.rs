// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Re-streaming queue and the pseudo-infinite WAV audio listener.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};

/// Streaming WAV header with sentinel sizes: the container never ends, so
/// both the RIFF size and the data size are pinned at 0xFFFFFFFF.
pub fn wav_stream_header(sample_rate: u32, channels: u16, bits_per_sample: u16) -> [u8; 44] {
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;

    let mut header = [0u8; 44];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    header
}

/// Single-producer, single-consumer FIFO of raw PCM spans.
///
/// `push` never blocks: the queue is unbounded and carries no
/// backpressure, so a missing or slow audio consumer lets the backlog
/// grow until one attaches and drains it. A `None` sentinel tells the
/// consumer to stop cleanly.
#[derive(Clone)]
pub struct WavStream {
    tx: mpsc::UnboundedSender<Option<Bytes>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Option<Bytes>>>>,
}

impl WavStream {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn push(&self, data: Bytes) {
        let _ = self.tx.send(Some(data));
    }

    /// Signal the consumer to stop cleanly and close its stream.
    pub fn finish(&self) {
        let _ = self.tx.send(None);
    }

    /// Exclusive access to the consuming end. Held for the lifetime of
    /// one audio consumer; a second consumer waits here until the first
    /// disconnects and then resumes from the backlog.
    pub async fn consumer(&self) -> tokio::sync::MutexGuard<'_, mpsc::UnboundedReceiver<Option<Bytes>>> {
        self.rx.lock().await
    }
}

impl Default for WavStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the audio TCP listener serving the pseudo-infinite WAV stream.
pub async fn run_audio_listener(
    addr: SocketAddr,
    wav: WavStream,
    sample_rate: u32,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Audio listener on {}", addr);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Audio consumer connected: {}", peer);

                let wav = wav.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_audio_consumer(socket, peer, wav, sample_rate).await {
                        warn!("Audio consumer {} error: {:?}", peer, e);
                    }
                    info!("Audio consumer {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Audio listener shutting down");
                        break;
                    }
                    Ok(()) => {}
                    Err(_) => break,
                }
            }
        }
    }
    Ok(())
}

async fn handle_audio_consumer(
    socket: TcpStream,
    peer: SocketAddr,
    wav: WavStream,
    sample_rate: u32,
) -> std::io::Result<()> {
    let mut rx = wav.consumer().await;
    let mut writer = BufWriter::new(socket);

    writer.write_all(&wav_stream_header(sample_rate, 1, 16)).await?;
    writer.flush().await?;
    info!("Audio consumer {} attached to the stream", peer);

    loop {
        match rx.recv().await {
            Some(Some(data)) => {
                writer.write_all(&data).await?;
                writer.flush().await?;
            }
            Some(None) => {
                info!("Audio stream finished, closing consumer {}", peer);
                break;
            }
            None => break,
        }
    }
    Ok(())
}
