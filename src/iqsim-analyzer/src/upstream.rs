// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Client connection to the IQ generator's stream plane.
//!
//! Reconnects indefinitely with capped backoff; the analyzer keeps
//! waiting for a generator to appear rather than giving up. The
//! configured mode is (re)subscribed on every connect, and mode changes
//! from the control plane are forwarded over the live connection.

use std::sync::Arc;

use tokio::io::{BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration};
use tracing::{info, warn};

use iqsim_core::wire::{
    read_msg, write_msg, SetModeRequest, StreamInfo, MSG_IQ_CHUNK, MSG_SET_MODE, MSG_STREAM_INFO,
};
use iqsim_core::{IqChunk, Mode};

use crate::status::IngestStats;

const RECONNECT_MAX_DELAY_SECS: u64 = 30;

pub async fn run_upstream_client(
    addr: String,
    mode_rx: watch::Receiver<Mode>,
    chunk_tx: mpsc::Sender<IqChunk>,
    stats: Arc<IngestStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut backoff_secs: u64 = 1;

    'reconnect: loop {
        if *shutdown_rx.borrow() {
            info!("Upstream client shutting down");
            return;
        }

        info!("Connecting to IQ generator at {}", addr);
        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    "Connection to IQ generator {} failed: {}, retrying in {}s",
                    addr, e, backoff_secs
                );
                time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(RECONNECT_MAX_DELAY_SECS);
                continue 'reconnect;
            }
        };

        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        // Re-subscribe the active mode on every (re)connect.
        let mode = *mode_rx.borrow();
        if let Err(e) = send_set_mode(&mut writer, mode).await {
            warn!("Mode subscription to {} failed: {}", addr, e);
            time::sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(RECONNECT_MAX_DELAY_SECS);
            continue 'reconnect;
        }
        info!("Connected to IQ generator, subscribed to mode {}", mode);
        backoff_secs = 1;

        // Mode switches go out on their own task so they never interrupt
        // a partially read frame on this one.
        let mut conn_mode_rx = mode_rx.clone();
        let write_handle = tokio::spawn(async move {
            loop {
                match conn_mode_rx.changed().await {
                    Ok(()) => {
                        let mode = *conn_mode_rx.borrow_and_update();
                        if let Err(e) = send_set_mode(&mut writer, mode).await {
                            warn!("Mode switch write failed: {}", e);
                            break;
                        }
                        info!("Switched generator subscription to mode {}", mode);
                    }
                    Err(_) => break,
                }
            }
        });

        loop {
            let msg = tokio::select! {
                msg = read_msg(&mut reader) => msg,
                changed = shutdown_rx.changed() => {
                    match changed {
                        Ok(()) if *shutdown_rx.borrow() => {
                            info!("Upstream client shutting down");
                            write_handle.abort();
                            return;
                        }
                        Ok(()) => continue,
                        Err(_) => {
                            write_handle.abort();
                            return;
                        }
                    }
                }
            };
            match msg {
                Ok((MSG_STREAM_INFO, payload)) => {
                    match serde_json::from_slice::<StreamInfo>(&payload) {
                        Ok(stream_info) => info!(
                            "Generator stream: {} Hz, {} ch, {} ms chunks",
                            stream_info.sample_rate,
                            stream_info.channels,
                            stream_info.chunk_period_ms
                        ),
                        Err(e) => warn!("Malformed stream info: {}", e),
                    }
                }
                Ok((MSG_IQ_CHUNK, payload)) => {
                    let chunk = match IqChunk::from_payload(&payload) {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!("Malformed IQ chunk: {}", e);
                            continue;
                        }
                    };
                    stats.record(chunk.nr, payload.len());
                    if chunk_tx.send(chunk).await.is_err() {
                        info!("Filter pipeline gone, upstream client exiting");
                        write_handle.abort();
                        return;
                    }
                }
                Ok((msg_type, _)) => {
                    warn!("Upstream: unexpected message type {}", msg_type);
                }
                Err(e) => {
                    warn!("Connection to IQ generator lost: {}", e);
                    break;
                }
            }
        }

        write_handle.abort();
        warn!(
            "Disconnected from IQ generator, reconnecting in {}s",
            backoff_secs
        );
        time::sleep(Duration::from_secs(backoff_secs)).await;
        backoff_secs = (backoff_secs * 2).min(RECONNECT_MAX_DELAY_SECS);
    }
}

async fn send_set_mode<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    mode: Mode,
) -> std::io::Result<()> {
    let payload = serde_json::to_vec(&SetModeRequest {
        mode: mode.to_string(),
    })
    .map_err(std::io::Error::other)?;
    write_msg(writer, MSG_SET_MODE, &payload).await
}
