// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP listeners of the analyzer.
//!
//! Control plane: JSON lines speaking `ClientCommand`/`ClientResponse`
//! (filter and mode commands). Analysis plane: the framed binary
//! protocol; every connected client receives the live analysis frames.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info, warn};

use iqsim_app::normalize_name;
use iqsim_core::wire::{read_msg, write_msg, StreamInfo, MSG_ANALYSIS_FRAME, MSG_STREAM_INFO};
use iqsim_core::{ClientCommand, ClientResponse, FilterCutoffs, Mode};

use crate::pipeline::{FilterCommand, FilterRequest};

/// Run the JSON control listener, accepting client connections.
pub async fn run_control_listener(
    addr: SocketAddr,
    filter_tx: mpsc::Sender<FilterRequest>,
    mode_tx: watch::Sender<Mode>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Control listener on {}", addr);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Control client connected: {}", peer);

                let filter_tx = filter_tx.clone();
                let mode_tx = mode_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        handle_control_client(socket, peer, filter_tx, mode_tx).await
                    {
                        error!("Control client {} error: {:?}", peer, e);
                    }
                    info!("Control client {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Control listener shutting down");
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

async fn handle_control_client(
    socket: TcpStream,
    addr: SocketAddr,
    filter_tx: mpsc::Sender<FilterRequest>,
    mode_tx: watch::Sender<Mode>,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ClientCommand>(trimmed) {
            Ok(cmd) => dispatch_command(cmd, &filter_tx, &mode_tx).await,
            Err(e) => {
                error!("Invalid JSON from {}: {} / {:?}", addr, trimmed, e);
                ClientResponse::err(format!("Invalid JSON: {}", e))
            }
        };

        let resp_line = serde_json::to_string(&response)? + "\n";
        writer.write_all(resp_line.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn dispatch_command(
    cmd: ClientCommand,
    filter_tx: &mpsc::Sender<FilterRequest>,
    mode_tx: &watch::Sender<Mode>,
) -> ClientResponse {
    match cmd {
        ClientCommand::SetFilter { low_cut, high_cut } => {
            filter_request(
                filter_tx,
                FilterCommand::Set(FilterCutoffs::new(low_cut, high_cut)),
            )
            .await
        }
        ClientCommand::GetFilter => filter_request(filter_tx, FilterCommand::Get).await,
        ClientCommand::ResetFilter => filter_request(filter_tx, FilterCommand::Reset).await,
        ClientCommand::SetMode { mode } => set_mode(mode_tx, &mode),
        ClientCommand::GetMode => ClientResponse::ok().with_mode(mode_tx.borrow().to_string()),
        other => ClientResponse::err(format!(
            "command not supported by the analyzer: {:?}",
            other
        )),
    }
}

async fn filter_request(
    filter_tx: &mpsc::Sender<FilterRequest>,
    cmd: FilterCommand,
) -> ClientResponse {
    let (resp_tx, resp_rx) = oneshot::channel();
    let req = FilterRequest {
        cmd,
        respond_to: resp_tx,
    };
    if filter_tx.send(req).await.is_err() {
        error!("Failed to send request to filter pipeline");
        return ClientResponse::err("Internal error: filter pipeline not available");
    }

    match resp_rx.await {
        Ok(Ok(cutoffs)) => ClientResponse::ok().with_filter(cutoffs),
        Ok(Err(err)) => ClientResponse::err(err),
        Err(e) => {
            error!("Filter response oneshot recv error: {:?}", e);
            ClientResponse::err("Internal error waiting for filter response")
        }
    }
}

/// Switch the active generation mode. An unknown mode name is a no-op:
/// the previous mode stays active and the response says so.
fn set_mode(mode_tx: &watch::Sender<Mode>, requested: &str) -> ClientResponse {
    match normalize_name(requested).parse::<Mode>() {
        Ok(mode) => {
            let _ = mode_tx.send(mode);
            info!("Active mode set to {}", mode);
            ClientResponse::ok()
                .with_mode(mode.to_string())
                .with_status("mode changed")
        }
        Err(_) => {
            let current = *mode_tx.borrow();
            warn!(
                "Ignoring request for unknown mode {:?}, staying on {}",
                requested, current
            );
            ClientResponse::ok()
                .with_mode(current.to_string())
                .with_status("mode unchanged")
        }
    }
}

/// Run the analysis-plane listener, pushing frames to every client.
pub async fn run_analysis_listener(
    addr: SocketAddr,
    frame_tx: broadcast::Sender<Bytes>,
    stream_info: StreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Analysis listener on {}", addr);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Analysis client connected: {}", peer);

                let frame_rx = frame_tx.subscribe();
                let info = stream_info.clone();
                let client_shutdown_rx = shutdown_rx.clone();

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_analysis_client(socket, peer, frame_rx, info, client_shutdown_rx)
                            .await
                    {
                        warn!("Analysis client {} error: {:?}", peer, e);
                    }
                    info!("Analysis client {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Analysis listener shutting down");
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

async fn handle_analysis_client(
    socket: TcpStream,
    peer: SocketAddr,
    mut frame_rx: broadcast::Receiver<Bytes>,
    stream_info: StreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (reader, writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    let info_json = serde_json::to_vec(&stream_info).map_err(std::io::Error::other)?;
    write_msg(&mut writer, MSG_STREAM_INFO, &info_json).await?;

    // Frame forwarding runs in its own task so the read loop below (which
    // only detects disconnects) never interrupts a write mid-frame.
    let write_handle = tokio::spawn(async move {
        loop {
            match frame_rx.recv().await {
                Ok(payload) => {
                    if let Err(e) = write_msg(&mut writer, MSG_ANALYSIS_FRAME, &payload).await {
                        warn!("Analysis write to {} failed: {}", peer, e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Analysis: {} dropped {} frames", peer, n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = read_msg(&mut reader) => msg,
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => break,
                    Ok(()) => continue,
                    Err(_) => break,
                }
            }
        };
        match msg {
            Ok((msg_type, _)) => {
                warn!("Analysis: unexpected message type {} from {}", msg_type, peer);
            }
            Err(_) => break,
        }
    }

    write_handle.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_mode_is_a_no_op() {
        let (mode_tx, _mode_rx) = watch::channel(Mode::Noise);

        let resp = set_mode(&mode_tx, "triangle");
        assert!(resp.success);
        assert_eq!(resp.mode.as_deref(), Some("noise"));
        assert_eq!(resp.status.as_deref(), Some("mode unchanged"));
        assert_eq!(*mode_tx.borrow(), Mode::Noise);

        let resp = set_mode(&mode_tx, "sines");
        assert_eq!(resp.mode.as_deref(), Some("sines"));
        assert_eq!(*mode_tx.borrow(), Mode::Sines);
    }
}
