// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! TCP listeners of the generator.
//!
//! Control plane: JSON lines speaking `ClientCommand`/`ClientResponse`.
//! Stream plane: the framed binary protocol; a client picks its broadcast
//! group with `SET_MODE` and then receives that mode's IQ chunks.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{error, info, warn};

use bytes::Bytes;
use iqsim_app::normalize_name;
use iqsim_core::wire::{
    read_msg, write_msg, SetModeRequest, StreamInfo, MSG_IQ_CHUNK, MSG_SET_MODE, MSG_STREAM_INFO,
};
use iqsim_core::{ClientCommand, ClientResponse, Mode};

use crate::hub::Hub;
use crate::session::{SessionCommand, SessionRequest};

/// Run the JSON control listener, accepting client connections.
pub async fn run_control_listener(
    addr: SocketAddr,
    session_tx: mpsc::Sender<SessionRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Control listener on {}", addr);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Control client connected: {}", peer);

                let tx = session_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_control_client(socket, peer, tx).await {
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
    session_tx: mpsc::Sender<SessionRequest>,
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
            Ok(cmd) => dispatch_command(cmd, &session_tx).await,
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
    session_tx: &mpsc::Sender<SessionRequest>,
) -> ClientResponse {
    let session_cmd = match cmd {
        ClientCommand::Start => SessionCommand::Start,
        ClientCommand::Stop => SessionCommand::Stop,
        ClientCommand::GetStatus => SessionCommand::Status,
        other => {
            return ClientResponse::err(format!(
                "command not supported by the generator: {:?}",
                other
            ))
        }
    };

    let (resp_tx, resp_rx) = oneshot::channel();
    let req = SessionRequest {
        cmd: session_cmd,
        respond_to: resp_tx,
    };
    if session_tx.send(req).await.is_err() {
        error!("Failed to send request to session supervisor");
        return ClientResponse::err("Internal error: session supervisor not available");
    }

    match resp_rx.await {
        Ok(Ok(status)) => ClientResponse::ok().with_status(status),
        Ok(Err(err)) => ClientResponse::err(err),
        Err(e) => {
            error!("Session response oneshot recv error: {:?}", e);
            ClientResponse::err("Internal error waiting for session response")
        }
    }
}

/// Run the stream-plane listener, accepting subscriber connections.
pub async fn run_stream_listener(
    addr: SocketAddr,
    hub: Hub,
    stream_info: StreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Stream listener on {}", addr);

    loop {
        tokio::select! {
            accept = listener.accept() => {
                let (socket, peer) = accept?;
                info!("Stream client connected: {}", peer);

                let hub = hub.clone();
                let info = stream_info.clone();
                let client_shutdown_rx = shutdown_rx.clone();

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_stream_client(socket, peer, hub, info, client_shutdown_rx).await
                    {
                        warn!("Stream client {} error: {:?}", peer, e);
                    }
                    info!("Stream client {} disconnected", peer);
                });
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => {
                        info!("Stream listener shutting down");
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

async fn handle_stream_client(
    socket: TcpStream,
    peer: SocketAddr,
    hub: Hub,
    stream_info: StreamInfo,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (reader, writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    let info_json = serde_json::to_vec(&stream_info).map_err(std::io::Error::other)?;
    write_msg(&mut writer, MSG_STREAM_INFO, &info_json).await?;

    // Group membership of this connection; None until the client picks a
    // mode. The writer task owns the subscription, the read loop below
    // only parses SET_MODE and forwards the choice.
    let (mode_tx, mut mode_rx) = watch::channel(None::<Mode>);

    let write_hub = hub;
    let write_handle = tokio::spawn(async move {
        let mut chunk_rx: Option<broadcast::Receiver<Bytes>> = None;
        loop {
            tokio::select! {
                changed = mode_rx.changed() => {
                    match changed {
                        Ok(()) => {
                            if let Some(mode) = *mode_rx.borrow_and_update() {
                                chunk_rx = Some(write_hub.subscribe(mode));
                            }
                        }
                        Err(_) => break,
                    }
                }
                chunk = recv_chunk(&mut chunk_rx) => {
                    match chunk {
                        Ok(payload) => {
                            if let Err(e) = write_msg(&mut writer, MSG_IQ_CHUNK, &payload).await {
                                warn!("Stream write to {} failed: {}", peer, e);
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Stream: {} dropped {} chunks", peer, n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
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
            Ok((MSG_SET_MODE, payload)) => match parse_set_mode(&payload) {
                Some(mode) => {
                    info!("Stream client {} subscribed to mode {}", peer, mode);
                    let _ = mode_tx.send(Some(mode));
                }
                None => {
                    // Invalid mode switches are a no-op.
                    warn!("Stream client {} requested an unknown mode, ignoring", peer);
                }
            },
            Ok((msg_type, _)) => {
                warn!("Stream: unexpected message type {} from {}", msg_type, peer);
            }
            Err(_) => break,
        }
    }

    write_handle.abort();
    Ok(())
}

/// Receive from the subscribed group, or park forever while no group is
/// selected (the writer loop still serves mode switches meanwhile).
async fn recv_chunk(
    chunk_rx: &mut Option<broadcast::Receiver<Bytes>>,
) -> Result<Bytes, broadcast::error::RecvError> {
    match chunk_rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn parse_set_mode(payload: &[u8]) -> Option<Mode> {
    let req: SetModeRequest = serde_json::from_slice(payload).ok()?;
    normalize_name(&req.mode).parse().ok()
}
