// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod hub;
mod listener;
mod pacer;
mod session;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use iqsim_app::{init_logging, ConfigFile};
use iqsim_core::wire::StreamInfo;
use iqsim_core::DynResult;

use config::GeneratorConfig;
use hub::Hub;
use session::{SessionCommand, SessionRequest, StreamTiming};

const PKG_DESCRIPTION: &str = concat!(
    env!("CARGO_PKG_NAME"),
    " - synthetic IQ stream generator daemon"
);
const SESSION_CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the TCP listeners
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the stream-plane listener
    #[arg(long = "stream-port")]
    stream_port: Option<u16>,
    /// Port for the JSON control listener
    #[arg(long = "control-port")]
    control_port: Option<u16>,
    /// Whether to start the stream sessions at boot (overrides config)
    #[arg(long = "auto-start")]
    auto_start: Option<bool>,
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", GeneratorConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        (GeneratorConfig::load_from_file(path)?, Some(path.clone()))
    } else {
        GeneratorConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid generator configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let listen_ip = cli.listen.unwrap_or(cfg.listen.listen);
    let stream_addr =
        SocketAddr::from((listen_ip, cli.stream_port.unwrap_or(cfg.listen.stream_port)));
    let control_addr = SocketAddr::from((
        listen_ip,
        cli.control_port.unwrap_or(cfg.listen.control_port),
    ));
    let auto_start = cli.auto_start.unwrap_or(cfg.stream.auto_start);

    info!(
        "Starting iqsim-generator (stream: {}, control: {}, auto_start: {})",
        stream_addr, control_addr, auto_start
    );

    let timing = StreamTiming {
        segment_ms: cfg.stream.segment_ms,
        silence_ms: cfg.stream.silence_ms,
        chunk_period_ms: cfg.stream.chunk_period_ms,
    };
    let stream_info = StreamInfo {
        sample_rate: iqsim_dsp::SAMPLE_RATE_HZ,
        channels: 1,
        chunk_period_ms: cfg.stream.chunk_period_ms,
    };

    let hub = Hub::new(cfg.stream.channel_capacity);
    let (session_tx, session_rx) = mpsc::channel::<SessionRequest>(SESSION_CHANNEL_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();

    let supervisor_hub = hub.clone();
    let supervisor_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        session::run_sessions(timing, supervisor_hub, session_rx, supervisor_shutdown_rx).await;
    }));

    let stream_hub = hub.clone();
    let stream_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) =
            listener::run_stream_listener(stream_addr, stream_hub, stream_info, stream_shutdown_rx)
                .await
        {
            error!("Stream listener error: {:?}", e);
        }
    }));

    let control_session_tx = session_tx.clone();
    let control_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) =
            listener::run_control_listener(control_addr, control_session_tx, control_shutdown_rx)
                .await
        {
            error!("Control listener error: {:?}", e);
        }
    }));

    if auto_start {
        let (resp_tx, resp_rx) = oneshot::channel();
        let req = SessionRequest {
            cmd: SessionCommand::Start,
            respond_to: resp_tx,
        };
        if session_tx.send(req).await.is_err() {
            error!("Auto-start failed: session supervisor not available");
        } else {
            match resp_rx.await {
                Ok(Ok(status)) => info!("Stream sessions auto-started ({})", status),
                Ok(Err(e)) => error!("Auto-start rejected: {}", e),
                Err(e) => error!("Auto-start response error: {:?}", e),
            }
        }
    }

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    drop(session_tx);
    tokio::time::sleep(Duration::from_millis(400)).await;

    for handle in &task_handles {
        if !handle.is_finished() {
            handle.abort();
        }
    }
    for handle in task_handles {
        let _ = handle.await;
    }
    Ok(())
}
