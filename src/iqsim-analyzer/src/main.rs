// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod listener;
mod pipeline;
mod status;
mod upstream;
mod wav;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use iqsim_app::{init_logging, ConfigFile};
use iqsim_core::wire::StreamInfo;
use iqsim_core::{DynResult, IqChunk, Mode};

use config::AnalyzerConfig;
use pipeline::FilterRequest;
use status::IngestStats;
use wav::WavStream;

const PKG_DESCRIPTION: &str = concat!(
    env!("CARGO_PKG_NAME"),
    " - IQ stream filter and analyzer daemon"
);
const FILTER_CHANNEL_BUFFER: usize = 32;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Address of the IQ generator stream plane (host:port)
    #[arg(short = 'g', long = "generator")]
    generator: Option<String>,
    /// IP address for the TCP listeners
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", AnalyzerConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        (AnalyzerConfig::load_from_file(path)?, Some(path.clone()))
    } else {
        AnalyzerConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid analyzer configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let generator_addr = cli
        .generator
        .clone()
        .unwrap_or_else(|| cfg.generator.connect_addr());
    let listen_ip = cli.listen.unwrap_or(cfg.listen.listen);
    let analysis_addr = SocketAddr::from((listen_ip, cfg.listen.analysis_port));
    let control_addr = SocketAddr::from((listen_ip, cfg.listen.control_port));
    let audio_addr = SocketAddr::from((listen_ip, cfg.listen.audio_port));
    let initial_mode = cfg.initial_mode().map_err(|e| format!("Invalid mode: {}", e))?;
    let sample_rate = cfg.analysis.sample_rate;

    info!(
        "Starting iqsim-analyzer (generator: {}, analysis: {}, control: {}, audio: {})",
        generator_addr, analysis_addr, control_addr, audio_addr
    );

    let stats = Arc::new(IngestStats::new());
    let wav = WavStream::new();
    let stream_info = StreamInfo {
        sample_rate,
        channels: 1,
        chunk_period_ms: 100,
    };

    let (mode_tx, mode_rx) = watch::channel::<Mode>(initial_mode);
    let (chunk_tx, chunk_rx) = mpsc::channel::<IqChunk>(cfg.analysis.chunk_queue);
    let (filter_tx, filter_rx) = mpsc::channel::<FilterRequest>(FILTER_CHANNEL_BUFFER);
    let (frame_tx, _) = broadcast::channel::<Bytes>(cfg.analysis.channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut task_handles: Vec<JoinHandle<()>> = Vec::new();

    let upstream_stats = Arc::clone(&stats);
    let upstream_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        upstream::run_upstream_client(
            generator_addr,
            mode_rx,
            chunk_tx,
            upstream_stats,
            upstream_shutdown_rx,
        )
        .await;
    }));

    let pipeline_frame_tx = frame_tx.clone();
    let pipeline_wav = wav.clone();
    let pipeline_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        pipeline::run_pipeline(
            sample_rate,
            chunk_rx,
            filter_rx,
            pipeline_frame_tx,
            pipeline_wav,
            pipeline_shutdown_rx,
        )
        .await;
    }));

    let analysis_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) =
            listener::run_analysis_listener(analysis_addr, frame_tx, stream_info, analysis_shutdown_rx)
                .await
        {
            error!("Analysis listener error: {:?}", e);
        }
    }));

    let control_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) =
            listener::run_control_listener(control_addr, filter_tx, mode_tx, control_shutdown_rx)
                .await
        {
            error!("Control listener error: {:?}", e);
        }
    }));

    let audio_wav = wav.clone();
    let audio_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        if let Err(e) =
            wav::run_audio_listener(audio_addr, audio_wav, sample_rate, audio_shutdown_rx).await
        {
            error!("Audio listener error: {:?}", e);
        }
    }));

    let status_stats = Arc::clone(&stats);
    let status_shutdown_rx = shutdown_rx.clone();
    task_handles.push(tokio::spawn(async move {
        status::run_status_reporter(status_stats, status_shutdown_rx).await;
    }));

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    wav.finish();
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
