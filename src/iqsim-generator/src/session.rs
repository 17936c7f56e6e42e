// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-mode stream sessions and their supervisor.
//!
//! One session per mode, created once and reused across start/stop
//! cycles. All sessions start and stop together; a start while any driver
//! loop is still alive is a conflict. The sequence counter survives stop
//! and continues on the next start.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{self, JoinHandle};
use tokio::time::Duration;
use tracing::{error, info};

use iqsim_core::{IqChunk, Mode};
use iqsim_dsp::{silence, source_for, to_analytic_chunks, Segment, SignalSource};

use crate::hub::Hub;
use crate::pacer::ChunkPacer;

/// Timing knobs of the stream loop.
#[derive(Debug, Clone, Copy)]
pub struct StreamTiming {
    pub segment_ms: u64,
    pub silence_ms: u64,
    pub chunk_period_ms: u16,
}

pub enum SessionCommand {
    Start,
    Stop,
    Status,
}

/// Request sent to the session supervisor task.
pub struct SessionRequest {
    pub cmd: SessionCommand,
    pub respond_to: oneshot::Sender<Result<String, String>>,
}

struct StreamSession {
    mode: Mode,
    nr: Arc<AtomicU64>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl StreamSession {
    fn new(mode: Mode) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            mode,
            nr: Arc::new(AtomicU64::new(0)),
            stop_tx,
            task: None,
        }
    }

    /// A session counts as running until its driver loop has fully wound
    /// down, which includes the drain after a stop request.
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn start(&mut self, timing: StreamTiming, hub: Hub) {
        let _ = self.stop_tx.send(false);
        let stop_rx = self.stop_tx.subscribe();
        let nr = Arc::clone(&self.nr);
        self.task = Some(tokio::spawn(run_stream_loop(
            self.mode, timing, hub, nr, stop_rx,
        )));
    }

    fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Run the session supervisor: owns every mode's session and serializes
/// start/stop/status requests.
pub async fn run_sessions(
    timing: StreamTiming,
    hub: Hub,
    mut rx: mpsc::Receiver<SessionRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut sessions: Vec<StreamSession> =
        Mode::ALL.iter().map(|&mode| StreamSession::new(mode)).collect();

    loop {
        tokio::select! {
            req = rx.recv() => {
                let Some(req) = req else { break };
                let result = handle_request(&req.cmd, &mut sessions, timing, &hub);
                let _ = req.respond_to.send(result);
            }
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => break,
                    Ok(()) => {}
                    Err(_) => break,
                }
            }
        }
    }

    for session in &sessions {
        session.request_stop();
    }
}

fn handle_request(
    cmd: &SessionCommand,
    sessions: &mut [StreamSession],
    timing: StreamTiming,
    hub: &Hub,
) -> Result<String, String> {
    match cmd {
        SessionCommand::Start => {
            if sessions.iter().any(StreamSession::is_running) {
                return Err("streams already running".to_string());
            }
            for session in sessions.iter_mut() {
                session.start(timing, hub.clone());
            }
            info!("Stream sessions started");
            Ok("started".to_string())
        }
        SessionCommand::Stop => {
            for session in sessions.iter() {
                session.request_stop();
            }
            info!("Stream sessions stopping at the next chunk boundary");
            Ok("stopped".to_string())
        }
        SessionCommand::Status => {
            let running = sessions.iter().any(StreamSession::is_running);
            Ok(if running { "running" } else { "idle" }.to_string())
        }
    }
}

/// Driver loop of one mode's session.
///
/// Streams the current segment while the next segment and the silence gap
/// are synthesized on blocking workers, then streams the gap and adopts
/// the next segment. Preparation never runs more than one segment ahead.
async fn run_stream_loop(
    mode: Mode,
    timing: StreamTiming,
    hub: Hub,
    nr: Arc<AtomicU64>,
    stop_rx: watch::Receiver<bool>,
) {
    let source: Arc<dyn SignalSource> = Arc::from(source_for(mode, timing.segment_ms));

    let first = Arc::clone(&source);
    let mut current = match task::spawn_blocking(move || first.produce()).await {
        Ok(segment) => segment,
        Err(e) => {
            error!("Segment synthesis for mode {} failed: {}", mode, e);
            return;
        }
    };

    // One pacing grid per running episode; segments and silence gaps stay
    // on the same schedule.
    let mut pacer = ChunkPacer::new(Duration::from_millis(timing.chunk_period_ms as u64));

    loop {
        info!("Start sending next segment in mode {}", mode);

        let next_source = Arc::clone(&source);
        let silence_ms = timing.silence_ms;
        let (completed, next, gap) = tokio::join!(
            stream_segment(&current, mode, &timing, &mut pacer, &hub, &nr, &stop_rx),
            task::spawn_blocking(move || next_source.produce()),
            task::spawn_blocking(move || silence(silence_ms)),
        );
        let (Ok(next), Ok(gap)) = (next, gap) else {
            error!("Segment synthesis for mode {} failed", mode);
            break;
        };
        if !completed {
            break;
        }
        if !stream_segment(&gap, mode, &timing, &mut pacer, &hub, &nr, &stop_rx).await {
            break;
        }
        current = next;
        if *stop_rx.borrow() {
            break;
        }
    }

    info!("Stream session for mode {} is idle", mode);
}

/// Emit one segment chunk-by-chunk on the pacing grid. Returns `false`
/// when a stop request ended the stream mid-segment; the chunk being sent
/// is always completed first.
async fn stream_segment(
    segment: &Segment,
    mode: Mode,
    timing: &StreamTiming,
    pacer: &mut ChunkPacer,
    hub: &Hub,
    nr: &AtomicU64,
    stop_rx: &watch::Receiver<bool>,
) -> bool {
    for iq in to_analytic_chunks(segment, timing.chunk_period_ms) {
        if *stop_rx.borrow() {
            return false;
        }
        let chunk = IqChunk {
            nr: nr.fetch_add(1, Ordering::Relaxed) + 1,
            sample_rate: segment.sample_rate,
            iq,
        };
        pacer.advance();
        hub.send(mode, Bytes::from(chunk.to_payload()));
        pacer.wait().await;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing() -> StreamTiming {
        StreamTiming {
            segment_ms: 1000,
            silence_ms: 100,
            chunk_period_ms: 100,
        }
    }

    async fn request(
        tx: &mpsc::Sender<SessionRequest>,
        cmd: SessionCommand,
    ) -> Result<String, String> {
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(SessionRequest {
            cmd,
            respond_to: resp_tx,
        })
        .await
        .expect("supervisor alive");
        resp_rx.await.expect("supervisor replied")
    }

    #[tokio::test(start_paused = true)]
    async fn one_segment_yields_expected_chunk_sequence() {
        let hub = Hub::new(1024);
        let mut rx = hub.subscribe(Mode::Noise);
        let (stop_tx, stop_rx) = watch::channel(false);
        let nr = Arc::new(AtomicU64::new(0));

        let driver = tokio::spawn(run_stream_loop(
            Mode::Noise,
            StreamTiming {
                segment_ms: 10_000,
                silence_ms: 100,
                chunk_period_ms: 100,
            },
            hub.clone(),
            Arc::clone(&nr),
            stop_rx,
        ));

        // A 10 s segment at 100 ms per chunk: chunks 1..=100, then the
        // silence gap continues the sequence with 101.
        for expected_nr in 1..=101u64 {
            let payload = rx.recv().await.unwrap();
            let chunk = IqChunk::from_payload(&payload).unwrap();
            assert_eq!(chunk.nr, expected_nr);
            assert_eq!(chunk.sample_rate, 44_100);
            assert_eq!(chunk.iq.len(), 4410);
        }

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(60), driver)
            .await
            .expect("driver stopped")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_conflicts_and_stop_is_idempotent() {
        let hub = Hub::new(1024);
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let supervisor = tokio::spawn(run_sessions(timing(), hub, rx, shutdown_rx));

        assert_eq!(request(&tx, SessionCommand::Status).await.unwrap(), "idle");
        assert_eq!(request(&tx, SessionCommand::Start).await.unwrap(), "started");
        assert_eq!(
            request(&tx, SessionCommand::Status).await.unwrap(),
            "running"
        );
        assert!(request(&tx, SessionCommand::Start).await.is_err());

        assert_eq!(request(&tx, SessionCommand::Stop).await.unwrap(), "stopped");
        assert_eq!(request(&tx, SessionCommand::Stop).await.unwrap(), "stopped");

        drop(tx);
        tokio::time::timeout(Duration::from_secs(30), supervisor)
            .await
            .expect("supervisor exited")
            .unwrap();
    }
}
