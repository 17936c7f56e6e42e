// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Periodic ingest-status reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Duration, Instant};
use tracing::info;

const REPORT_INTERVAL: Duration = Duration::from_secs(5);
/// Slightly more than one report interval, so a stream that died right
/// after the last report is flagged on the next one.
const STALE_AFTER_MS: u64 = 5200;

/// Counters updated by the upstream client on every received chunk.
pub struct IngestStats {
    started: Instant,
    bytes_in_window: AtomicU64,
    last_nr: AtomicU64,
    last_recv_ms: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            bytes_in_window: AtomicU64::new(0),
            last_nr: AtomicU64::new(0),
            last_recv_ms: AtomicU64::new(0),
        }
    }

    pub fn record(&self, nr: u64, byte_count: usize) {
        self.bytes_in_window
            .fetch_add(byte_count as u64, Ordering::Relaxed);
        self.last_nr.store(nr, Ordering::Relaxed);
        self.last_recv_ms
            .store(self.started.elapsed().as_millis() as u64, Ordering::Relaxed);
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Log the ingest state every five seconds.
pub async fn run_status_reporter(stats: Arc<IngestStats>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut tick = time::interval(REPORT_INTERVAL);
    tick.tick().await; // completes immediately

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let bytes = stats.bytes_in_window.swap(0, Ordering::Relaxed);
                let now_ms = stats.started.elapsed().as_millis() as u64;
                let last_ms = stats.last_recv_ms.load(Ordering::Relaxed);
                if bytes == 0 || now_ms.saturating_sub(last_ms) > STALE_AFTER_MS {
                    info!("Status: NO DATA incoming");
                } else {
                    info!(
                        "Status: DATA incoming ({} bytes in the last {}s, last chunk nr {})",
                        bytes,
                        REPORT_INTERVAL.as_secs(),
                        stats.last_nr.load(Ordering::Relaxed)
                    );
                }
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
}
