// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Deadline-based pacing for the chunk emission loop.

use tokio::time::{sleep_until, Duration, Instant};
use tracing::debug;

/// Paces emissions so each chunk's end lands `period` after the previous
/// chunk's scheduled end, measured against the tokio monotonic clock.
///
/// The deadline grid is anchored where the pacer is created (session
/// start). `advance` moves the grid by strict increments BEFORE the send;
/// `wait` sleeps only when the deadline is still ahead, so a missed
/// deadline is absorbed once instead of stacking into a backlog.
#[derive(Debug)]
pub struct ChunkPacer {
    period: Duration,
    next_deadline: Instant,
}

impl ChunkPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_deadline: Instant::now(),
        }
    }

    /// Schedule the next target end time.
    pub fn advance(&mut self) {
        self.next_deadline += self.period;
    }

    /// Suspend until the current deadline, or return immediately when it
    /// has already passed.
    pub async fn wait(&self) {
        let now = Instant::now();
        if self.next_deadline > now {
            sleep_until(self.next_deadline).await;
        } else {
            debug!(
                "pacing deadline missed by {:?}, continuing immediately",
                now - self.next_deadline
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn interval_converges_to_period() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let mut pacer = ChunkPacer::new(period);

        for _ in 0..60 {
            pacer.advance();
            pacer.wait().await;
        }

        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn sub_period_delays_do_not_drift_the_grid() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let mut pacer = ChunkPacer::new(period);

        for i in 0..60 {
            pacer.advance();
            if i % 3 == 0 {
                // Artificial send delay shorter than one period.
                tokio::time::sleep(Duration::from_millis(40)).await;
            }
            pacer.wait().await;
        }

        assert_eq!(start.elapsed(), Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn overruns_are_absorbed_without_backlog() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let mut pacer = ChunkPacer::new(period);

        for i in 0..50 {
            pacer.advance();
            if (5..10).contains(&i) {
                // Five sends each overrun the period by 50 ms.
                tokio::time::sleep(Duration::from_millis(150)).await;
            }
            pacer.wait().await;
        }

        // The 250 ms of overrun is absorbed by skipped waits; the grid
        // itself never moves.
        assert_eq!(start.elapsed(), Duration::from_millis(5000));
    }
}
