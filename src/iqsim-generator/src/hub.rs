// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Mode-keyed broadcast groups.
//!
//! One broadcast channel per mode; a subscriber joins a group by
//! subscribing to that mode's channel. Senders never learn about
//! individual consumers, and a send with no subscribers is not an error.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::trace;

use iqsim_core::Mode;

#[derive(Clone)]
pub struct Hub {
    rooms: Arc<HashMap<Mode, broadcast::Sender<Bytes>>>,
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let rooms = Mode::ALL
            .iter()
            .map(|&mode| (mode, broadcast::channel(capacity).0))
            .collect();
        Self {
            rooms: Arc::new(rooms),
        }
    }

    /// Join the broadcast group of a mode.
    pub fn subscribe(&self, mode: Mode) -> broadcast::Receiver<Bytes> {
        self.rooms[&mode].subscribe()
    }

    /// Emit a payload to every subscriber of a mode's group.
    pub fn send(&self, mode: Mode, payload: Bytes) {
        if self.rooms[&mode].send(payload).is_err() {
            trace!("no subscribers for mode {}", mode);
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, mode: Mode) -> usize {
        self.rooms[&mode].receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn groups_are_isolated_per_mode() {
        let hub = Hub::new(16);
        let mut noise_rx = hub.subscribe(Mode::Noise);
        let mut sines_rx = hub.subscribe(Mode::Sines);

        hub.send(Mode::Noise, Bytes::from_static(b"n"));
        hub.send(Mode::Sines, Bytes::from_static(b"s"));

        assert_eq!(noise_rx.recv().await.unwrap(), Bytes::from_static(b"n"));
        assert_eq!(sines_rx.recv().await.unwrap(), Bytes::from_static(b"s"));
        assert!(noise_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_without_subscribers_is_not_an_error() {
        let hub = Hub::new(16);
        assert_eq!(hub.subscriber_count(Mode::Noise), 0);
        hub.send(Mode::Noise, Bytes::from_static(b"dropped"));
    }
}
