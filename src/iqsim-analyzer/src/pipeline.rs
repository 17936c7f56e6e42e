// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The filter/analysis pipeline task.
//!
//! Owns the entire filter bank: chunk filtering and cutoff
//! reconfiguration are serialized through this task's channels, so a
//! reconfiguration (with its state reset) can never interleave with a
//! filter pass.

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, trace, warn};

use iqsim_core::frame::encode_analysis_frame;
use iqsim_core::{FilterCutoffs, IqChunk};
use iqsim_dsp::{analyze, to_pcm_bytes, FilterBank};

use crate::wav::WavStream;

pub enum FilterCommand {
    Set(FilterCutoffs),
    Get,
    Reset,
}

/// Request sent to the pipeline task. The reply carries the cutoffs in
/// effect after the command.
pub struct FilterRequest {
    pub cmd: FilterCommand,
    pub respond_to: oneshot::Sender<Result<FilterCutoffs, String>>,
}

pub async fn run_pipeline(
    sample_rate: u32,
    mut chunk_rx: mpsc::Receiver<IqChunk>,
    mut filter_rx: mpsc::Receiver<FilterRequest>,
    frame_tx: broadcast::Sender<Bytes>,
    wav: WavStream,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut bank = FilterBank::new(sample_rate as f64);
    info!(
        "Filter pipeline ready ({} Hz, cutoffs {:?})",
        sample_rate,
        bank.cutoffs()
    );

    loop {
        tokio::select! {
            chunk = chunk_rx.recv() => {
                let Some(chunk) = chunk else { break };
                process_chunk(&mut bank, &chunk, &frame_tx, &wav);
            }
            req = filter_rx.recv() => {
                let Some(req) = req else { break };
                let result = match req.cmd {
                    FilterCommand::Set(cutoffs) => bank
                        .set_cutoffs(cutoffs)
                        .map(|()| bank.cutoffs()),
                    FilterCommand::Get => Ok(bank.cutoffs()),
                    FilterCommand::Reset => {
                        bank.reset_cutoffs();
                        Ok(bank.cutoffs())
                    }
                };
                if let Ok(cutoffs) = &result {
                    info!(
                        "Filter cutoffs now {} .. {} Hz",
                        cutoffs.low_cut, cutoffs.high_cut
                    );
                }
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
    info!("Filter pipeline stopped");
}

fn process_chunk(
    bank: &mut FilterBank,
    chunk: &IqChunk,
    frame_tx: &broadcast::Sender<Bytes>,
    wav: &WavStream,
) {
    let filtered = bank.process(&chunk.iq);
    let frame = analyze(&filtered, bank.sample_rate());
    let pcm = to_pcm_bytes(&filtered);

    match encode_analysis_frame(&frame, &pcm) {
        Ok(payload) => {
            if frame_tx.send(Bytes::from(payload)).is_err() {
                trace!("no analysis subscribers");
            }
        }
        Err(e) => warn!("Analysis frame encode failed: {}", e),
    }

    wav.push(Bytes::from(pcm));
}

#[cfg(test)]
mod tests {
    use super::*;
    use iqsim_core::frame::decode_analysis_frame;
    use iqsim_dsp::{AMPLITUDE_ENVELOPE_LEN, SPECTRUM_BINS};
    use num_complex::Complex;

    fn chunk(nr: u64, len: usize) -> IqChunk {
        IqChunk {
            nr,
            sample_rate: 44_100,
            iq: (0..len)
                .map(|i| {
                    let phase = 2.0 * std::f32::consts::PI * 1000.0 * i as f32 / 44_100.0;
                    Complex::new(phase.sin() * 10_000.0, phase.cos() * 10_000.0)
                })
                .collect(),
        }
    }

    async fn request(
        tx: &mpsc::Sender<FilterRequest>,
        cmd: FilterCommand,
    ) -> Result<FilterCutoffs, String> {
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(FilterRequest {
            cmd,
            respond_to: resp_tx,
        })
        .await
        .expect("pipeline alive");
        resp_rx.await.expect("pipeline replied")
    }

    #[tokio::test]
    async fn chunks_become_frames_and_pcm() {
        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let (_filter_tx, filter_rx) = mpsc::channel::<FilterRequest>(8);
        let (frame_tx, mut frame_rx) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let wav = WavStream::new();

        let pipeline = tokio::spawn(run_pipeline(
            44_100,
            chunk_rx,
            filter_rx,
            frame_tx,
            wav.clone(),
            shutdown_rx,
        ));

        chunk_tx.send(chunk(1, 4410)).await.unwrap();

        let payload = frame_rx.recv().await.unwrap();
        let (frame, pcm) = decode_analysis_frame(&payload).unwrap();
        assert_eq!(frame.sample_rate, 44_100.0);
        assert_eq!(frame.amplitude.len(), AMPLITUDE_ENVELOPE_LEN);
        assert_eq!(frame.spectrum.freqs.len(), SPECTRUM_BINS);
        assert_eq!(pcm.len(), 4410 * 2);

        // The same PCM span lands in the re-streaming queue.
        let queued = wav.consumer().await.recv().await.unwrap().unwrap();
        assert_eq!(queued.as_ref(), pcm.as_slice());

        drop(chunk_tx);
        pipeline.await.unwrap();
    }

    #[tokio::test]
    async fn cutoff_requests_are_serialized_with_filtering() {
        let (_chunk_tx, chunk_rx) = mpsc::channel(8);
        let (filter_tx, filter_rx) = mpsc::channel(8);
        let (frame_tx, _) = broadcast::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let pipeline = tokio::spawn(run_pipeline(
            44_100,
            chunk_rx,
            filter_rx,
            frame_tx,
            WavStream::new(),
            shutdown_rx,
        ));

        assert_eq!(
            request(&filter_tx, FilterCommand::Get).await.unwrap(),
            FilterCutoffs::default()
        );

        let set = request(
            &filter_tx,
            FilterCommand::Set(FilterCutoffs::new(100.0, 8000.0)),
        )
        .await
        .unwrap();
        assert_eq!(set, FilterCutoffs::new(100.0, 8000.0));

        // Invalid cutoffs are rejected and the previous setting survives.
        assert!(request(
            &filter_tx,
            FilterCommand::Set(FilterCutoffs::new(9000.0, 200.0))
        )
        .await
        .is_err());
        assert_eq!(
            request(&filter_tx, FilterCommand::Get).await.unwrap(),
            FilterCutoffs::new(100.0, 8000.0)
        );

        assert_eq!(
            request(&filter_tx, FilterCommand::Reset).await.unwrap(),
            FilterCutoffs::default()
        );

        drop(filter_tx);
        pipeline.await.unwrap();
    }
}
