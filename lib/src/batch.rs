//! Parallel analysis of many flows
//!
//! Flows are independent of each other, so analyzing all flows of a capture
//! can be spread over worker threads. Jobs are handed out over a channel;
//! results are collected back into the order the flows were requested in.
use crossbeam_channel::{bounded, unbounded};
use std::thread;

use crate::decode::DecoderConfig;
use crate::flow::FlowKey;
use crate::frame::RawFrame;
use crate::report::{analyze, FlowAnalysis};

/// Maximum number of queued jobs not yet picked up by a worker
const JOB_QUEUE_DEPTH: usize = 64;

/// Analyze each flow over the same frames, using up to `workers` threads.
///
/// The result is identical to calling [`analyze`] for each key in turn.
pub fn analyze_flows(
    keys: &[FlowKey],
    frames: &[RawFrame],
    config: &DecoderConfig,
    workers: usize,
) -> Vec<FlowAnalysis> {
    let workers = workers.clamp(1, keys.len().max(1));
    if workers == 1 {
        return keys.iter().map(|key| analyze(key, frames, config)).collect();
    }

    log::debug!("Analyzing {} flows on {} workers", keys.len(), workers);

    let (job_tx, job_rx) = bounded::<(usize, FlowKey)>(JOB_QUEUE_DEPTH);
    let (result_tx, result_rx) = unbounded::<(usize, FlowAnalysis)>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((position, key)) = job_rx.recv() {
                    let analysis = analyze(&key, frames, config);
                    if result_tx.send((position, analysis)).is_err() {
                        break;
                    }
                }
            });
        }
        // Workers hold the remaining handles; dropping ours ends the loops
        drop(job_rx);
        drop(result_tx);

        for job in keys.iter().copied().enumerate() {
            if job_tx.send(job).is_err() {
                log::error!("All analysis workers exited early");
                break;
            }
        }
        drop(job_tx);
    });

    let mut results: Vec<(usize, FlowAnalysis)> = result_rx.into_iter().collect();
    results.sort_by_key(|(position, _)| *position);
    results.into_iter().map(|(_, analysis)| analysis).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::MacAddress;

    fn block_ack(index: usize, ta: u8, ra: u8, ssn: u16, bitmap: u64) -> RawFrame {
        let mut body = ((1u16 << 12) | 0b0100).to_le_bytes().to_vec();
        body.extend_from_slice(&(ssn << 4).to_le_bytes());
        body.extend_from_slice(&bitmap.to_le_bytes());
        RawFrame {
            index,
            timestamp: index as f64,
            frame_type: 1,
            subtype: 9,
            receiver: Some(MacAddress([ra; 6])),
            transmitter: Some(MacAddress([ta; 6])),
            sequence_control: None,
            retry: false,
            length: 16 + body.len(),
            body,
        }
    }

    fn capture() -> Vec<RawFrame> {
        let mut frames = Vec::new();
        for station in 1..=8u8 {
            let base = frames.len();
            frames.push(block_ack(base + 1, 0xAA, station, 100, u64::MAX));
            frames.push(block_ack(base + 2, 0xAA, station, 100, u64::MAX >> station));
        }
        frames
    }

    fn keys() -> Vec<FlowKey> {
        (1..=8u8)
            .map(|station| FlowKey::new(MacAddress([station; 6]), MacAddress([0xAA; 6]), 1))
            .collect()
    }

    #[test]
    fn parallel_matches_sequential() {
        let frames = capture();
        let keys = keys();
        let config = DecoderConfig::default();

        let sequential = analyze_flows(&keys, &frames, &config, 1);
        let parallel = analyze_flows(&keys, &frames, &config, 4);

        assert_eq!(sequential.len(), 8);
        assert_eq!(parallel.len(), 8);
        for (a, b) in sequential.iter().zip(&parallel) {
            assert_eq!(a.flow, b.flow);
            assert_eq!(a.packets, b.packets);
            assert_eq!(a.anomalies, b.anomalies);
        }
        for (station, analysis) in (1..=8usize).zip(&sequential) {
            assert_eq!(analysis.anomaly_count, station);
        }
    }

    #[test]
    fn no_flows() {
        assert!(analyze_flows(&[], &capture(), &DecoderConfig::default(), 4).is_empty());
    }

    #[test]
    fn more_workers_than_flows() {
        let keys = &keys()[..2];
        let results = analyze_flows(keys, &capture(), &DecoderConfig::default(), 16);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].flow, keys[1]);
    }
}
